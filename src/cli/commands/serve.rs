//! `serve` command
//!
//! Reads the serving contract from the environment, optionally launches
//! the engine, and runs the SageMaker front until Ctrl-C.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use super::shutdown_signal;
use crate::cli::ServeArgs;
use sagemaker_llm_ops::config::ServingConfig;
use sagemaker_llm_ops::process::ServerProcess;
use sagemaker_llm_ops::serving::{default_engine_command, EngineArgs, SageMakerServer, ServeOptions};

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = ServingConfig::from_env().context("Invalid serving configuration")?;
    config.validate()?;

    info!(
        model_id = %config.model_id,
        instance_type = %config.instance_type,
        tensor_parallel_size = config.tensor_parallel_size()?,
        "Starting SageMaker serving adapter"
    );

    let mut engine = if args.spawn_engine {
        let engine_args = EngineArgs::from_config(&config)?;
        let command = engine_args.apply_to(default_engine_command());
        Some(ServerProcess::spawn(&command, &[]).context("Failed to launch engine")?)
    } else {
        None
    };

    let upstream = args.upstream.unwrap_or_else(|| config.client_base_url());
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid address: {}:{}", args.host, args.port))?;

    let options = ServeOptions {
        served_model_name: config.model_id.clone(),
        upstream,
        request_timeout: Duration::from_secs(args.timeout),
    };

    let server = SageMakerServer::bind(addr, options)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let served = server.run_until(shutdown_signal()).await;

    if let Some(ref mut engine) = engine {
        engine.terminate().await?;
    }

    served?;
    Ok(())
}
