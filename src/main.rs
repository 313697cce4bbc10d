//! sagemaker-llm-ops - SageMaker LLM operations CLI
//!
//! - `provision-role`: ensure the SageMaker execution role and print its ARN
//! - `smoke-test`: start the serving entrypoint locally and send one request
//! - `serve`: SageMaker `/ping` + `/invocations` front for an engine

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

fn init_logging(level: &str) {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::ProvisionRole(args) => cli::commands::provision::run(args, cli.json).await,
        Commands::SmokeTest(args) => cli::commands::smoke_test::run(args, cli.json, cli.quiet).await,
        Commands::Serve(args) => cli::commands::serve::run(args).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
