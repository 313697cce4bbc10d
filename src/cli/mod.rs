//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sagemaker_llm_ops::config::{SMOKE_TEST_API_PORT, SMOKE_TEST_INSTANCE_TYPE, SMOKE_TEST_MODEL_ID};
use sagemaker_llm_ops::iam::SAGEMAKER_ROLE_NAME;

pub mod commands;

/// SageMaker LLM operations
#[derive(Parser, Debug)]
#[command(name = "sagemaker-llm-ops")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress decorative output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ensure the SageMaker execution role exists and print its ARN
    ProvisionRole(ProvisionArgs),

    /// Start the serving entrypoint locally and send it one request
    SmokeTest(SmokeTestArgs),

    /// Run the SageMaker /ping + /invocations front for an engine
    Serve(ServeArgs),
}

/// Arguments for `provision-role`
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Role name
    #[arg(long, default_value = SAGEMAKER_ROLE_NAME)]
    pub role_name: String,

    /// AWS region (defaults to the provider chain)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Check afterwards that every managed policy is attached
    #[arg(long)]
    pub verify: bool,

    /// Provision against an in-memory account instead of AWS
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `smoke-test`
#[derive(Args, Debug)]
pub struct SmokeTestArgs {
    /// Command that starts the server
    #[arg(long, default_value = "python3 sagemaker_serving.py")]
    pub server_command: String,

    /// Directory to start the server from
    #[arg(long)]
    pub server_dir: Option<PathBuf>,

    /// Model identifier handed to the server
    #[arg(long, default_value = SMOKE_TEST_MODEL_ID)]
    pub model_id: String,

    /// Instance type label handed to the server
    #[arg(long, default_value = SMOKE_TEST_INSTANCE_TYPE)]
    pub instance_type: String,

    /// Host the server binds
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port the server binds
    #[arg(long, default_value_t = SMOKE_TEST_API_PORT)]
    pub port: u16,

    /// Server log level
    #[arg(long, default_value = "info")]
    pub server_log_level: String,

    /// Do not check or install Python packages
    #[arg(long)]
    pub skip_deps: bool,

    /// Python interpreter used for the dependency check
    #[arg(long, default_value = "python3")]
    pub python: String,

    /// Seconds to wait before the first health check
    #[arg(long, default_value_t = 5)]
    pub initial_delay: u64,

    /// Seconds to keep polling /ping before giving up
    #[arg(long, default_value_t = 600)]
    pub ready_timeout: u64,

    /// Sleep this many seconds and probe once, instead of polling
    #[arg(long, conflicts_with_all = ["initial_delay", "ready_timeout"])]
    pub fixed_wait: Option<u64>,

    /// Seconds before the inference request times out
    #[arg(long, default_value_t = 300)]
    pub request_timeout: u64,

    /// Scratch file for the request payload
    #[arg(long, default_value = "test_input.json")]
    pub scratch_file: PathBuf,

    /// Prompt sent to the model
    #[arg(long, default_value = "Hello, how are you?")]
    pub prompt: String,
}

/// Arguments for `serve`
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind
    #[arg(long, env = "SAGEMAKER_BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind (SageMaker routes to 8080)
    #[arg(long, env = "SAGEMAKER_BIND_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Engine base URL; defaults to the engine address from API_HOST/API_PORT
    #[arg(long, env = "ENGINE_URL")]
    pub upstream: Option<String>,

    /// Launch the engine as a child process
    #[arg(long)]
    pub spawn_engine: bool,

    /// Seconds before a forwarded request times out
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,
}
