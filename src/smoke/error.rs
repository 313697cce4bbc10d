//! Smoke test errors

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::stage::Stage;
use crate::config::ConfigError;
use crate::process::ProcessError;

/// Errors that end a smoke test run
#[derive(Debug, Error)]
pub enum SmokeTestError {
    /// Invalid serving configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server process could not be started or stopped
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A dependency was missing and could not be installed
    #[error("Dependency '{package}' could not be installed: {message}")]
    Dependency { package: String, message: String },

    /// Server process exited before it became healthy
    #[error("Server process {pid} is not running ({})", .exit.as_deref().unwrap_or("exit status unknown"))]
    ServerNotAlive { pid: u32, exit: Option<String> },

    /// Health check answered, but never with 200
    #[error("Health check failed with status code {status} after {attempts} attempt(s)")]
    HealthCheckFailed { status: u16, attempts: u32 },

    /// Health check never got an HTTP answer
    #[error("Health check could not reach the server after {attempts} attempt(s) in {elapsed:?}: {message}")]
    HealthCheckUnreachable {
        attempts: u32,
        elapsed: Duration,
        message: String,
    },

    /// Inference request failed at the transport level
    #[error("Inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Scratch file could not be written or read
    #[error("Scratch file {path} error: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Request payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SmokeTestError {
    /// The failure state this error corresponds to, if it is one of the
    /// explicit check failures
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            SmokeTestError::ServerNotAlive { .. } => Some(Stage::LivenessFailed),
            SmokeTestError::HealthCheckFailed { .. }
            | SmokeTestError::HealthCheckUnreachable { .. } => Some(Stage::PingFailed),
            _ => None,
        }
    }

    /// Whether the error is a health check failure
    pub fn is_health_check_failure(&self) -> bool {
        self.failed_stage() == Some(Stage::PingFailed)
    }
}
