//! Serving adapter errors

use thiserror::Error;

/// Errors from the SageMaker serving adapter
#[derive(Debug, Error)]
pub enum ServingError {
    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request could not be parsed as HTTP
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
