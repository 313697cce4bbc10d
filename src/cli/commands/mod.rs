//! Subcommand implementations

pub mod provision;
pub mod serve;

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
