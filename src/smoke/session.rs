//! Scoped resources of one smoke test run

use tracing::{info, warn};

use super::scratch::ScratchFile;
use crate::process::ServerProcess;

/// What cleanup actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// PID of the process that was stopped, if one was owned
    pub terminated_pid: Option<u32>,
    /// Whether a scratch file was removed
    pub scratch_removed: bool,
}

/// Owns the server process and scratch file of a run
///
/// [`SmokeSession::cleanup`] releases both and can be called any number of
/// times; only the first call has an effect. If the session is dropped
/// without cleanup (panic, cancellation) the resources' own drop guards
/// kill the process and delete the file.
#[derive(Debug, Default)]
pub struct SmokeSession {
    process: Option<ServerProcess>,
    scratch: Option<ScratchFile>,
}

impl SmokeSession {
    /// Empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of the server process
    pub fn attach_process(&mut self, process: ServerProcess) -> &mut ServerProcess {
        self.process.insert(process)
    }

    /// Take ownership of the scratch file
    pub fn attach_scratch(&mut self, scratch: ScratchFile) -> &ScratchFile {
        self.scratch.insert(scratch)
    }

    /// Owned scratch file, if any
    pub fn scratch(&self) -> Option<&ScratchFile> {
        self.scratch.as_ref()
    }

    /// Stop the process and remove the scratch file
    pub async fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        if let Some(mut process) = self.process.take() {
            let pid = process.pid();
            if let Err(e) = process.terminate().await {
                warn!(pid, error = %e, "Failed to terminate server process");
            }
            report.terminated_pid = Some(pid);
        }

        if let Some(mut scratch) = self.scratch.take() {
            match scratch.remove().await {
                Ok(()) => report.scratch_removed = true,
                Err(e) => {
                    warn!(path = %scratch.path().display(), error = %e, "Failed to remove scratch file")
                }
            }
        }

        if report != CleanupReport::default() {
            info!(
                terminated_pid = ?report.terminated_pid,
                scratch_removed = report.scratch_removed,
                "Cleanup complete"
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ServerCommand;

    #[tokio::test]
    async fn test_cleanup_has_one_effect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_input.json");

        let mut session = SmokeSession::new();
        let process = ServerProcess::spawn(&ServerCommand::new("sleep").arg("30"), &[]).unwrap();
        let pid = process.pid();
        session.attach_process(process);
        session.attach_scratch(ScratchFile::write(&path, b"{}").await.unwrap());

        let first = session.cleanup().await;
        assert_eq!(first.terminated_pid, Some(pid));
        assert!(first.scratch_removed);
        assert!(!path.exists());

        let second = session.cleanup().await;
        assert_eq!(second, CleanupReport::default());
    }

    #[tokio::test]
    async fn test_empty_session_cleanup() {
        let mut session = SmokeSession::new();
        assert_eq!(session.cleanup().await, CleanupReport::default());
    }
}
