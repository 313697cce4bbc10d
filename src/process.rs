//! Server process guard
//!
//! Owns one child server process for the lifetime of a smoke test or a
//! `serve --spawn-engine` run. The child is spawned with `kill_on_drop`,
//! so dropping the guard on any exit path (error, `?`, task cancellation)
//! releases it even if [`ServerProcess::terminate`] was never reached.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// How long to wait for a killed child to be reaped
pub const REAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Process management errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The OS did not report a PID for the child
    #[error("Spawned '{0}' but could not obtain its process ID")]
    MissingPid(String),

    /// Waiting on the child failed
    #[error("Failed to wait for process {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The child did not exit after being killed
    #[error("Process {pid} was not reaped within {timeout:?}")]
    ReapTimeout { pid: u32, timeout: Duration },
}

/// Program and arguments used to start a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for ServerCommand {
    fn default() -> Self {
        Self::new("python3").arg("sagemaker_serving.py")
    }
}

impl ServerCommand {
    /// Command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Split a whitespace-separated command line
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command from a different directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Human-readable rendering for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A running server child process
pub struct ServerProcess {
    child: Child,
    pid: u32,
    program: String,
    exit_status: Option<ExitStatus>,
}

impl ServerProcess {
    /// Start the server in the background
    ///
    /// `env` is added on top of the inherited environment of the child only.
    pub fn spawn(command: &ServerCommand, env: &[(String, String)]) -> Result<Self, ProcessError> {
        let mut cmd = Command::new(&command.program);

        cmd.args(&command.args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            program: command.program.clone(),
            source,
        })?;

        let pid = child
            .id()
            .ok_or_else(|| ProcessError::MissingPid(command.program.clone()))?;

        info!(pid, command = %command.display(), "Server process started");

        Ok(Self {
            child,
            pid,
            program: command.program.clone(),
            exit_status: None,
        })
    }

    /// OS process identifier recorded at spawn time
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status, once the child has been observed to exit
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Non-blocking liveness check
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = self.pid, %status, "Server process has exited");
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                warn!(pid = self.pid, error = %e, "Liveness check failed");
                false
            }
        }
    }

    /// Kill the child and wait for it to be reaped
    ///
    /// Calling this on a process that already exited is a no-op that returns
    /// the recorded exit status.
    pub async fn terminate(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        if !self.is_alive() {
            return Ok(self.exit_status);
        }

        if let Err(e) = self.child.start_kill() {
            // Raced with a natural exit between try_wait and kill.
            debug!(pid = self.pid, error = %e, "Kill signal not delivered");
        }

        let status = tokio::time::timeout(REAP_TIMEOUT, self.child.wait())
            .await
            .map_err(|_| ProcessError::ReapTimeout {
                pid: self.pid,
                timeout: REAP_TIMEOUT,
            })?
            .map_err(|source| ProcessError::Wait {
                pid: self.pid,
                source,
            })?;

        info!(pid = self.pid, program = %self.program, %status, "Server process terminated");
        self.exit_status = Some(status);
        Ok(Some(status))
    }
}

impl std::fmt::Debug for ServerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProcess")
            .field("pid", &self.pid)
            .field("program", &self.program)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cmd = ServerCommand::default();
        assert_eq!(cmd.display(), "python3 sagemaker_serving.py");
    }

    #[test]
    fn test_from_command_line() {
        let cmd = ServerCommand::from_command_line("  sleep   30 ").unwrap();
        assert_eq!(cmd.program, "sleep");
        assert_eq!(cmd.args, vec!["30".to_string()]);

        assert!(ServerCommand::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn test_terminate_running_process() {
        let mut process = ServerProcess::spawn(&ServerCommand::new("sleep").arg("30"), &[]).unwrap();
        assert!(process.pid() > 0);
        assert!(process.is_alive());

        let status = process.terminate().await.unwrap();
        assert!(status.is_some());
        assert!(!status.unwrap().success());
        assert!(!process.is_alive());

        // Second call is a no-op
        let again = process.terminate().await.unwrap();
        assert_eq!(again, status);
    }

    #[tokio::test]
    async fn test_detects_exited_process() {
        let cmd = ServerCommand::new("sh").args(["-c", "exit 3"]);
        let mut process = ServerProcess::spawn(&cmd, &[]).unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!process.is_alive());
        assert_eq!(process.exit_status().and_then(|s| s.code()), Some(3));
    }

    #[tokio::test]
    async fn test_env_reaches_child() {
        let cmd = ServerCommand::new("sh").args(["-c", "test \"$API_PORT\" = 8001"]);
        let env = vec![("API_PORT".to_string(), "8001".to_string())];
        let mut process = ServerProcess::spawn(&cmd, &env).unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!process.is_alive());
        assert!(process.exit_status().unwrap().success());
    }

    #[test]
    fn test_spawn_invalid_command() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let result = ServerProcess::spawn(&ServerCommand::new("nonexistent_command_12345"), &[]);
        assert!(matches!(result, Err(ProcessError::SpawnFailed { .. })));
    }
}
