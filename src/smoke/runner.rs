//! Local smoke test runner

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::deps::PipDependencies;
use super::error::SmokeTestError;
use super::probe::{InferenceProbe, ReadinessPolicy, DEFAULT_REQUEST_TIMEOUT};
use super::scratch::{ScratchFile, DEFAULT_SCRATCH_FILE};
use super::session::{CleanupReport, SmokeSession};
use super::stage::Stage;
use crate::chat::{extract_assistant_reply, ChatCompletionRequest, SMOKE_TEST_PROMPT};
use crate::config::ServingConfig;
use crate::process::{ServerCommand, ServerProcess};

/// Everything a smoke test run needs
#[derive(Debug, Clone)]
pub struct SmokeTestConfig {
    /// Configuration handed to the server process
    pub serving: ServingConfig,
    /// How to start the server
    pub server: ServerCommand,
    pub readiness: ReadinessPolicy,
    /// Where the request payload is written
    pub scratch_path: PathBuf,
    pub prompt: String,
    /// Timeout of the inference request
    pub request_timeout: Duration,
    /// Packages to check before starting; `None` skips the check
    pub dependencies: Option<PipDependencies>,
}

impl Default for SmokeTestConfig {
    fn default() -> Self {
        Self {
            serving: ServingConfig::smoke_test_defaults(),
            server: ServerCommand::default(),
            readiness: ReadinessPolicy::default(),
            scratch_path: PathBuf::from(DEFAULT_SCRATCH_FILE),
            prompt: SMOKE_TEST_PROMPT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dependencies: Some(PipDependencies::default()),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pid: u32,
    pub ping_attempts: u32,
    pub response_status: u16,
    /// Raw response body
    pub response_body: String,
    /// `choices[0].message.content`, when the body has one
    pub assistant_reply: Option<String>,
    pub stages: Vec<Stage>,
}

/// One smoke test execution
pub struct SmokeTest {
    config: SmokeTestConfig,
    run_id: Uuid,
    stages: Vec<Stage>,
    last_cleanup: Option<CleanupReport>,
}

impl SmokeTest {
    /// Prepare a run
    pub fn new(config: SmokeTestConfig) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4(),
            stages: vec![Stage::NotStarted],
            last_cleanup: None,
        }
    }

    /// Run identifier, used in logs
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// States visited so far
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Most recent state
    pub fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::NotStarted)
    }

    /// What the cleanup of the last run did
    pub fn cleanup_report(&self) -> Option<&CleanupReport> {
        self.last_cleanup.as_ref()
    }

    fn enter(&mut self, stage: Stage) {
        if stage.is_failure() {
            warn!(run_id = %self.run_id, stage = %stage, "Smoke test stage");
        } else {
            info!(run_id = %self.run_id, stage = %stage, "Smoke test stage");
        }
        self.stages.push(stage);
    }

    /// Start the server, wait for health, send one request, clean up
    ///
    /// Cleanup runs exactly once on every path out of this function. If the
    /// returned future is dropped mid-run, the session's drop guards do the
    /// same job.
    pub async fn run(&mut self) -> Result<SmokeReport, SmokeTestError> {
        let started_at = Utc::now();
        self.config.serving.validate()?;

        if let Some(ref deps) = self.config.dependencies {
            deps.ensure().await?;
        }

        let mut session = SmokeSession::new();
        let result = self.drive(&mut session, started_at).await;

        if let Err(ref e) = result {
            warn!(run_id = %self.run_id, error = %e, "Smoke test failed");
        }

        self.last_cleanup = Some(session.cleanup().await);
        self.enter(Stage::CleanedUp);

        result.map(|mut report| {
            report.finished_at = Utc::now();
            report.stages = self.stages.clone();
            report
        })
    }

    async fn drive(
        &mut self,
        session: &mut SmokeSession,
        started_at: DateTime<Utc>,
    ) -> Result<SmokeReport, SmokeTestError> {
        let probe = InferenceProbe::new(
            self.config.serving.client_base_url(),
            self.config.request_timeout,
        )?;

        let payload = ChatCompletionRequest::single_turn(
            self.config.serving.model_id.clone(),
            self.config.prompt.clone(),
        );
        let bytes = serde_json::to_vec_pretty(&payload)?;
        let path = self.config.scratch_path.clone();
        let scratch = ScratchFile::write(&path, &bytes)
            .await
            .map_err(|source| SmokeTestError::Scratch { path, source })?;
        session.attach_scratch(scratch);

        let process = ServerProcess::spawn(&self.config.server, &self.config.serving.to_env())?;
        let pid = process.pid();
        let process = session.attach_process(process);
        self.enter(Stage::Started);

        let wait = probe.wait_until_ready(process, &self.config.readiness).await;

        let ping_attempts = match wait {
            Ok(attempts) => {
                self.enter(Stage::LivenessOk);
                self.enter(Stage::PingOk);
                attempts
            }
            Err(e) => {
                if e.is_health_check_failure() {
                    self.enter(Stage::LivenessOk);
                }
                if let Some(stage) = e.failed_stage() {
                    self.enter(stage);
                }
                return Err(e);
            }
        };

        let body = match session.scratch() {
            Some(scratch) => tokio::fs::read(scratch.path())
                .await
                .map_err(|source| SmokeTestError::Scratch {
                    path: scratch.path().to_path_buf(),
                    source,
                })?,
            None => bytes,
        };

        let response = probe.invoke(body).await?;
        self.enter(Stage::RequestSent);

        let assistant_reply = extract_assistant_reply(&response.body);

        Ok(SmokeReport {
            run_id: self.run_id,
            started_at,
            finished_at: started_at,
            pid,
            ping_attempts,
            response_status: response.status,
            response_body: response.body,
            assistant_reply,
            stages: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SmokeTestConfig::default();
        assert_eq!(config.serving.port, 8001);
        assert_eq!(config.scratch_path, PathBuf::from("test_input.json"));
        assert_eq!(config.prompt, "Hello, how are you?");
        assert!(config.dependencies.is_some());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_spawn() {
        let mut config = SmokeTestConfig::default();
        config.serving.instance_type = "ml.unknown".to_string();
        config.dependencies = None;

        let mut test = SmokeTest::new(config);
        let err = test.run().await.unwrap_err();

        assert!(matches!(err, SmokeTestError::Config(_)));
        assert_eq!(test.stages(), &[Stage::NotStarted]);
    }

    #[tokio::test]
    async fn test_spawn_failure_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = SmokeTestConfig {
            server: ServerCommand::new("nonexistent_server_12345"),
            scratch_path: dir.path().join("test_input.json"),
            dependencies: None,
            ..SmokeTestConfig::default()
        };

        let mut test = SmokeTest::new(config);
        let err = test.run().await.unwrap_err();

        assert!(matches!(err, SmokeTestError::Process(_)));
        assert_eq!(test.stages(), &[Stage::NotStarted, Stage::CleanedUp]);

        let cleanup = test.cleanup_report().unwrap();
        assert_eq!(cleanup.terminated_pid, None);
        assert!(cleanup.scratch_removed);
        assert!(!dir.path().join("test_input.json").exists());
    }
}
