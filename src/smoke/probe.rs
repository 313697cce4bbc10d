//! HTTP probes against a serving container
//!
//! Speaks the SageMaker container contract: `GET /ping` for health and
//! `POST /invocations` for inference.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info};

use super::error::SmokeTestError;
use crate::process::ServerProcess;

/// Health check path
pub const PING_PATH: &str = "/ping";

/// Inference path
pub const INVOCATIONS_PATH: &str = "/invocations";

/// Per-attempt timeout of a single health check
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout of the inference request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// How to wait for a freshly started server
///
/// After `initial_delay`, the server is polled until it answers `/ping`
/// with 200 or `timeout` elapses. The interval between polls doubles up to
/// `max_poll_interval`. Process liveness is checked before every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
        }
    }
}

impl ReadinessPolicy {
    /// Sleep once, then probe exactly once
    pub fn fixed(wait: Duration) -> Self {
        Self {
            initial_delay: wait,
            poll_interval: Duration::ZERO,
            max_poll_interval: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }

    /// Interval to use after `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_poll_interval)
    }
}

/// Response to an inference request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status: u16,
    pub body: String,
}

/// HTTP client bound to one server
#[derive(Debug, Clone)]
pub struct InferenceProbe {
    client: Client,
    base_url: String,
}

impl InferenceProbe {
    /// Probe for `base_url` (scheme, host and port, no trailing slash)
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, SmokeTestError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One health check; returns the numeric status code
    pub async fn ping(&self) -> Result<u16, reqwest::Error> {
        let url = format!("{}{}", self.base_url, PING_PATH);
        let response = self.client.get(&url).timeout(PING_TIMEOUT).send().await?;
        Ok(response.status().as_u16())
    }

    /// POST a JSON body to the inference path and return the raw response
    pub async fn invoke(&self, body: Vec<u8>) -> Result<InvocationResponse, SmokeTestError> {
        let url = format!("{}{}", self.base_url, INVOCATIONS_PATH);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Inference response received");

        Ok(InvocationResponse { status, body })
    }

    /// Poll until the server is healthy, the process dies, or time runs out
    ///
    /// Returns the number of health checks made.
    pub async fn wait_until_ready(
        &self,
        process: &mut ServerProcess,
        policy: &ReadinessPolicy,
    ) -> Result<u32, SmokeTestError> {
        if !policy.initial_delay.is_zero() {
            info!(delay = ?policy.initial_delay, "Waiting for server to initialize");
            tokio::time::sleep(policy.initial_delay).await;
        }

        let started = Instant::now();
        let deadline = started + policy.timeout;
        let mut interval = policy.poll_interval;
        let mut attempts = 0u32;
        let mut last_status: Option<u16> = None;
        let mut last_error = String::new();

        loop {
            if !process.is_alive() {
                return Err(SmokeTestError::ServerNotAlive {
                    pid: process.pid(),
                    exit: process.exit_status().map(|s| s.to_string()),
                });
            }

            attempts += 1;
            match self.ping().await {
                Ok(200) => {
                    info!(attempts, elapsed = ?started.elapsed(), "Server is healthy");
                    return Ok(attempts);
                }
                Ok(status) => {
                    debug!(status, attempts, "Health check not ready");
                    last_status = Some(status);
                }
                Err(e) => {
                    debug!(error = %e, attempts, "Health check unreachable");
                    last_error = e.to_string();
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(match last_status {
                    Some(status) => SmokeTestError::HealthCheckFailed { status, attempts },
                    None => SmokeTestError::HealthCheckUnreachable {
                        attempts,
                        elapsed: started.elapsed(),
                        message: last_error,
                    },
                });
            }

            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = policy.next_interval(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let policy = ReadinessPolicy {
            initial_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(100),
            max_poll_interval: Duration::from_millis(350),
            timeout: Duration::from_secs(1),
        };

        let second = policy.next_interval(policy.poll_interval);
        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(policy.next_interval(second), Duration::from_millis(350));
    }

    #[test]
    fn test_fixed_policy_probes_once() {
        let policy = ReadinessPolicy::fixed(Duration::from_secs(60));
        assert_eq!(policy.initial_delay, Duration::from_secs(60));
        assert!(policy.timeout.is_zero());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let probe = InferenceProbe::new("http://127.0.0.1:8001/", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(probe.base_url(), "http://127.0.0.1:8001");
    }

    #[tokio::test]
    async fn test_unreachable_server_times_out() {
        let mut process =
            ServerProcess::spawn(&crate::process::ServerCommand::new("sleep").arg("30"), &[]).unwrap();
        // Port 9 (discard) is closed on test machines
        let probe = InferenceProbe::new("http://127.0.0.1:9", DEFAULT_REQUEST_TIMEOUT).unwrap();
        let policy = ReadinessPolicy {
            initial_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(50),
            max_poll_interval: Duration::from_millis(100),
            timeout: Duration::from_millis(300),
        };

        let err = probe.wait_until_ready(&mut process, &policy).await.unwrap_err();
        assert!(matches!(err, SmokeTestError::HealthCheckUnreachable { attempts, .. } if attempts >= 2));

        process.terminate().await.unwrap();
    }
}
