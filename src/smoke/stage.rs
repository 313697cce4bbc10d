//! Smoke test progress states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of a smoke test run
///
/// ```text
/// NOT_STARTED → STARTED → LIVENESS_OK → PING_OK → REQUEST_SENT → CLEANED_UP
///                   └─► LIVENESS_FAILED ──┐  └─► PING_FAILED ──┐
///                                         └──► CLEANED_UP ◄────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    NotStarted,
    Started,
    LivenessOk,
    LivenessFailed,
    PingOk,
    PingFailed,
    RequestSent,
    CleanedUp,
}

impl Stage {
    /// Whether this is one of the failure states
    pub fn is_failure(&self) -> bool {
        matches!(self, Stage::LivenessFailed | Stage::PingFailed)
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NotStarted => "NOT_STARTED",
            Stage::Started => "STARTED",
            Stage::LivenessOk => "LIVENESS_OK",
            Stage::LivenessFailed => "LIVENESS_FAILED",
            Stage::PingOk => "PING_OK",
            Stage::PingFailed => "PING_FAILED",
            Stage::RequestSent => "REQUEST_SENT",
            Stage::CleanedUp => "CLEANED_UP",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
