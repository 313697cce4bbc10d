//! Local serving smoke test
//!
//! Starts the serving entrypoint as a child process, waits for `/ping` to
//! answer 200, sends one chat request to `/invocations` and tears
//! everything down again.
//!
//! # Resources
//!
//! A [`SmokeSession`] owns the child process and the scratch request file.
//! Every path out of [`SmokeTest::run`] goes through the same cleanup, and
//! both resources also carry drop guards for cancellation.

mod deps;
mod error;
mod probe;
mod runner;
mod scratch;
mod session;
mod stage;

pub use deps::{DependencyStatus, PipDependencies, DEFAULT_PACKAGES};
pub use error::SmokeTestError;
pub use probe::{
    InferenceProbe, InvocationResponse, ReadinessPolicy, DEFAULT_REQUEST_TIMEOUT, INVOCATIONS_PATH,
    PING_PATH,
};
pub use runner::{SmokeReport, SmokeTest, SmokeTestConfig};
pub use scratch::{ScratchFile, DEFAULT_SCRATCH_FILE};
pub use session::{CleanupReport, SmokeSession};
pub use stage::Stage;

/// Printed when the response carries no assistant reply
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse assistant's reply.";

/// Printed when a run finishes
pub const COMPLETION_MESSAGE: &str = "Test completed successfully.";
