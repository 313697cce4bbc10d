//! SageMaker LLM operations
//!
//! Library behind the `sagemaker-llm-ops` binary:
//!
//! - [`iam`]: idempotent provisioning of the SageMaker execution role
//! - [`smoke`]: local smoke test of a serving container
//! - [`serving`]: SageMaker `/ping` + `/invocations` front for an
//!   OpenAI-compatible engine
//!
//! Shared pieces live in [`config`], [`process`] and [`chat`].

pub mod chat;
pub mod config;
pub mod iam;
pub mod process;
pub mod serving;
pub mod smoke;

pub use config::{ConfigError, ServingConfig};
pub use process::{ServerCommand, ServerProcess};
