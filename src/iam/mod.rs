//! SageMaker execution role provisioning
//!
//! Ensures an IAM role exists with a fixed trust policy and a fixed set of
//! managed policies. Running it repeatedly converges on the same role and
//! the same ARN.
//!
//! # Architecture
//!
//! ```text
//! provision-role ──► RoleProvisioner ──► IamBackend ──┬─► AwsIamBackend (aws-sdk-iam)
//!                                                     └─► InMemoryIamBackend
//! ```

mod aws;
mod backend;
mod error;
mod memory;
mod provisioner;
mod types;

pub use aws::AwsIamBackend;
pub use backend::IamBackend;
pub use error::IamError;
pub use memory::{CallCounts, InMemoryIamBackend, DEFAULT_ACCOUNT_ID};
pub use provisioner::RoleProvisioner;
pub use types::*;
