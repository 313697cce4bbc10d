//! IAM provisioning errors

use thiserror::Error;

/// Errors from an IAM backend or the provisioner
#[derive(Debug, Error)]
pub enum IamError {
    /// Role does not exist
    #[error("Role {0} does not exist")]
    NoSuchRole(String),

    /// Role already exists (returned by a conditional create)
    #[error("Role {0} already exists")]
    AlreadyExists(String),

    /// Provider call failed; `message` is the provider's own error text
    #[error("{operation} failed: {message}")]
    Provider { operation: String, message: String },

    /// Provider response lacked a field the workflow depends on
    #[error("{operation} returned no {field}")]
    MissingField { operation: String, field: String },

    /// Trust policy could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Post-provisioning check found policies that are not attached
    #[error("Role {role_name} is missing managed policies: {}", missing.join(", "))]
    MissingPolicies {
        role_name: String,
        missing: Vec<String>,
    },
}

impl IamError {
    /// Provider failure for an operation
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
