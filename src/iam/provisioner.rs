//! Idempotent role provisioning
//!
//! `ensure_role` drives any [`IamBackend`] to the state described by a
//! [`RoleSpec`]:
//!
//! ```text
//! CreateRole ──ok──────────────────────────────┐
//!     │                                        ▼
//!     └─AlreadyExists─► UpdateAssumeRolePolicy ─► GetRole ─► AttachRolePolicy × N
//! ```
//!
//! The create is attempted first because the provider rejects duplicate
//! names atomically. Two concurrent runs therefore never produce two roles;
//! the loser falls through to the update path.

use tracing::{info, warn};

use super::backend::IamBackend;
use super::error::IamError;
use super::types::{ProvisionOutcome, RoleSpec};

/// Provisions roles through a backend
pub struct RoleProvisioner<B> {
    backend: B,
}

impl<B: IamBackend> RoleProvisioner<B> {
    /// Create a provisioner over a backend
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Access the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Make the role exist with the given trust policy and managed policies
    ///
    /// Errors other than "already exists" abort immediately; no call is
    /// retried.
    pub async fn ensure_role(&self, spec: &RoleSpec) -> Result<ProvisionOutcome, IamError> {
        let document = spec.trust_policy.to_document()?;

        let (arn, created) = match self.backend.create_role(&spec.role_name, &document).await {
            Ok(record) => {
                info!(role_name = %spec.role_name, arn = %record.arn, "Created role");
                (record.arn, true)
            }
            Err(IamError::AlreadyExists(_)) => {
                self.backend
                    .update_trust_policy(&spec.role_name, &document)
                    .await?;
                let record = self.backend.get_role(&spec.role_name).await?;
                info!(role_name = %spec.role_name, arn = %record.arn, "Updated trust policy of existing role");
                (record.arn, false)
            }
            Err(e) => return Err(e),
        };

        for policy_arn in &spec.managed_policy_arns {
            self.backend.attach_policy(&spec.role_name, policy_arn).await?;
            info!(role_name = %spec.role_name, policy_arn = %policy_arn, "Attached managed policy");
        }

        Ok(ProvisionOutcome {
            arn,
            created,
            attached_policies: spec.managed_policy_arns.clone(),
        })
    }

    /// Check that every managed policy of the role spec is attached
    pub async fn verify(&self, spec: &RoleSpec) -> Result<(), IamError> {
        let attached = self.backend.list_attached_policies(&spec.role_name).await?;

        let missing: Vec<String> = spec
            .managed_policy_arns
            .iter()
            .filter(|arn| !attached.contains(arn))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            warn!(role_name = %spec.role_name, ?missing, "Role is missing managed policies");
            Err(IamError::MissingPolicies {
                role_name: spec.role_name.clone(),
                missing,
            })
        }
    }
}
