//! IAM backend seam

use async_trait::async_trait;

use super::error::IamError;
use super::types::RoleRecord;

/// Minimal set of IAM calls the provisioner needs
///
/// Implementations must report a missing role as [`IamError::NoSuchRole`]
/// and a duplicate create as [`IamError::AlreadyExists`]; the provisioner
/// branches on those two and treats every other error as fatal.
#[async_trait]
pub trait IamBackend: Send + Sync {
    /// Look up a role by name
    async fn get_role(&self, role_name: &str) -> Result<RoleRecord, IamError>;

    /// Create a role; fails with `AlreadyExists` if the name is taken
    async fn create_role(
        &self,
        role_name: &str,
        trust_policy_document: &str,
    ) -> Result<RoleRecord, IamError>;

    /// Replace the trust policy of an existing role
    async fn update_trust_policy(
        &self,
        role_name: &str,
        trust_policy_document: &str,
    ) -> Result<(), IamError>;

    /// Attach a managed policy (no-op if already attached)
    async fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), IamError>;

    /// ARNs of managed policies attached to the role
    async fn list_attached_policies(&self, role_name: &str) -> Result<Vec<String>, IamError>;
}
