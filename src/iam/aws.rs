//! IAM backend backed by the AWS SDK
//!
//! Credentials and region come from the standard AWS provider chain
//! (environment, shared profile, instance metadata). Provider errors are
//! rendered with [`DisplayErrorContext`] so the operator sees the same
//! text the service returned.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_iam::config::Region;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::Role;
use aws_sdk_iam::Client;
use tracing::debug;

use super::backend::IamBackend;
use super::error::IamError;
use super::types::RoleRecord;

/// IAM backend talking to AWS
#[derive(Debug, Clone)]
pub struct AwsIamBackend {
    client: Client,
}

impl AwsIamBackend {
    /// Wrap an existing SDK client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default provider chain
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self::new(Client::new(&config))
    }
}

fn record_from(role: &Role) -> RoleRecord {
    RoleRecord {
        role_name: role.role_name().to_string(),
        arn: role.arn().to_string(),
        // IAM returns the document URL-encoded
        trust_policy_document: role.assume_role_policy_document().map(str::to_string),
    }
}

#[async_trait]
impl IamBackend for AwsIamBackend {
    async fn get_role(&self, role_name: &str) -> Result<RoleRecord, IamError> {
        debug!(role_name, "GetRole");

        match self.client.get_role().role_name(role_name).send().await {
            Ok(output) => output
                .role()
                .map(record_from)
                .ok_or_else(|| IamError::MissingField {
                    operation: "GetRole".to_string(),
                    field: "Role".to_string(),
                }),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_no_such_entity_exception())
                    .unwrap_or(false);
                if not_found {
                    Err(IamError::NoSuchRole(role_name.to_string()))
                } else {
                    Err(IamError::provider("GetRole", DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    async fn create_role(
        &self,
        role_name: &str,
        trust_policy_document: &str,
    ) -> Result<RoleRecord, IamError> {
        debug!(role_name, "CreateRole");

        let result = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(trust_policy_document)
            .send()
            .await;

        match result {
            Ok(output) => output
                .role()
                .map(record_from)
                .ok_or_else(|| IamError::MissingField {
                    operation: "CreateRole".to_string(),
                    field: "Role".to_string(),
                }),
            Err(err) => {
                let exists = err
                    .as_service_error()
                    .map(|e| e.is_entity_already_exists_exception())
                    .unwrap_or(false);
                if exists {
                    Err(IamError::AlreadyExists(role_name.to_string()))
                } else {
                    Err(IamError::provider("CreateRole", DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    async fn update_trust_policy(
        &self,
        role_name: &str,
        trust_policy_document: &str,
    ) -> Result<(), IamError> {
        debug!(role_name, "UpdateAssumeRolePolicy");

        let result = self
            .client
            .update_assume_role_policy()
            .role_name(role_name)
            .policy_document(trust_policy_document)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_no_such_entity_exception())
                    .unwrap_or(false);
                if not_found {
                    Err(IamError::NoSuchRole(role_name.to_string()))
                } else {
                    Err(IamError::provider(
                        "UpdateAssumeRolePolicy",
                        DisplayErrorContext(&err).to_string(),
                    ))
                }
            }
        }
    }

    async fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), IamError> {
        debug!(role_name, policy_arn, "AttachRolePolicy");

        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| IamError::provider("AttachRolePolicy", DisplayErrorContext(&err).to_string()))
    }

    async fn list_attached_policies(&self, role_name: &str) -> Result<Vec<String>, IamError> {
        let mut arns = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_attached_role_policies()
                .role_name(role_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|err| {
                    IamError::provider("ListAttachedRolePolicies", DisplayErrorContext(&err).to_string())
                })?;

            arns.extend(
                output
                    .attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );

            match output.marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(arns)
    }
}
