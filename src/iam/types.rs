//! IAM role and policy types

use serde::{Deserialize, Serialize};

/// Role provisioned for SageMaker execution
pub const SAGEMAKER_ROLE_NAME: &str = "SageMakerExecutionRoleTest";

/// Service principal allowed to assume the execution role
pub const SAGEMAKER_SERVICE_PRINCIPAL: &str = "sagemaker.amazonaws.com";

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Managed policies attached to the execution role
pub const SAGEMAKER_MANAGED_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/AmazonSageMakerFullAccess",
    "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
];

/// Principal block of a trust policy statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: String,
}

/// Single trust policy statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustStatement {
    #[serde(rename = "Effect")]
    pub effect: String,
    #[serde(rename = "Principal")]
    pub principal: Principal,
    #[serde(rename = "Action")]
    pub action: String,
}

/// Trust policy document declaring who may assume a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<TrustStatement>,
}

impl TrustPolicy {
    /// Allow a single AWS service to assume the role
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![TrustStatement {
                effect: "Allow".to_string(),
                principal: Principal {
                    service: service.into(),
                },
                action: "sts:AssumeRole".to_string(),
            }],
        }
    }

    /// Trust policy for SageMaker execution roles
    pub fn sagemaker() -> Self {
        Self::for_service(SAGEMAKER_SERVICE_PRINCIPAL)
    }

    /// Serialize to the JSON document IAM expects
    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a JSON policy document
    pub fn from_document(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }
}

/// Desired state of a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub role_name: String,
    pub trust_policy: TrustPolicy,
    pub managed_policy_arns: Vec<String>,
}

impl RoleSpec {
    /// The fixed SageMaker execution role
    pub fn sagemaker_execution() -> Self {
        Self {
            role_name: SAGEMAKER_ROLE_NAME.to_string(),
            trust_policy: TrustPolicy::sagemaker(),
            managed_policy_arns: SAGEMAKER_MANAGED_POLICIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Same spec with a different role name
    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = role_name.into();
        self
    }
}

/// Role as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub role_name: String,
    pub arn: String,
    /// Trust policy document exactly as the provider returned it
    pub trust_policy_document: Option<String>,
}

/// Result of ensuring a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub arn: String,
    /// `true` if the role was created by this run
    pub created: bool,
    pub attached_policies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sagemaker_trust_policy_document() {
        let document = TrustPolicy::sagemaker().to_document().unwrap();
        let value: serde_json::Value = serde_json::from_str(&document).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": {"Service": "sagemaker.amazonaws.com"},
                    "Action": "sts:AssumeRole"
                }]
            })
        );
    }

    #[test]
    fn test_execution_role_spec() {
        let spec = RoleSpec::sagemaker_execution();
        assert_eq!(spec.role_name, "SageMakerExecutionRoleTest");
        assert_eq!(spec.managed_policy_arns.len(), 3);
        assert!(spec
            .managed_policy_arns
            .iter()
            .all(|arn| arn.starts_with("arn:aws:iam::aws:policy/")));
    }
}
