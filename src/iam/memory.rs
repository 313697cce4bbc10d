//! In-memory IAM backend
//!
//! Deterministic stand-in for IAM used by tests and `provision-role --dry-run`.
//! Mirrors the provider semantics the provisioner relies on: names are
//! unique, ARNs are assigned once at creation, attachment is idempotent.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::backend::IamBackend;
use super::error::IamError;
use super::types::RoleRecord;

/// Account id used when none is given
pub const DEFAULT_ACCOUNT_ID: &str = "123456789012";

#[derive(Debug, Clone)]
struct StoredRole {
    arn: String,
    trust_policy_document: String,
    attached: BTreeSet<String>,
}

/// Per-operation call counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_role: usize,
    pub create_role: usize,
    pub update_trust_policy: usize,
    pub attach_policy: usize,
}

#[derive(Debug, Default)]
struct State {
    roles: HashMap<String, StoredRole>,
    calls: CallCounts,
    fail_operation: Option<String>,
}

/// IAM backend that keeps roles in memory
#[derive(Debug)]
pub struct InMemoryIamBackend {
    account_id: String,
    state: Mutex<State>,
}

impl Default for InMemoryIamBackend {
    fn default() -> Self {
        Self::new(DEFAULT_ACCOUNT_ID)
    }
}

impl InMemoryIamBackend {
    /// Empty account
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Seed a pre-existing role
    pub fn with_role(self, role_name: &str, trust_policy_document: &str) -> Self {
        let arn = self.arn_for(role_name);
        self.lock().roles.insert(
            role_name.to_string(),
            StoredRole {
                arn,
                trust_policy_document: trust_policy_document.to_string(),
                attached: BTreeSet::new(),
            },
        );
        self
    }

    /// Make every call to `operation` fail with a provider error
    pub fn failing_on(self, operation: &str) -> Self {
        self.lock().fail_operation = Some(operation.to_string());
        self
    }

    /// Snapshot of the call counters
    pub fn calls(&self) -> CallCounts {
        self.lock().calls.clone()
    }

    /// Number of roles in the account
    pub fn role_count(&self) -> usize {
        self.lock().roles.len()
    }

    fn arn_for(&self, role_name: &str) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, role_name)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failure(state: &State, operation: &str) -> Result<(), IamError> {
        match state.fail_operation.as_deref() {
            Some(op) if op == operation => Err(IamError::provider(
                operation,
                format!("An error occurred (AccessDenied) when calling the {} operation", operation),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl IamBackend for InMemoryIamBackend {
    async fn get_role(&self, role_name: &str) -> Result<RoleRecord, IamError> {
        let mut state = self.lock();
        state.calls.get_role += 1;
        Self::check_failure(&state, "GetRole")?;

        state
            .roles
            .get(role_name)
            .map(|role| RoleRecord {
                role_name: role_name.to_string(),
                arn: role.arn.clone(),
                trust_policy_document: Some(role.trust_policy_document.clone()),
            })
            .ok_or_else(|| IamError::NoSuchRole(role_name.to_string()))
    }

    async fn create_role(
        &self,
        role_name: &str,
        trust_policy_document: &str,
    ) -> Result<RoleRecord, IamError> {
        let arn = self.arn_for(role_name);
        let mut state = self.lock();
        state.calls.create_role += 1;
        Self::check_failure(&state, "CreateRole")?;

        if state.roles.contains_key(role_name) {
            return Err(IamError::AlreadyExists(role_name.to_string()));
        }

        state.roles.insert(
            role_name.to_string(),
            StoredRole {
                arn: arn.clone(),
                trust_policy_document: trust_policy_document.to_string(),
                attached: BTreeSet::new(),
            },
        );

        Ok(RoleRecord {
            role_name: role_name.to_string(),
            arn,
            trust_policy_document: Some(trust_policy_document.to_string()),
        })
    }

    async fn update_trust_policy(
        &self,
        role_name: &str,
        trust_policy_document: &str,
    ) -> Result<(), IamError> {
        let mut state = self.lock();
        state.calls.update_trust_policy += 1;
        Self::check_failure(&state, "UpdateAssumeRolePolicy")?;

        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| IamError::NoSuchRole(role_name.to_string()))?;
        role.trust_policy_document = trust_policy_document.to_string();
        Ok(())
    }

    async fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), IamError> {
        let mut state = self.lock();
        state.calls.attach_policy += 1;
        Self::check_failure(&state, "AttachRolePolicy")?;

        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| IamError::NoSuchRole(role_name.to_string()))?;
        role.attached.insert(policy_arn.to_string());
        Ok(())
    }

    async fn list_attached_policies(&self, role_name: &str) -> Result<Vec<String>, IamError> {
        let state = self.lock();
        Self::check_failure(&state, "ListAttachedRolePolicies")?;

        state
            .roles
            .get(role_name)
            .map(|role| role.attached.iter().cloned().collect())
            .ok_or_else(|| IamError::NoSuchRole(role_name.to_string()))
    }
}
