//! Python dependency check-then-install

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use super::error::SmokeTestError;

/// Packages the serving entrypoint imports
pub const DEFAULT_PACKAGES: &[&str] = &["fastapi", "uvicorn", "vllm"];

/// What happened to one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStatus {
    Present(String),
    Installed(String),
}

/// pip packages that must be importable before the server starts
///
/// No version pinning and no rollback: a package that is present in any
/// version is left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipDependencies {
    /// Python interpreter used to run pip
    pub python: String,
    pub packages: Vec<String>,
}

impl Default for PipDependencies {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            packages: DEFAULT_PACKAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PipDependencies {
    /// Check every package and install the missing ones, in order
    pub async fn ensure(&self) -> Result<Vec<DependencyStatus>, SmokeTestError> {
        let mut statuses = Vec::with_capacity(self.packages.len());

        for package in &self.packages {
            if self.is_installed(package).await? {
                debug!(package = %package, "Dependency present");
                statuses.push(DependencyStatus::Present(package.clone()));
                continue;
            }

            info!(package = %package, "Installing missing dependency");
            self.install(package).await?;
            statuses.push(DependencyStatus::Installed(package.clone()));
        }

        Ok(statuses)
    }

    async fn is_installed(&self, package: &str) -> Result<bool, SmokeTestError> {
        let status = Command::new(&self.python)
            .args(["-m", "pip", "show", "--quiet", package])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| SmokeTestError::Dependency {
                package: package.to_string(),
                message: format!("failed to run {}: {}", self.python, e),
            })?;

        Ok(status.success())
    }

    async fn install(&self, package: &str) -> Result<(), SmokeTestError> {
        let output = Command::new(&self.python)
            .args(["-m", "pip", "install", package])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SmokeTestError::Dependency {
                package: package.to_string(),
                message: format!("failed to run {}: {}", self.python, e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SmokeTestError::Dependency {
                package: package.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
