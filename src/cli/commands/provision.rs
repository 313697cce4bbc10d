//! `provision-role` command
//!
//! Stdout carries exactly one line, the role ARN (or the outcome as JSON
//! with `--json`). Progress goes to the log on stderr.

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ProvisionArgs;
use sagemaker_llm_ops::iam::{
    AwsIamBackend, IamBackend, InMemoryIamBackend, ProvisionOutcome, RoleProvisioner, RoleSpec,
};

/// Run the provision-role command
pub async fn run(args: ProvisionArgs, json_output: bool) -> Result<()> {
    let spec = RoleSpec::sagemaker_execution().with_role_name(args.role_name.clone());

    let outcome = if args.dry_run {
        info!(role_name = %spec.role_name, "Dry run against an in-memory account");
        provision(InMemoryIamBackend::default(), &spec, args.verify).await?
    } else {
        let backend = AwsIamBackend::from_env(args.region.clone()).await;
        provision(backend, &spec, args.verify).await?
    };

    if json_output {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        println!("{}", outcome.arn);
    }

    Ok(())
}

async fn provision<B: IamBackend>(
    backend: B,
    spec: &RoleSpec,
    verify: bool,
) -> Result<ProvisionOutcome> {
    let provisioner = RoleProvisioner::new(backend);

    let outcome = provisioner
        .ensure_role(spec)
        .await
        .with_context(|| format!("Failed to provision role {}", spec.role_name))?;

    if verify {
        provisioner
            .verify(spec)
            .await
            .context("Role verification failed")?;
        info!(role_name = %spec.role_name, "All managed policies attached");
    }

    Ok(outcome)
}
