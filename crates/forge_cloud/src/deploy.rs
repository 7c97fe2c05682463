//! Sandbox-driven deployment sub-operations (§4.8.3): `plan`, `apply`,
//! `destroy` against a caller's infra-code, and the `build-image`
//! prerequisite. Each call assumes the caller's role, spins up a sandbox,
//! and streams every line back through the caller's observer.

use std::collections::HashMap;

use forge_runner::{OutputObserver, Sandbox};

use crate::broker::AssumedCredentials;
use crate::error::{CloudError, CloudResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerraformVerb {
    Plan,
    Apply,
    Destroy,
}

impl TerraformVerb {
    fn args(self) -> &'static [&'static str] {
        match self {
            TerraformVerb::Plan => &["terraform", "plan", "-input=false", "-no-color"],
            TerraformVerb::Apply => &["terraform", "apply", "-auto-approve", "-input=false", "-no-color"],
            TerraformVerb::Destroy => &["terraform", "destroy", "-auto-approve", "-input=false", "-no-color"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TerraformVerb::Plan => "plan",
            TerraformVerb::Apply => "apply",
            TerraformVerb::Destroy => "destroy",
        }
    }
}

fn credentials_env(credentials: &AssumedCredentials) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("AWS_ACCESS_KEY_ID".to_string(), credentials.access_key_id.clone());
    env.insert("AWS_SECRET_ACCESS_KEY".to_string(), credentials.secret_access_key.clone());
    env.insert("AWS_SESSION_TOKEN".to_string(), credentials.session_token.clone());
    env
}

/// Outcome of a terraform run: the transcript for [`crate::summary::summarize`]
/// plus, for a successful `apply`, the structured outputs fetched separately
/// rather than scraped out of that transcript.
#[derive(Debug, Clone)]
pub struct TerraformRunResult {
    pub stdout: String,
    pub outputs_json: Option<String>,
}

/// Idempotent pre-flight for `apply`: the container-service's AWS-managed
/// service-linked role must exist before ECS can create a service. Ignores
/// the "already exists" error from a prior apply in the same account.
async fn ensure_service_linked_role(sandbox: &dyn Sandbox, observer: Option<OutputObserver<'_>>) -> CloudResult<()> {
    let result = sandbox
        .run_command(
            &["sh".into(), "-c".into(), "aws iam create-service-linked-role --aws-service-name ecs.amazonaws.com".into()],
            None,
            observer,
        )
        .await?;
    if !result.success() && !result.stdout.contains("has been taken in this account") {
        return Err(CloudError::TerraformFailed { stage: "service-linked-role", message: result.stdout });
    }
    Ok(())
}

/// Uploads a rendered Terraform stack into the sandbox, runs `terraform
/// init`, then the requested verb. `apply` additionally runs the
/// service-linked-role pre-flight first and fetches structured outputs
/// afterward via `terraform output -json`.
pub async fn run_terraform(
    sandbox: &dyn Sandbox,
    files: &HashMap<String, String>,
    credentials: &AssumedCredentials,
    verb: TerraformVerb,
    mut observer: Option<OutputObserver<'_>>,
) -> CloudResult<TerraformRunResult> {
    sandbox.deliver_credentials(&credentials_env(credentials)).await?;
    sandbox.bootstrap().await?;

    for (name, content) in files {
        sandbox.write_file(&format!("/workspace/{name}"), content.as_bytes()).await?;
    }

    let init = sandbox
        .run_command(&["sh".into(), "-c".into(), "cd /workspace && terraform init -input=false".into()], None, observer.as_deref_mut())
        .await?;
    if !init.success() {
        return Err(CloudError::TerraformFailed { stage: "init", message: init.stdout });
    }

    if verb == TerraformVerb::Apply {
        ensure_service_linked_role(sandbox, observer.as_deref_mut()).await?;
    }

    let shell_command = format!("cd /workspace && {}", verb.args().join(" "));
    let wrapped = vec!["sh".to_string(), "-c".to_string(), shell_command];

    let result = sandbox.run_command(&wrapped, Some(forge_runner::MAX_COMMAND_TIMEOUT), observer.as_deref_mut()).await?;
    if !result.success() {
        return Err(CloudError::TerraformFailed { stage: verb.label(), message: result.stdout });
    }

    let outputs_json = if verb == TerraformVerb::Apply {
        let outputs = sandbox
            .run_command(&["sh".into(), "-c".into(), "cd /workspace && terraform output -json".into()], None, observer)
            .await?;
        outputs.success().then_some(outputs.stdout)
    } else {
        None
    };

    Ok(TerraformRunResult { stdout: result.stdout, outputs_json })
}

/// Per-caller state bucket name, isolating each account's Terraform state.
pub fn state_bucket_name(base_bucket: &str, account_id: &str) -> String {
    format!("{base_bucket}-{account_id}")
}

/// Target ECR repository URI for a sanitized repository name in the
/// caller's account.
pub fn image_repository_uri(account_id: &str, region: &str, repo_name_sanitized: &str) -> String {
    format!("{account_id}.dkr.ecr.{region}.amazonaws.com/{repo_name_sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_bucket_is_suffixed_by_account_id() {
        assert_eq!(state_bucket_name("forge-state", "123456789012"), "forge-state-123456789012");
    }

    #[test]
    fn image_repository_uri_follows_ecr_shape() {
        assert_eq!(image_repository_uri("123456789012", "us-west-2", "acme-widgets"), "123456789012.dkr.ecr.us-west-2.amazonaws.com/acme-widgets");
    }
}
