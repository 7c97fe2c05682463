//! Environment-sourced wiring for the pipeline's seven collaborator
//! crates. Every command builds the same set of clients from the same
//! environment, so credentials and endpoints live in exactly one place.

use std::env;

use anyhow::{Context, Result};
use forge_agents::HttpReasoningClient;
use forge_cloud::CredentialBroker;
use forge_runner::DockerSandboxProvider;
use forge_scm::GitHubAppClient;
use forge_store::ArtifactStore;

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

pub struct AppConfig {
    pub region: String,
    pub account_id: String,
    pub artifacts_bucket: String,
    pub state_bucket: String,
    pub lock_table: String,
    pub context_analyzer_agent_id: String,
    pub context_analyzer_alias_id: String,
    pub dockerfile_generator_agent_id: String,
    pub dockerfile_generator_alias_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            region: optional("FORGE_AWS_REGION", "us-west-2"),
            account_id: required("FORGE_AWS_ACCOUNT_ID")?,
            artifacts_bucket: required("FORGE_ARTIFACTS_BUCKET")?,
            state_bucket: required("FORGE_STATE_BUCKET")?,
            lock_table: optional("FORGE_LOCK_TABLE", "forge-terraform-locks"),
            context_analyzer_agent_id: required("FORGE_CONTEXT_ANALYZER_AGENT_ID")?,
            context_analyzer_alias_id: optional("FORGE_CONTEXT_ANALYZER_ALIAS_ID", "TSTALIASID"),
            dockerfile_generator_agent_id: required("FORGE_DOCKERFILE_GENERATOR_AGENT_ID")?,
            dockerfile_generator_alias_id: optional("FORGE_DOCKERFILE_GENERATOR_ALIAS_ID", "TSTALIASID"),
        })
    }

    pub fn scm_client(&self) -> Result<GitHubAppClient> {
        let api_base = optional("FORGE_GITHUB_API_BASE", "https://api.github.com");
        let app_id = required("FORGE_GITHUB_APP_ID")?;
        let installation_id: u64 = required("FORGE_GITHUB_INSTALLATION_ID")?
            .parse()
            .context("FORGE_GITHUB_INSTALLATION_ID must be a positive integer")?;
        let private_key_path = required("FORGE_GITHUB_PRIVATE_KEY_PATH")?;
        let private_key_pem = std::fs::read(&private_key_path)
            .with_context(|| format!("failed to read GitHub App private key at {private_key_path}"))?;
        Ok(GitHubAppClient::new(api_base, app_id, installation_id, private_key_pem))
    }

    pub fn reasoning_client(&self) -> HttpReasoningClient {
        let base_url = optional("FORGE_AGENT_RUNTIME_URL", "http://localhost:8090");
        HttpReasoningClient::new(base_url)
    }

    pub async fn artifact_store(&self) -> ArtifactStore {
        let sdk_config = aws_config::load_from_env().await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        ArtifactStore::new(client, self.artifacts_bucket.clone(), self.state_bucket.clone())
    }

    pub async fn credential_broker(&self) -> CredentialBroker {
        let sdk_config = aws_config::load_from_env().await;
        let sts = aws_sdk_sts::Client::new(&sdk_config);
        CredentialBroker::new(sts, self.account_id.clone(), self.region.clone())
    }

    pub async fn sandbox_provider(&self) -> Result<DockerSandboxProvider> {
        let image = optional("FORGE_SANDBOX_IMAGE", "ubuntu:22.04");
        DockerSandboxProvider::new(image).await.context("failed to connect to the Docker daemon")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // env::set_var mutates process-wide state, so these tests share a lock
    // to avoid racing each other across threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn optional_falls_back_to_default_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("FORGE_TEST_OPTIONAL_VAR");
        assert_eq!(optional("FORGE_TEST_OPTIONAL_VAR", "fallback"), "fallback");
    }

    #[test]
    fn optional_uses_set_value_over_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("FORGE_TEST_OPTIONAL_VAR", "custom");
        assert_eq!(optional("FORGE_TEST_OPTIONAL_VAR", "fallback"), "custom");
        env::remove_var("FORGE_TEST_OPTIONAL_VAR");
    }

    #[test]
    fn required_errors_with_the_variable_name_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("FORGE_TEST_REQUIRED_VAR");
        let err = required("FORGE_TEST_REQUIRED_VAR").unwrap_err();
        assert!(err.to_string().contains("FORGE_TEST_REQUIRED_VAR"));
    }

    #[test]
    fn from_env_reports_missing_account_id() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("FORGE_AWS_ACCOUNT_ID");
        env::remove_var("FORGE_ARTIFACTS_BUCKET");
        env::remove_var("FORGE_STATE_BUCKET");
        env::remove_var("FORGE_CONTEXT_ANALYZER_AGENT_ID");
        env::remove_var("FORGE_DOCKERFILE_GENERATOR_AGENT_ID");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("FORGE_AWS_ACCOUNT_ID"));
    }
}
