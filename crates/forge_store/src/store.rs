//! Artifact Store (C5, §4.5): deterministic per-repository object paths,
//! with a separate versioned-and-lockable prefix for infra-code state.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::info;

use crate::error::{StoreError, StoreResult};

const DEFAULT_LINK_LIFETIME: Duration = Duration::from_secs(3600);

fn content_type_for(filename: &str) -> &'static str {
    if filename.ends_with(".tf") {
        "text/plain"
    } else if filename.ends_with(".yaml") || filename.ends_with(".yml") {
        "text/yaml"
    } else if filename.ends_with(".json") {
        "application/json"
    } else if filename == "Dockerfile" {
        "text/plain"
    } else {
        "text/plain"
    }
}

/// Builds the stable, deterministic key for a generated file: infra-code
/// under a `terraform/` subpath, the container recipe at the prefix root.
/// Writes always target this same key — versioning the content's history
/// is the underlying object store's job, not this one's.
pub fn artifact_key(owner: &str, repo: &str, filename: &str) -> String {
    if filename.ends_with(".tf") {
        format!("repositories/{owner}/{repo}/terraform/{filename}")
    } else {
        format!("repositories/{owner}/{repo}/{filename}")
    }
}

fn state_key(project_id: &str) -> String {
    format!("states/{project_id}/terraform.tfstate")
}

fn project_record_key(project_id: &str) -> String {
    format!("projects/{project_id}/record.json")
}

#[derive(Debug, Clone)]
pub struct StateVersion {
    pub version_id: String,
    pub is_latest: bool,
    pub size: i64,
}

pub struct ArtifactStore {
    client: Client,
    artifacts_bucket: String,
    state_bucket: String,
}

impl ArtifactStore {
    pub fn new(client: Client, artifacts_bucket: impl Into<String>, state_bucket: impl Into<String>) -> Self {
        Self { client, artifacts_bucket: artifacts_bucket.into(), state_bucket: state_bucket.into() }
    }

    /// Writes one generated file to its deterministic path, returning the key.
    pub async fn put_artifact(&self, owner: &str, repo: &str, filename: &str, content: &str) -> StoreResult<String> {
        let key = artifact_key(owner, repo, filename);
        self.client
            .put_object()
            .bucket(&self.artifacts_bucket)
            .key(&key)
            .body(content.as_bytes().to_vec().into())
            .content_type(content_type_for(filename))
            .send()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: key.clone(), message: e.to_string() })?;
        info!(%key, "wrote artifact");
        Ok(key)
    }

    pub async fn put_artifacts(&self, owner: &str, repo: &str, files: &[(String, String)]) -> StoreResult<Vec<String>> {
        let mut keys = Vec::with_capacity(files.len());
        for (filename, content) in files {
            keys.push(self.put_artifact(owner, repo, filename, content).await?);
        }
        Ok(keys)
    }

    /// Time-bounded signed URL for reading an artifact (default one hour).
    pub async fn presigned_url(&self, key: &str, lifetime: Option<Duration>) -> StoreResult<String> {
        let config = PresigningConfig::expires_in(lifetime.unwrap_or(DEFAULT_LINK_LIFETIME))
            .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: key.to_string(), message: e.to_string() })?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.artifacts_bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: key.to_string(), message: e.to_string() })?;
        Ok(presigned.uri().to_string())
    }

    /// Reads back one previously-written artifact, `None` if it doesn't exist.
    pub async fn get_artifact(&self, key: &str) -> StoreResult<Option<String>> {
        match self.client.get_object().bucket(&self.artifacts_bucket).key(key).send().await {
            Ok(response) => {
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: key.to_string(), message: e.to_string() })?;
                Ok(Some(String::from_utf8_lossy(&bytes.into_bytes()).into_owned()))
            }
            Err(err) => {
                if err.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    Ok(None)
                } else {
                    Err(StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: key.to_string(), message: err.to_string() })
                }
            }
        }
    }

    pub async fn list_repository_keys(&self, owner: &str, repo: &str) -> StoreResult<Vec<String>> {
        let prefix = format!("repositories/{owner}/{repo}/");
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.artifacts_bucket)
            .prefix(&prefix)
            .send()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: prefix.clone(), message: e.to_string() })?;
        Ok(response.contents().iter().filter_map(|o| o.key().map(str::to_string)).collect())
    }

    /// Writes Terraform state to its stable key, versioned by the store.
    /// Returns the resulting version id.
    pub async fn put_terraform_state(&self, project_id: &str, state_content: &str) -> StoreResult<String> {
        let key = state_key(project_id);
        let response = self
            .client
            .put_object()
            .bucket(&self.state_bucket)
            .key(&key)
            .body(state_content.as_bytes().to_vec().into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.state_bucket.clone(), key: key.clone(), message: e.to_string() })?;
        let version_id = response.version_id().unwrap_or("null").to_string();
        info!(%key, %version_id, "wrote terraform state");
        Ok(version_id)
    }

    pub async fn get_terraform_state(&self, project_id: &str, version_id: Option<&str>) -> StoreResult<Option<String>> {
        let key = state_key(project_id);
        let mut request = self.client.get_object().bucket(&self.state_bucket).key(&key);
        if let Some(version) = version_id {
            request = request.version_id(version);
        }
        match request.send().await {
            Ok(response) => {
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| StoreError::Backend { bucket: self.state_bucket.clone(), key: key.clone(), message: e.to_string() })?;
                Ok(Some(String::from_utf8_lossy(&bytes.into_bytes()).into_owned()))
            }
            Err(err) => {
                if err.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    Ok(None)
                } else {
                    Err(StoreError::Backend { bucket: self.state_bucket.clone(), key, message: err.to_string() })
                }
            }
        }
    }

    pub async fn list_terraform_state_versions(&self, project_id: &str) -> StoreResult<Vec<StateVersion>> {
        let key = state_key(project_id);
        let response = self
            .client
            .list_object_versions()
            .bucket(&self.state_bucket)
            .prefix(&key)
            .send()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.state_bucket.clone(), key: key.clone(), message: e.to_string() })?;
        Ok(response
            .versions()
            .iter()
            .filter(|v| v.key() == Some(key.as_str()))
            .map(|v| StateVersion {
                version_id: v.version_id().unwrap_or("null").to_string(),
                is_latest: v.is_latest().unwrap_or(false),
                size: v.size().unwrap_or(0),
            })
            .collect())
    }

    /// Writes a project's durable record (application URL, terraform
    /// outputs, deployment summary) to its deterministic path, overwriting
    /// whatever was there. `forge_cli` owns the JSON shape; this just stores
    /// bytes, the way `put_terraform_state` does for state.
    pub async fn put_project_record(&self, project_id: &str, record_json: &str) -> StoreResult<()> {
        let key = project_record_key(project_id);
        self.client
            .put_object()
            .bucket(&self.artifacts_bucket)
            .key(&key)
            .body(record_json.as_bytes().to_vec().into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: key.clone(), message: e.to_string() })?;
        info!(%key, "wrote project record");
        Ok(())
    }

    pub async fn get_project_record(&self, project_id: &str) -> StoreResult<Option<String>> {
        let key = project_record_key(project_id);
        match self.client.get_object().bucket(&self.artifacts_bucket).key(&key).send().await {
            Ok(response) => {
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key: key.clone(), message: e.to_string() })?;
                Ok(Some(String::from_utf8_lossy(&bytes.into_bytes()).into_owned()))
            }
            Err(err) => {
                if err.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    Ok(None)
                } else {
                    Err(StoreError::Backend { bucket: self.artifacts_bucket.clone(), key, message: err.to_string() })
                }
            }
        }
    }

    /// Clears a project's record back to bare (empty deployment fields),
    /// the `destroy` counterpart to `put_project_record` (§4.8.3 scenario 5).
    pub async fn delete_project_record(&self, project_id: &str) -> StoreResult<()> {
        let key = project_record_key(project_id);
        self.client
            .delete_object()
            .bucket(&self.artifacts_bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.artifacts_bucket.clone(), key, message: e.to_string() })?;
        Ok(())
    }

    /// Deletes every version of a project's Terraform state object, the
    /// cleanup step of a successful `destroy` (§4.8.3).
    pub async fn delete_all_terraform_state_versions(&self, project_id: &str) -> StoreResult<()> {
        for version in self.list_terraform_state_versions(project_id).await? {
            let key = state_key(project_id);
            self.client
                .delete_object()
                .bucket(&self.state_bucket)
                .key(&key)
                .version_id(&version.version_id)
                .send()
                .await
                .map_err(|e| StoreError::Backend { bucket: self.state_bucket.clone(), key, message: e.to_string() })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terraform_files_land_under_terraform_subpath() {
        assert_eq!(artifact_key("acme", "widgets", "main.tf"), "repositories/acme/widgets/terraform/main.tf");
    }

    #[test]
    fn container_recipe_lands_at_prefix_root() {
        assert_eq!(artifact_key("acme", "widgets", "Dockerfile"), "repositories/acme/widgets/Dockerfile");
    }

    #[test]
    fn state_key_is_scoped_by_project() {
        assert_eq!(state_key("proj-1"), "states/proj-1/terraform.tfstate");
    }

    #[test]
    fn project_record_key_is_scoped_by_project() {
        assert_eq!(project_record_key("proj-1"), "projects/proj-1/record.json");
    }
}
