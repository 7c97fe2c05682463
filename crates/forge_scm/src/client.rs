//! Source-control collaborator client: a GitHub-App-style authentication
//! flow plus the handful of REST operations the inspector and the
//! generation pipeline's raise-change-request step need (§4.1A, §6).

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{ScmError, ScmResult};
use crate::models::{RepoEntry, RepositorySummary};

const JWT_EXPIRY_SECONDS: i64 = 600;
const JWT_CLOCK_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Serialize)]
struct JwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Everything the rest of the pipeline needs from the source-control host:
/// reads for C1, writes and change-request creation for the last
/// generation stage.
#[async_trait]
pub trait SourceControlClient: Send + Sync {
    async fn list_installation_repositories(&self) -> ScmResult<Vec<RepositorySummary>>;
    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> ScmResult<Vec<RepoEntry>>;
    async fn read_file(&self, owner: &str, repo: &str, path: &str) -> ScmResult<String>;
    async fn create_or_update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> ScmResult<()>;
    async fn open_change_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> ScmResult<u64>;
}

/// GitHub App client. Signs a short-lived JWT with the app's private key,
/// exchanges it for a per-installation access token before each batch of
/// calls, and never persists either token past the lifetime of one
/// inspector run.
pub struct GitHubAppClient {
    http: reqwest::Client,
    api_base: String,
    app_id: String,
    installation_id: u64,
    private_key_pem: Vec<u8>,
}

impl GitHubAppClient {
    pub fn new(api_base: impl Into<String>, app_id: impl Into<String>, installation_id: u64, private_key_pem: Vec<u8>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            app_id: app_id.into(),
            installation_id,
            private_key_pem,
        }
    }

    fn generate_jwt(&self) -> ScmResult<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        let claims = JwtClaims {
            iat: now - JWT_CLOCK_SKEW_SECONDS,
            exp: now + JWT_EXPIRY_SECONDS,
            iss: self.app_id.clone(),
        };
        let key = EncodingKey::from_rsa_pem(&self.private_key_pem)?;
        let token = encode(&Header::new(Algorithm::RS256), &claims, &key)?;
        Ok(token)
    }

    async fn installation_token(&self) -> ScmResult<String> {
        let jwt = self.generate_jwt()?;
        let url = format!("{}/app/installations/{}/access_tokens", self.api_base, self.installation_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        if response.status().as_u16() != 201 {
            return Err(ScmError::Host {
                status: response.status().as_u16(),
                message: "failed to get installation token".into(),
            });
        }
        debug!(installation_id = self.installation_id, "fetched installation token");
        #[derive(Deserialize)]
        struct TokenResponse {
            token: String,
        }
        let body: TokenResponse = response.json().await?;
        Ok(body.token)
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{owner}/{repo}/contents/{path}", self.api_base)
    }
}

#[async_trait]
impl SourceControlClient for GitHubAppClient {
    async fn list_installation_repositories(&self) -> ScmResult<Vec<RepositorySummary>> {
        let token = self.installation_token().await?;
        let url = format!("{}/installation/repositories", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScmError::Host {
                status: response.status().as_u16(),
                message: "failed to list installation repositories".into(),
            });
        }

        #[derive(Deserialize)]
        struct Repo {
            name: String,
            default_branch: String,
            owner: Owner,
        }
        #[derive(Deserialize)]
        struct Owner {
            login: String,
        }
        #[derive(Deserialize)]
        struct RepoList {
            repositories: Vec<Repo>,
        }
        let body: RepoList = response.json().await?;
        Ok(body
            .repositories
            .into_iter()
            .map(|r| RepositorySummary {
                owner: r.owner.login,
                name: r.name,
                default_branch: r.default_branch,
            })
            .collect())
    }

    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> ScmResult<Vec<RepoEntry>> {
        let token = self.installation_token().await?;
        let response = self
            .http
            .get(self.contents_url(owner, repo, path))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScmError::Host {
                status: response.status().as_u16(),
                message: format!("failed to list directory {path}"),
            });
        }

        #[derive(Deserialize)]
        struct Entry {
            path: String,
            #[serde(rename = "type")]
            kind: String,
        }
        let entries: Vec<Entry> = response.json().await?;
        Ok(entries
            .into_iter()
            .map(|e| RepoEntry { path: e.path, is_dir: e.kind == "dir" })
            .collect())
    }

    async fn read_file(&self, owner: &str, repo: &str, path: &str) -> ScmResult<String> {
        let token = self.installation_token().await?;
        let response = self
            .http
            .get(self.contents_url(owner, repo, path))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScmError::Host {
                status: response.status().as_u16(),
                message: format!("failed to read {path}"),
            });
        }

        #[derive(Deserialize)]
        struct FileContent {
            #[serde(rename = "type")]
            kind: String,
            content: String,
        }
        let data: FileContent = response.json().await?;
        if data.kind != "file" {
            return Err(ScmError::NotAFile(path.to_string()));
        }
        let cleaned: String = data.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(cleaned)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn create_or_update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> ScmResult<()> {
        let token = self.installation_token().await?;

        let sha = {
            let response = self
                .http
                .get(self.contents_url(owner, repo, path))
                .query(&[("ref", branch)])
                .bearer_auth(&token)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .send()
                .await?;
            if response.status().is_success() {
                #[derive(Deserialize)]
                struct Existing {
                    sha: String,
                }
                response.json::<Existing>().await.ok().map(|e| e.sha)
            } else {
                None
            }
        };

        let mut payload = json!({
            "message": message,
            "content": STANDARD.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }

        let response = self
            .http
            .put(self.contents_url(owner, repo, path))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScmError::Host {
                status: response.status().as_u16(),
                message: format!("failed to write {path}"),
            });
        }
        info!(%path, "wrote file via source-control collaborator");
        Ok(())
    }

    async fn open_change_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> ScmResult<u64> {
        let token = self.installation_token().await?;
        let url = format!("{}/repos/{owner}/{repo}/pulls", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&json!({"title": title, "body": body, "head": head_branch, "base": base_branch}))
            .send()
            .await?;

        if response.status().as_u16() != 201 {
            return Err(ScmError::Host {
                status: response.status().as_u16(),
                message: "failed to open change request".into(),
            });
        }

        #[derive(Deserialize)]
        struct Pr {
            number: u64,
        }
        let pr: Pr = response.json().await?;
        info!(number = pr.number, %title, "opened change request");
        Ok(pr.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_window_matches_expected_skew_and_expiry() {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        let claims = JwtClaims {
            iat: now - JWT_CLOCK_SKEW_SECONDS,
            exp: now + JWT_EXPIRY_SECONDS,
            iss: "12345".into(),
        };
        assert_eq!(claims.exp - claims.iat, JWT_EXPIRY_SECONDS + JWT_CLOCK_SKEW_SECONDS);
    }
}
