//! Repository snapshot and inferred repository context (§3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw material gathered by the inspector (C1), consumed by the context
/// extraction agent (C2). Deliberately bounded — the inspector's duty is
/// to feed the next stage within a prompt budget, not to mirror the repo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub owner: String,
    pub name: String,
    pub paths: Vec<String>,
    pub manifests: HashMap<String, String>,
    pub configs: HashMap<String, String>,
    pub dominant_language: Option<String>,
    pub existing_dockerfile: Option<String>,
    pub existing_terraform: HashMap<String, String>,
    pub terraform_location: Option<String>,
}

impl RepositorySnapshot {
    pub fn has_existing_dockerfile(&self) -> bool {
        self.existing_dockerfile.is_some()
    }

    pub fn has_existing_terraform(&self) -> bool {
        !self.existing_terraform.is_empty()
    }
}

/// Structured description of a repository suitable for infra generation
/// (§3 "Repository context"), the single shared contract between
/// generation stages.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepositoryContext {
    pub language: Option<String>,
    pub framework: Option<String>,
    pub runtime: Option<String>,
    pub package_manager: Option<String>,
    pub dependencies: HashMap<String, String>,
    pub deployment_target: Option<String>,
    pub ports: Vec<u16>,
    pub environment_variables: Vec<String>,
    pub health_check_path: Option<String>,
    pub start_command: Option<String>,
    pub build_command: Option<String>,
    #[serde(default)]
    pub has_existing_dockerfile: bool,
    #[serde(default)]
    pub has_existing_terraform: bool,
    pub terraform_location: Option<String>,
}

/// A file or directory entry returned by `list_directory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub path: String,
    pub is_dir: bool,
}

/// Summary of a repository accessible to an installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
}
