//! # forge_scm
//!
//! Repository inspection (C1) and the source-control collaborator client
//! that backs both the inspector's reads and the generation pipeline's
//! raise-change-request step.
//!
//! ```rust,ignore
//! use forge_scm::{GitHubAppClient, RepositoryInspector};
//!
//! let client = GitHubAppClient::new(api_base, app_id, installation_id, private_key_pem);
//! let inspector = RepositoryInspector::new(&client);
//! let snapshot = inspector.inspect("acme", "widgets").await?;
//! ```

pub mod client;
pub mod error;
pub mod inspector;
pub mod models;

pub use client::{GitHubAppClient, SourceControlClient};
pub use error::{ScmError, ScmResult};
pub use inspector::RepositoryInspector;
pub use models::{RepoEntry, RepositoryContext, RepositorySnapshot, RepositorySummary};
