//! # forge_templates
//!
//! Deterministic infra-as-code generation (§4 "ambient" infra layer). Given
//! a repository's inspected context, emits a complete Terraform stack for
//! an ECS Fargate deployment — no reasoning-service call is involved, the
//! shape of the stack never varies, only the values do.
//!
//! ## Example
//!
//! ```rust,no_run
//! use forge_templates::{generate_fargate_stack, BackendConfig};
//! use forge_scm::RepositoryContext;
//!
//! let context = RepositoryContext::default();
//! let backend = BackendConfig {
//!     state_bucket: "forge-state".into(),
//!     region: "us-west-2".into(),
//!     lock_table: "forge-locks".into(),
//! };
//! let files = generate_fargate_stack(&context, "proj-1", "acme/widgets", &backend);
//! assert!(files.contains_key("main.tf"));
//! ```

pub mod error;
pub mod generator;

pub use error::{TemplateError, TemplateResult};
pub use generator::{generate_fargate_stack, BackendConfig};
