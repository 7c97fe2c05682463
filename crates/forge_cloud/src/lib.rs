//! # forge_cloud
//!
//! Credential Broker (C6, §4.6) and the sandbox-driven deployment
//! sub-operations of the Workflow Engine's deployment pipeline (§4.8.3):
//! `plan`/`apply`/`destroy`/`build-image`, plus deployment summary
//! bucketing for the caller-facing display (§9A).
//!
//! ## Example
//!
//! ```rust,no_run
//! use forge_cloud::CredentialBroker;
//! use aws_sdk_sts::Client as StsClient;
//!
//! # async fn run(sts: StsClient) {
//! let broker = CredentialBroker::new(sts, "111122223333", "us-west-2");
//! let init = broker.initiate("acme-corp");
//! println!("{}", init.console_url);
//! # }
//! ```

pub mod broker;
pub mod deploy;
pub mod error;
pub mod project;
pub mod summary;

pub use broker::{AssumedCredentials, ConnectionInit, ConnectionRecord, ConnectionStatus, CredentialBroker};
pub use deploy::{image_repository_uri, run_terraform, state_bucket_name, TerraformRunResult, TerraformVerb};
pub use error::{CloudError, CloudResult};
pub use project::{DeploymentSummaryRecord, ProjectRecord};
pub use summary::{summarize, DeploymentSummary, ResourceGroup};
