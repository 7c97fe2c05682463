//! # forge_runner
//!
//! Sandbox Executor (C7, §4.7): an ephemeral, isolated environment with a
//! bounded lifetime, three primitives (write-file, run-command, kill),
//! idempotent tool bootstrapping, and one-shot credential delivery.
//!
//! ```rust,no_run
//! use forge_runner::{DockerSandboxProvider, SandboxProvider};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let provider = DockerSandboxProvider::new("ubuntu:22.04").await?;
//! let sandbox = provider.provision().await?;
//! sandbox.bootstrap().await?;
//! let result = sandbox.run_command(&["terraform".into(), "version".into()], None, None).await?;
//! sandbox.kill().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mock_sandbox;
pub mod sandbox;

pub use error::{RunnerError, RunnerResult};
pub use mock_sandbox::{CapturedCommand, MockSandbox};
pub use sandbox::{
    CommandResult, DockerSandbox, DockerSandboxProvider, OutputObserver, Sandbox, SandboxProvider, StreamKind,
    DEFAULT_COMMAND_TIMEOUT, MAX_COMMAND_TIMEOUT, MAX_SANDBOX_LIFETIME,
};
