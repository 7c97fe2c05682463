//! Error types for the sandbox executor (C7).

use thiserror::Error;

pub type RunnerResult<T> = Result<T, RunnerError>;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("docker not available: {0}")]
    DockerNotAvailable(String),

    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("command timed out after {0} seconds")]
    Timeout(u64),

    #[error("bootstrap of {tool} failed: {message}")]
    BootstrapFailed { tool: String, message: String },

    #[error("sandbox already killed")]
    AlreadyKilled,

    #[error("docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
