//! Error types for the credential broker and deployment pipeline.

use thiserror::Error;

pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("no connection has been initiated for this caller")]
    NotInitiated,

    #[error("role assumption verification failed: {0}")]
    VerificationFailed(String),

    #[error("account is not verified, complete the connection flow first")]
    NotVerified,

    #[error("failed to assume role: {0}")]
    AssumeRoleFailed(String),

    #[error("terraform {stage} failed: {message}")]
    TerraformFailed { stage: &'static str, message: String },

    #[error("sandbox error: {0}")]
    Runner(#[from] forge_runner::RunnerError),

    #[error("artifact store error: {0}")]
    Store(#[from] forge_store::StoreError),
}
