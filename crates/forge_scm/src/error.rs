//! Error types for repository inspection and source-control client calls.

use thiserror::Error;

pub type ScmResult<T> = Result<T, ScmError>;

#[derive(Error, Debug)]
pub enum ScmError {
    #[error("source-control host returned {status}: {message}")]
    Host { status: u16, message: String },

    #[error("path is not a file: {0}")]
    NotAFile(String),

    #[error("JWT signing failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("private key not found at {0}")]
    PrivateKeyNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
