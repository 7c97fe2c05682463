//! Error types for the artifact store (C5).

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object store returned an error for bucket {bucket}, key {key}: {message}")]
    Backend { bucket: String, key: String, message: String },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("forge_core error: {0}")]
    Core(#[from] forge_core::CoreError),
}
