//! Error types for infra-as-code template generation.

use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("cannot generate infrastructure for an unrecognized deployment target: {0}")]
    UnsupportedTarget(String),
}
