//! Error types for artifact validation.

use thiserror::Error;

pub type ValidateResult<T> = Result<T, ValidateError>;

#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("no infrastructure files were provided to validate")]
    EmptyInput,
}
