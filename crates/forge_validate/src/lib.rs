//! # forge_validate
//!
//! Artifact Validator (C4, §4.4): two fixed-rule-set validators that run
//! before a generated artifact is stored or applied. Errors fail the
//! pipeline; warnings are surfaced in the log and never block.
//!
//! ## Example
//!
//! ```rust
//! use forge_validate::validate_dockerfile;
//!
//! let report = validate_dockerfile("FROM node:20\nWORKDIR /app\nCOPY . .\nCMD [\"node\"]\n");
//! assert!(report.valid);
//! ```

pub mod dockerfile;
pub mod error;
pub mod infra;
pub mod report;

pub use dockerfile::validate_dockerfile;
pub use error::{ValidateError, ValidateResult};
pub use infra::validate_infra_code;
pub use report::ValidationReport;
