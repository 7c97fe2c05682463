//! Error types for the workflow engine.

use thiserror::Error;

use crate::session::{SessionId, WorkflowState};

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while the engine manages session state, the log
/// buffer or stage memory. This is the sum type every component error
/// converts into at the point it crosses into the engine (see the
/// `EngineError` naming in the design notes) — the original `Display` text
/// of the wrapped error is always preserved.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("invalid state transition for session {session}: {from:?} -> {to:?}")]
    InvalidTransition {
        session: SessionId,
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("stage memory key not found: {0}")]
    MemoryKeyNotFound(String),

    #[error("upstream component failure: {0}")]
    Upstream(String),

    #[error("fatal workflow error: {0}")]
    Fatal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
