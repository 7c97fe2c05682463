//! # forge_core
//!
//! The workflow engine: session lifecycle state machine, append-only log
//! buffer and shared stage memory that bind the generation and deployment
//! pipelines together.
//!
//! # Architecture
//!
//! - **Session**: one end-to-end generation or deployment run, identified
//!   by an opaque `SessionId` and carrying a forward-only lifecycle state.
//! - **LogBuffer**: append-only, per-session, indexed so a disconnected
//!   stream consumer can resume from its last-seen entry.
//! - **StageMemory**: per-session key/value store with an audit log of
//!   every store/retrieve call, the contract between generation stages.
//! - **WorkflowEngine**: the process-local, concurrency-safe map tying the
//!   three together; the actual pipeline orchestration that calls the
//!   other seven components lives in `forge_cli`, which alone depends on
//!   all of them.
//!
//! ```rust,ignore
//! use forge_core::{WorkflowEngine, RepositoryRef, DeploymentShape};
//!
//! let engine = WorkflowEngine::new();
//! let session = engine.create_session(
//!     "caller-1",
//!     RepositoryRef { owner: "acme".into(), name: "widgets".into() },
//!     DeploymentShape::ContainerService,
//! ).await;
//! ```

pub mod engine;
pub mod error;
pub mod log;
pub mod memory;
pub mod session;

pub use engine::WorkflowEngine;
pub use error::{CoreError, CoreResult};
pub use log::{LogBuffer, LogEntry, LogSeverity};
pub use memory::{MemoryAction, MemoryEvent, StageMemory, StageMemoryItem};
pub use session::{DeploymentShape, RepositoryRef, SessionId, WorkflowSession, WorkflowState};

