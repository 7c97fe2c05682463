//! # forge_store
//!
//! Artifact Store (C5, §4.5): deterministic per-repository object paths for
//! generated files, a separate versioned-and-lockable prefix for
//! infra-code state, and time-bounded signed read links. Also backs the
//! stage-memory persistence contract (§4.3) by snapshotting a session's
//! [`forge_core::StageMemory`] under a session-scoped key so it can be
//! reconstituted after the in-process workflow session is reaped.

pub mod error;
pub mod memory_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory_store::MemoryStore;
pub use store::{artifact_key, ArtifactStore, StateVersion};
