//! The orchestrator's state: a process-local, concurrency-safe map from
//! session id to mutable session record, backing C8's state machine, log
//! buffer and stage memory. Actual pipeline orchestration (invoking C1,
//! C2, C4-C7) is wired by `forge_cli`, which alone depends on every
//! component crate; this module owns only the durable session state those
//! pipelines advance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::{CoreError, CoreResult};
use crate::log::{LogBuffer, LogEntry, LogSeverity};
use crate::memory::StageMemory;
use crate::session::{DeploymentShape, RepositoryRef, SessionId, WorkflowSession, WorkflowState};

/// Process-local workflow engine. Cloning is cheap (`Arc` internally) so a
/// single instance is shared across the binary's async tasks.
#[derive(Clone)]
pub struct WorkflowEngine {
    sessions: Arc<RwLock<HashMap<SessionId, WorkflowSession>>>,
    logs: Arc<RwLock<HashMap<SessionId, LogBuffer>>>,
    memory: Arc<RwLock<HashMap<SessionId, StageMemory>>>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            logs: Arc::new(RwLock::new(HashMap::new())),
            memory: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a new session in `Pending` state.
    pub async fn create_session(&self, caller_id: impl Into<String>, repository: RepositoryRef, shape: DeploymentShape) -> WorkflowSession {
        let session = WorkflowSession::new(caller_id, repository, shape);
        info!(session = %session.id, "created session");
        self.sessions.write().await.insert(session.id, session.clone());
        self.logs.write().await.insert(session.id, LogBuffer::new());
        self.memory.write().await.insert(session.id, StageMemory::new());
        session
    }

    pub async fn get_session(&self, id: SessionId) -> CoreResult<WorkflowSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CoreError::SessionNotFound(id))
    }

    /// Advance a session's state, enforcing the forward-only edges of the
    /// state diagram (P3). Never holds the write lock across an await.
    pub async fn transition(&self, id: SessionId, next: WorkflowState) -> CoreResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::SessionNotFound(id))?;
        if !session.state.can_transition_to(next) {
            error!(session = %id, from = ?session.state, to = ?next, "rejected illegal transition");
            return Err(CoreError::InvalidTransition {
                session: id,
                from: session.state,
                to: next,
            });
        }
        debug!(session = %id, from = ?session.state, to = ?next, "transition");
        session.state = next;
        session.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Mark a session failed unconditionally (any non-terminal state may
    /// fail) and record the error text on the session (§4.8.5).
    pub async fn fail(&self, id: SessionId, error: impl Into<String>) -> CoreResult<()> {
        let error = error.into();
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::SessionNotFound(id))?;
        if session.state.is_terminal() {
            return Ok(());
        }
        session.state = WorkflowState::Failed;
        session.error = Some(error.clone());
        session.updated_at = chrono::Utc::now();
        drop(sessions);
        self.log(id, "engine", LogSeverity::Error, error).await?;
        Ok(())
    }

    pub async fn record_artifact_key(&self, id: SessionId, key: impl Into<String>) -> CoreResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::SessionNotFound(id))?;
        session.artifact_keys.push(key.into());
        Ok(())
    }

    pub async fn log(&self, id: SessionId, producer: impl Into<String>, severity: LogSeverity, text: impl Into<String>) -> CoreResult<usize> {
        let mut logs = self.logs.write().await;
        let buffer = logs.get_mut(&id).ok_or(CoreError::SessionNotFound(id))?;
        Ok(buffer.append(producer, severity, text))
    }

    /// Entries after `from_index`, for a reconnecting stream consumer (P1).
    pub async fn log_since(&self, id: SessionId, from_index: usize) -> CoreResult<Vec<LogEntry>> {
        let logs = self.logs.read().await;
        let buffer = logs.get(&id).ok_or(CoreError::SessionNotFound(id))?;
        Ok(buffer.since(from_index).to_vec())
    }

    pub async fn store_memory(&self, id: SessionId, key: impl Into<String>, content: serde_json::Value, producer: impl Into<String>) -> CoreResult<()> {
        let mut memory = self.memory.write().await;
        let mem = memory.get_mut(&id).ok_or(CoreError::SessionNotFound(id))?;
        mem.store(key, content, producer);
        Ok(())
    }

    pub async fn retrieve_memory(&self, id: SessionId, key: &str, reader: impl Into<String>) -> CoreResult<Option<serde_json::Value>> {
        let mut memory = self.memory.write().await;
        let mem = memory.get_mut(&id).ok_or(CoreError::SessionNotFound(id))?;
        Ok(mem.retrieve(key, reader).map(|item| item.content.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepositoryRef {
        RepositoryRef { owner: "acme".into(), name: "widgets".into() }
    }

    #[tokio::test]
    async fn create_and_transition_session() {
        let engine = WorkflowEngine::new();
        let session = engine.create_session("user-1", repo(), DeploymentShape::ContainerService).await;
        assert_eq!(session.state, WorkflowState::Pending);

        engine.transition(session.id, WorkflowState::Analyzing).await.unwrap();
        let refreshed = engine.get_session(session.id).await.unwrap();
        assert_eq!(refreshed.state, WorkflowState::Analyzing);
    }

    #[tokio::test]
    async fn illegal_transition_rejected() {
        let engine = WorkflowEngine::new();
        let session = engine.create_session("user-1", repo(), DeploymentShape::Vm).await;
        let err = engine.transition(session.id, WorkflowState::Completed).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn fail_is_idempotent_once_terminal() {
        let engine = WorkflowEngine::new();
        let session = engine.create_session("user-1", repo(), DeploymentShape::Vm).await;
        engine.fail(session.id, "boom").await.unwrap();
        engine.fail(session.id, "again").await.unwrap();
        let refreshed = engine.get_session(session.id).await.unwrap();
        assert_eq!(refreshed.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn unknown_session_errors() {
        let engine = WorkflowEngine::new();
        let bogus = SessionId::new();
        assert!(matches!(engine.get_session(bogus).await, Err(CoreError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn log_and_memory_round_trip() {
        let engine = WorkflowEngine::new();
        let session = engine.create_session("user-1", repo(), DeploymentShape::ContainerService).await;
        engine.log(session.id, "engine", LogSeverity::Info, "analyzing").await.unwrap();
        engine.log(session.id, "engine", LogSeverity::Info, "generating").await.unwrap();

        let tail = engine.log_since(session.id, 1).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].text, "generating");

        engine
            .store_memory(session.id, "github-analysis", serde_json::json!({"lang": "python"}), "inspector")
            .await
            .unwrap();
        let value = engine.retrieve_memory(session.id, "github-analysis", "context-analyzer").await.unwrap();
        assert_eq!(value.unwrap()["lang"], "python");
    }
}
