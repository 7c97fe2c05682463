//! Session identity, lifecycle state and the durable workflow record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one end-to-end generation or deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target shape selected for the generated infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentShape {
    ContainerService,
    Vm,
    Serverless,
}

/// Lifecycle state of a workflow session. Transitions are forward-only
/// except the universal edge into `Failed` (see `WorkflowState::can_transition_to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowState {
    Pending,
    Analyzing,
    Generating,
    AwaitingReview,
    ReadyToDeploy,
    Building,
    Planning,
    Applying,
    Completed,
    Failed,
    Destroying,
    Destroyed,
}

impl WorkflowState {
    /// Whether `self -> next` is a legal edge in the state diagram (§4.8.1).
    /// Any non-terminal state may transition to `Failed`.
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Analyzing)
                | (Analyzing, Generating)
                | (Generating, AwaitingReview)
                | (AwaitingReview, ReadyToDeploy)
                | (ReadyToDeploy, Building)
                | (Building, Planning)
                | (Planning, Applying)
                | (Applying, Completed)
                | (Completed, Destroying)
                | (Destroying, Destroyed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Destroyed)
    }
}

/// Repository reference the session operates against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

/// Durable record for one workflow session (§3 "Workflow session").
///
/// This record itself lives only as long as the process that created it —
/// each CLI invocation starts a fresh `WorkflowEngine`. The deploy-derived
/// subset worth keeping past that (`application_url`, `terraform_outputs`,
/// `deployment_summary`) is mirrored into a `ProjectRecord` in the artifact
/// store by `forge_cli`'s deploy command, not by this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub id: SessionId,
    pub caller_id: String,
    pub repository: RepositoryRef,
    pub shape: DeploymentShape,
    pub state: WorkflowState,
    pub artifact_keys: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSession {
    pub fn new(caller_id: impl Into<String>, repository: RepositoryRef, shape: DeploymentShape) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            caller_id: caller_id.into(),
            repository,
            shape,
            state: WorkflowState::Pending,
            artifact_keys: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_only_transitions() {
        assert!(WorkflowState::Pending.can_transition_to(WorkflowState::Analyzing));
        assert!(!WorkflowState::Analyzing.can_transition_to(WorkflowState::Pending));
        assert!(!WorkflowState::Completed.can_transition_to(WorkflowState::Analyzing));
    }

    #[test]
    fn any_non_terminal_state_can_fail() {
        assert!(WorkflowState::Building.can_transition_to(WorkflowState::Failed));
        assert!(WorkflowState::Planning.can_transition_to(WorkflowState::Failed));
        assert!(!WorkflowState::Failed.can_transition_to(WorkflowState::Failed));
    }

    #[test]
    fn completed_allows_destroy_sequence() {
        assert!(WorkflowState::Completed.can_transition_to(WorkflowState::Destroying));
        assert!(WorkflowState::Destroying.can_transition_to(WorkflowState::Destroyed));
    }
}
