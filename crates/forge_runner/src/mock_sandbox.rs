//! In-memory [`Sandbox`] for tests: captures every call and returns
//! predefined responses, mirroring the teacher's `MockRunner` pattern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::RunnerResult;
use crate::sandbox::{CommandResult, OutputObserver, Sandbox};

#[derive(Debug, Clone)]
pub struct CapturedCommand {
    pub command: Vec<String>,
}

#[derive(Clone)]
pub struct MockSandbox {
    responses: Arc<RwLock<Vec<CommandResult>>>,
    response_index: Arc<AtomicUsize>,
    captured: Arc<RwLock<Vec<CapturedCommand>>>,
    written_files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    killed: Arc<RwLock<bool>>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            captured: Arc::new(RwLock::new(Vec::new())),
            written_files: Arc::new(RwLock::new(HashMap::new())),
            killed: Arc::new(RwLock::new(false)),
        }
    }

    pub fn add_response(self, result: CommandResult) -> Self {
        self.responses.write().push(result);
        self
    }

    pub fn captured_commands(&self) -> Vec<CapturedCommand> {
        self.captured.read().clone()
    }

    pub fn written_file(&self, path: &str) -> Option<Vec<u8>> {
        self.written_files.read().get(path).cloned()
    }

    pub fn is_killed(&self) -> bool {
        *self.killed.read()
    }
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn write_file(&self, path: &str, content: &[u8]) -> RunnerResult<()> {
        self.written_files.write().insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn run_command(
        &self,
        command: &[String],
        _timeout: Option<Duration>,
        observer: Option<OutputObserver<'_>>,
    ) -> RunnerResult<CommandResult> {
        self.captured.write().push(CapturedCommand { command: command.to_vec() });
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        let result = self.responses.read().get(index).cloned().unwrap_or(CommandResult { exit_code: 0, stdout: String::new() });
        if let Some(obs) = observer {
            obs(crate::sandbox::StreamKind::Stdout, &result.stdout);
        }
        Ok(result)
    }

    async fn kill(&self) -> RunnerResult<()> {
        *self.killed.write() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_responses_in_order_and_captures_commands() {
        let sandbox = MockSandbox::new()
            .add_response(CommandResult { exit_code: 0, stdout: "first".into() })
            .add_response(CommandResult { exit_code: 1, stdout: "second".into() });

        let first = sandbox.run_command(&["terraform".into(), "plan".into()], None, None).await.unwrap();
        let second = sandbox.run_command(&["terraform".into(), "apply".into()], None, None).await.unwrap();

        assert_eq!(first.stdout, "first");
        assert_eq!(second.exit_code, 1);
        assert_eq!(sandbox.captured_commands().len(), 2);
    }

    #[tokio::test]
    async fn write_file_is_recorded() {
        let sandbox = MockSandbox::new();
        sandbox.write_file("/forge/credentials.sh", b"export A=1").await.unwrap();
        assert_eq!(sandbox.written_file("/forge/credentials.sh"), Some(b"export A=1".to_vec()));
    }

    #[tokio::test]
    async fn kill_is_idempotent_and_observable() {
        let sandbox = MockSandbox::new();
        assert!(!sandbox.is_killed());
        sandbox.kill().await.unwrap();
        sandbox.kill().await.unwrap();
        assert!(sandbox.is_killed());
    }
}
