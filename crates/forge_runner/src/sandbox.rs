//! Sandbox Executor (C7, §4.7): an ephemeral isolated environment with a
//! bounded lifetime, built on the same Docker API client the teacher used
//! for one-off container runs — here kept alive across a whole deployment
//! session instead of spun up per command.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::container::{Config as ContainerConfig, RemoveContainerOptions, StopContainerOptions};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RunnerError, RunnerResult};

pub const MAX_SANDBOX_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const MAX_COMMAND_TIMEOUT: Duration = Duration::from_secs(50 * 60);

const CREDENTIALS_PATH: &str = "/forge/credentials.sh";
const BOOTSTRAP_TOOLS: &[(&str, &str)] = &[
    ("terraform", "curl -fsSL https://releases.hashicorp.com/terraform/1.8.0/terraform_1.8.0_linux_amd64.zip -o /tmp/tf.zip && unzip -o /tmp/tf.zip -d /usr/local/bin"),
    ("docker", "curl -fsSL https://get.docker.com | sh"),
    ("aws", "curl -fsSL https://awscli.amazonaws.com/awscli-exe-linux-x86_64.zip -o /tmp/awscli.zip && unzip -o /tmp/awscli.zip -d /tmp && /tmp/aws/install"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

pub type OutputObserver<'a> = &'a mut dyn FnMut(StreamKind, &str);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: i64,
    pub stdout: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Write-file, run-command and kill against one ephemeral sandbox instance.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn write_file(&self, path: &str, content: &[u8]) -> RunnerResult<()>;

    async fn run_command(
        &self,
        command: &[String],
        timeout: Option<Duration>,
        observer: Option<OutputObserver<'_>>,
    ) -> RunnerResult<CommandResult>;

    async fn kill(&self) -> RunnerResult<()>;

    /// Writes cross-account credentials to a one-shot shell file each
    /// subsequent command sources; never baked into the sandbox image.
    async fn deliver_credentials(&self, env: &HashMap<String, String>) -> RunnerResult<()> {
        let script = env.iter().map(|(k, v)| format!("export {k}={v}\n")).collect::<String>();
        self.write_file(CREDENTIALS_PATH, script.as_bytes()).await
    }

    /// Idempotent tool installer: a no-op for any tool already present.
    async fn bootstrap(&self) -> RunnerResult<()> {
        for (tool, install) in BOOTSTRAP_TOOLS {
            let probe = self.run_command(&["sh".into(), "-c".into(), format!("command -v {tool}")], None, None).await?;
            if probe.success() {
                debug!(tool, "already present, skipping bootstrap");
                continue;
            }
            let result = self
                .run_command(&["sh".into(), "-c".into(), (*install).to_string()], Some(MAX_COMMAND_TIMEOUT), None)
                .await?;
            if !result.success() {
                return Err(RunnerError::BootstrapFailed { tool: tool.to_string(), message: result.stdout });
            }
            info!(tool, "bootstrapped");
        }
        Ok(())
    }
}

/// Provisions fresh [`Sandbox`] instances.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn provision(&self) -> RunnerResult<Box<dyn Sandbox>>;
}

pub struct DockerSandboxProvider {
    client: Docker,
    image: String,
}

impl DockerSandboxProvider {
    pub async fn new(image: impl Into<String>) -> RunnerResult<Self> {
        let client = Docker::connect_with_local_defaults()?;
        client.ping().await?;
        Ok(Self { client, image: image.into() })
    }
}

#[async_trait]
impl SandboxProvider for DockerSandboxProvider {
    async fn provision(&self) -> RunnerResult<Box<dyn Sandbox>> {
        let name = format!("forge-sandbox-{}", &Uuid::new_v4().to_string()[..8]);
        let config = ContainerConfig {
            image: Some(self.image.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            ..Default::default()
        };
        let container = self
            .client
            .create_container(Some(bollard::container::CreateContainerOptions { name: &name, platform: None }), config)
            .await?;
        self.client.start_container(&container.id, None::<bollard::container::StartContainerOptions<String>>).await?;
        info!(container_id = %container.id, "provisioned sandbox");
        Ok(Box::new(DockerSandbox { client: self.client.clone(), container_id: container.id, created_at: Instant::now(), killed: tokio::sync::Mutex::new(false) }))
    }
}

pub struct DockerSandbox {
    client: Docker,
    container_id: String,
    created_at: Instant,
    killed: tokio::sync::Mutex<bool>,
}

impl DockerSandbox {
    fn check_lifetime(&self) -> RunnerResult<()> {
        if self.created_at.elapsed() > MAX_SANDBOX_LIFETIME {
            return Err(RunnerError::ExecutionFailed("sandbox exceeded its maximum lifetime".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn write_file(&self, path: &str, content: &[u8]) -> RunnerResult<()> {
        self.check_lifetime()?;
        let exec = self
            .client
            .create_exec(
                &self.container_id,
                CreateExecOptions {
                    cmd: Some(vec!["sh".to_string(), "-c".to_string(), format!("mkdir -p $(dirname {path}) && cat > {path}")]),
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        if let StartExecResults::Attached { mut input, mut output } = self.client.start_exec(&exec.id, None).await? {
            input.write_all(content).await?;
            input.flush().await?;
            drop(input);
            while output.next().await.is_some() {}
        }

        let inspect = self.client.inspect_exec(&exec.id).await?;
        match inspect.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(RunnerError::ExecutionFailed(format!("write_file {path} exited {code}"))),
            None => Err(RunnerError::ExecutionFailed(format!("write_file {path} did not complete"))),
        }
    }

    async fn run_command(
        &self,
        command: &[String],
        timeout: Option<Duration>,
        mut observer: Option<OutputObserver<'_>>,
    ) -> RunnerResult<CommandResult> {
        self.check_lifetime()?;
        let wait = timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT).min(MAX_COMMAND_TIMEOUT);

        let mut full_command = Vec::with_capacity(command.len() + 2);
        full_command.push("sh".to_string());
        full_command.push("-c".to_string());
        let joined = command.iter().map(|s| shell_quote(s)).collect::<Vec<_>>().join(" ");
        full_command.push(format!("[ -f {CREDENTIALS_PATH} ] && . {CREDENTIALS_PATH}; {joined}"));

        let exec = self
            .client
            .create_exec(
                &self.container_id,
                CreateExecOptions {
                    cmd: Some(full_command),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let run = async {
            let mut stdout = String::new();
            if let StartExecResults::Attached { output, .. } = self.client.start_exec(&exec.id, None).await? {
                let mut output = output;
                while let Some(chunk) = output.next().await {
                    match chunk? {
                        bollard::container::LogOutput::StdOut { message } => {
                            let text = String::from_utf8_lossy(&message);
                            if let Some(obs) = observer.as_deref_mut() {
                                obs(StreamKind::Stdout, &text);
                            }
                            stdout.push_str(&text);
                        }
                        bollard::container::LogOutput::StdErr { message } => {
                            let text = String::from_utf8_lossy(&message);
                            if let Some(obs) = observer.as_deref_mut() {
                                obs(StreamKind::Stderr, &text);
                            }
                            stdout.push_str(&text);
                        }
                        _ => {}
                    }
                }
            }
            Ok::<_, RunnerError>(stdout)
        };

        let stdout = match tokio_timeout(wait, run).await {
            Ok(result) => result?,
            Err(_) => return Err(RunnerError::Timeout(wait.as_secs())),
        };

        let inspect = self.client.inspect_exec(&exec.id).await?;
        Ok(CommandResult { exit_code: inspect.exit_code.unwrap_or(-1), stdout })
    }

    async fn kill(&self) -> RunnerResult<()> {
        let mut killed = self.killed.lock().await;
        if *killed {
            return Ok(());
        }
        let _ = self.client.stop_container(&self.container_id, Some(StopContainerOptions { t: 5 })).await;
        self.client
            .remove_container(&self.container_id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await?;
        *killed = true;
        warn!(container_id = %self.container_id, "sandbox killed");
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_result_success_checks_zero_exit() {
        let ok = CommandResult { exit_code: 0, stdout: String::new() };
        let failed = CommandResult { exit_code: 1, stdout: String::new() };
        assert!(ok.success());
        assert!(!failed.success());
    }

    #[test]
    fn shell_quote_escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
