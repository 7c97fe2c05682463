//! Deploy command: the `build-image`, `plan`, `apply` and `destroy`
//! sub-operations of the deployment pipeline (§4.8.3), each a standalone
//! operation session sharing only the stored artifacts and the caller's
//! broker connection.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use forge_cloud::{image_repository_uri, run_terraform, state_bucket_name, summarize, ProjectRecord, TerraformRunResult, TerraformVerb};
use forge_core::{DeploymentShape, RepositoryRef, SessionId, WorkflowEngine, WorkflowState};
use forge_runner::{Sandbox, SandboxProvider};
use forge_scm::SourceControlClient;
use forge_store::ArtifactStore;
use tracing::info;

use super::config::AppConfig;

/// Any stage that raises fails the whole session (§4.8.5): record the
/// error on the session before it propagates.
async fn or_fail<T>(engine: &WorkflowEngine, id: SessionId, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        let _ = engine.fail(id, format!("{err:#}")).await;
    }
    result
}

/// The forward-only edge chain (§4.8.1, `WorkflowState::can_transition_to`).
/// Each deploy sub-operation is its own process invocation with no
/// cross-process session to resume, so it walks a fresh session from
/// `Pending` up through its target state rather than starting there.
const STATE_CHAIN: &[WorkflowState] = &[
    WorkflowState::Pending,
    WorkflowState::Analyzing,
    WorkflowState::Generating,
    WorkflowState::AwaitingReview,
    WorkflowState::ReadyToDeploy,
    WorkflowState::Building,
    WorkflowState::Planning,
    WorkflowState::Applying,
    WorkflowState::Completed,
    WorkflowState::Destroying,
    WorkflowState::Destroyed,
];

async fn advance_to(engine: &WorkflowEngine, id: SessionId, target: WorkflowState) -> Result<()> {
    let target_idx = STATE_CHAIN.iter().position(|s| *s == target).expect("target must be a state in the forward chain");
    for state in &STATE_CHAIN[1..=target_idx] {
        engine.transition(id, *state).await?;
    }
    Ok(())
}

#[derive(Args)]
pub struct DeployArgs {
    #[command(subcommand)]
    pub verb: DeployVerb,
}

#[derive(Subcommand)]
pub enum DeployVerb {
    /// Build and push the container image (prerequisite to `apply`)
    BuildImage(RepoArgs),
    /// Preview the infrastructure changes without applying them
    Plan(RepoArgs),
    /// Apply the repository's generated infrastructure
    Apply(RepoArgs),
    /// Tear down previously-applied infrastructure
    Destroy(RepoArgs),
}

#[derive(Args)]
pub struct RepoArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    repo: String,
    #[arg(long)]
    caller_id: String,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    match args.verb {
        DeployVerb::BuildImage(repo) => build_image(repo).await,
        DeployVerb::Plan(repo) => run_verb(repo, TerraformVerb::Plan).await,
        DeployVerb::Apply(repo) => run_verb(repo, TerraformVerb::Apply).await,
        DeployVerb::Destroy(repo) => run_verb(repo, TerraformVerb::Destroy).await,
    }
}

fn print_line(kind: forge_runner::StreamKind, line: &str) {
    match kind {
        forge_runner::StreamKind::Stdout => println!("{line}"),
        forge_runner::StreamKind::Stderr => eprintln!("{line}"),
    }
}

async fn fetch_infra_files(store: &ArtifactStore, owner: &str, repo: &str, account_id: &str) -> Result<HashMap<String, String>> {
    let keys = store.list_repository_keys(owner, repo).await.context("failed to list stored artifacts")?;
    let mut files = HashMap::new();
    for key in keys.iter().filter(|k| k.ends_with(".tf")) {
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        if let Some(content) = store.get_artifact(key).await? {
            files.insert(filename, rewrite_backend(&content, &filename, account_id));
        }
    }
    if files.is_empty() {
        bail!("no infrastructure files found for {owner}/{repo}, run generate first");
    }
    Ok(files)
}

/// Points the state-backend file at the caller's per-account bucket
/// before upload, so each account's state never collides with another's.
fn rewrite_backend(content: &str, filename: &str, account_id: &str) -> String {
    if filename != "backend.tf" {
        return content.to_string();
    }
    let bucket_line = content.lines().find(|l| l.trim_start().starts_with("bucket"));
    match bucket_line {
        Some(line) => {
            let rewritten_bucket = line.split('=').next().unwrap_or("  bucket").to_string();
            content.replacen(line, &format!("{rewritten_bucket}= \"{}\"", state_bucket_name("forge-tfstate", account_id)), 1)
        }
        None => content.to_string(),
    }
}

async fn run_verb(repo: RepoArgs, verb: TerraformVerb) -> Result<()> {
    let config = AppConfig::from_env()?;
    let engine = WorkflowEngine::new();
    let repository = RepositoryRef { owner: repo.owner.clone(), name: repo.repo.clone() };
    let session = engine.create_session(&repo.caller_id, repository, DeploymentShape::ContainerService).await;
    info!(session = %session.id, verb = verb.label(), "deploy session created");

    let result = run_verb_inner(&config, &engine, session.id, &repo, verb).await;
    or_fail(&engine, session.id, result).await
}

async fn run_verb_inner(config: &AppConfig, engine: &WorkflowEngine, session_id: SessionId, repo: &RepoArgs, verb: TerraformVerb) -> Result<()> {
    let broker = config.credential_broker().await;
    let store = config.artifact_store().await;
    let provider = config.sandbox_provider().await?;

    let credentials = broker.assume(&repo.caller_id).await.context("failed to assume caller's role")?;
    let infra_files = fetch_infra_files(&store, &repo.owner, &repo.repo, &credentials.account_id).await?;

    let target_state = match verb {
        TerraformVerb::Plan => WorkflowState::Planning,
        TerraformVerb::Apply => WorkflowState::Applying,
        TerraformVerb::Destroy => WorkflowState::Destroying,
    };
    advance_to(engine, session_id, target_state).await?;

    let sandbox = provider.provision().await.context("failed to provision sandbox")?;
    let mut observer = print_line;
    let outcome = run_terraform(&*sandbox, &infra_files, &credentials, verb, Some(&mut observer)).await;
    sandbox.kill().await.ok();
    let TerraformRunResult { stdout, outputs_json } = outcome.context("terraform run failed")?;

    let project_id = format!("{}-{}", repo.owner, repo.repo);
    match verb {
        TerraformVerb::Apply => {
            let summary = summarize(&stdout);
            println!(
                "apply complete: {} resources across {} categories, access url: {}",
                summary.total_resources,
                summary.groups.len(),
                summary.access_url.as_deref().unwrap_or("none")
            );
            store.put_terraform_state(&project_id, &stdout).await.context("failed to persist terraform state")?;

            let mut record = ProjectRecord::new(&project_id);
            record.application_url = summary.access_url.clone();
            record.terraform_outputs = outputs_json;
            record.deployment_summary = Some((&summary).into());
            let record_json = serde_json::to_string(&record).context("failed to serialize project record")?;
            store.put_project_record(&project_id, &record_json).await.context("failed to persist project record")?;

            engine.transition(session_id, WorkflowState::Completed).await?;
        }
        TerraformVerb::Destroy => {
            store.delete_all_terraform_state_versions(&project_id).await.context("failed to clear terraform state")?;
            store.delete_project_record(&project_id).await.context("failed to clear project record")?;
            println!("destroy complete, state cleared for {project_id}");
            engine.transition(session_id, WorkflowState::Destroyed).await?;
        }
        TerraformVerb::Plan => {
            println!("plan complete for {project_id}");
        }
    }
    Ok(())
}

const EXCLUDED_CLONE_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "__pycache__"];

fn is_excluded_clone_path(path: &str) -> bool {
    path.split('/').any(|segment| EXCLUDED_CLONE_DIRS.contains(&segment))
}

/// Mirrors a repository's tracked files into the sandbox workspace
/// (§4.8.3 "clone the repository into it"). The sandbox carries no `git`
/// binary, so this walks the same contents API the inspector already
/// reads rather than shelling out to `git clone`.
async fn clone_into_sandbox(scm: &dyn SourceControlClient, sandbox: &dyn Sandbox, owner: &str, repo: &str, path: &str) -> Result<()> {
    let entries = scm.list_directory(owner, repo, path).await.context("failed to list repository directory")?;
    for entry in entries {
        if is_excluded_clone_path(&entry.path) {
            continue;
        }
        if entry.is_dir {
            Box::pin(clone_into_sandbox(scm, sandbox, owner, repo, &entry.path)).await?;
        } else {
            let content = scm.read_file(owner, repo, &entry.path).await.with_context(|| format!("failed to read {}", entry.path))?;
            sandbox
                .write_file(&format!("/workspace/{}", entry.path), content.as_bytes())
                .await
                .with_context(|| format!("failed to write {} into sandbox", entry.path))?;
        }
    }
    Ok(())
}

/// A generated-from-scratch Next.js recipe: multi-stage, debian-slim base,
/// non-root user. Used both as the "no recipe exists" default and as the
/// replacement for a detected alpine+Next.js recipe (scenario 2).
fn debian_slim_next_recipe() -> String {
    "FROM node:20-slim AS builder\n\
     WORKDIR /app\n\
     COPY package*.json ./\n\
     RUN npm ci\n\
     COPY . .\n\
     RUN npm run build\n\
     \n\
     FROM node:20-slim\n\
     WORKDIR /app\n\
     ENV NODE_ENV=production\n\
     COPY --from=builder /app/package*.json ./\n\
     COPY --from=builder /app/node_modules ./node_modules\n\
     COPY --from=builder /app/.next ./.next\n\
     COPY --from=builder /app/public ./public\n\
     EXPOSE 3000\n\
     USER node\n\
     HEALTHCHECK CMD wget -qO- http://localhost:3000/ || exit 1\n\
     CMD [\"npm\", \"start\"]\n"
        .to_string()
}

fn is_alpine_node_recipe(dockerfile: &str) -> bool {
    dockerfile
        .lines()
        .next()
        .map(|line| {
            let line = line.trim_start();
            line.starts_with("FROM node") && line.contains("alpine")
        })
        .unwrap_or(false)
}

async fn uses_next(scm: &dyn SourceControlClient, owner: &str, repo: &str) -> bool {
    scm.read_file(owner, repo, "package.json").await.map(|content| content.contains("\"next\"")).unwrap_or(false)
}

/// Resolves the Dockerfile to build: the stored recipe as-is, unless it's
/// an alpine+Next.js combination (rewritten to debian-slim, scenario 2) or
/// absent entirely (a safe default is written instead, §4.8.3).
async fn resolve_dockerfile(scm: &dyn SourceControlClient, store: &ArtifactStore, owner: &str, repo: &str) -> Result<String> {
    let dockerfile_key = forge_store::artifact_key(owner, repo, "Dockerfile");
    let existing = store.get_artifact(&dockerfile_key).await.context("failed to read stored Dockerfile")?;

    let Some(content) = existing else {
        return Ok(debian_slim_next_recipe());
    };
    if is_alpine_node_recipe(&content) && uses_next(scm, owner, repo).await {
        return Ok(debian_slim_next_recipe());
    }
    Ok(content)
}

async fn build_image(repo: RepoArgs) -> Result<()> {
    let config = AppConfig::from_env()?;
    let engine = WorkflowEngine::new();
    let repository = RepositoryRef { owner: repo.owner.clone(), name: repo.repo.clone() };
    let session = engine.create_session(&repo.caller_id, repository, DeploymentShape::ContainerService).await;
    info!(session = %session.id, "build-image session created");

    let result = build_image_inner(&config, &engine, session.id, &repo).await;
    or_fail(&engine, session.id, result).await
}

async fn build_image_inner(config: &AppConfig, engine: &WorkflowEngine, session_id: SessionId, repo: &RepoArgs) -> Result<()> {
    let broker = config.credential_broker().await;
    let store = config.artifact_store().await;
    let provider = config.sandbox_provider().await?;
    let scm = config.scm_client()?;

    let credentials = broker.assume(&repo.caller_id).await.context("failed to assume caller's role")?;
    let repo_slug = repo.repo.replace('_', "-").to_lowercase();
    let image_uri = image_repository_uri(&credentials.account_id, &config.region, &repo_slug);

    let dockerfile = resolve_dockerfile(&scm, &store, &repo.owner, &repo.repo).await?;

    advance_to(engine, session_id, WorkflowState::Building).await?;

    let sandbox = provider.provision().await.context("failed to provision sandbox")?;
    let build_result = build_image_in_sandbox(&*sandbox, &scm, &credentials, repo, &dockerfile, &image_uri, &config.region).await;
    sandbox.kill().await.ok();
    build_result?;

    info!(image_uri, "image built and pushed");
    println!("built and pushed {image_uri}:latest");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn build_image_in_sandbox(
    sandbox: &dyn Sandbox,
    scm: &dyn SourceControlClient,
    credentials: &forge_cloud::AssumedCredentials,
    repo: &RepoArgs,
    dockerfile: &str,
    image_uri: &str,
    region: &str,
) -> Result<()> {
    let mut env = HashMap::new();
    env.insert("AWS_ACCESS_KEY_ID".to_string(), credentials.access_key_id.clone());
    env.insert("AWS_SECRET_ACCESS_KEY".to_string(), credentials.secret_access_key.clone());
    env.insert("AWS_SESSION_TOKEN".to_string(), credentials.session_token.clone());
    sandbox.deliver_credentials(&env).await?;
    sandbox.bootstrap().await?;

    clone_into_sandbox(scm, sandbox, &repo.owner, &repo.repo, "").await?;
    sandbox.write_file("/workspace/Dockerfile", dockerfile.as_bytes()).await?;

    let mut observer = print_line;
    let repo_slug = repo.repo.replace('_', "-").to_lowercase();
    let ensure_repo = format!(
        "aws ecr describe-repositories --repository-names {repo_slug} --region {region} \
         || aws ecr create-repository --repository-name {repo_slug} --region {region}"
    );
    let login = format!(
        "aws ecr get-login-password --region {region} | docker login --username AWS --password-stdin {}",
        image_uri.rsplit_once('/').map(|(host, _)| host).unwrap_or(image_uri)
    );
    let build_and_push =
        format!("cd /workspace && {ensure_repo} && {login} && docker build -t {image_uri}:latest . && docker push {image_uri}:latest");
    let result = sandbox
        .run_command(&["sh".into(), "-c".into(), build_and_push], Some(forge_runner::MAX_COMMAND_TIMEOUT), Some(&mut observer))
        .await?;

    if !result.success() {
        bail!("image build failed for {image_uri}:latest");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_backend_substitutes_bucket_for_backend_tf() {
        let content = "terraform {\n  backend \"s3\" {\n    bucket = \"forge-tfstate-placeholder\"\n    key    = \"app/terraform.tfstate\"\n  }\n}\n";
        let rewritten = rewrite_backend(content, "backend.tf", "123456789012");
        assert!(rewritten.contains("forge-tfstate-123456789012"));
        assert!(!rewritten.contains("forge-tfstate-placeholder"));
    }

    #[test]
    fn rewrite_backend_leaves_other_files_untouched() {
        let content = "resource \"aws_ecs_cluster\" \"this\" {}\n";
        let rewritten = rewrite_backend(content, "main.tf", "123456789012");
        assert_eq!(rewritten, content);
    }

    #[test]
    fn rewrite_backend_is_noop_without_a_bucket_line() {
        let content = "terraform {\n  backend \"s3\" {}\n}\n";
        let rewritten = rewrite_backend(content, "backend.tf", "123456789012");
        assert_eq!(rewritten, content);
    }

    #[test]
    fn detects_alpine_based_node_recipe() {
        assert!(is_alpine_node_recipe("FROM node:20-alpine\nWORKDIR /app\n"));
        assert!(!is_alpine_node_recipe("FROM node:20-slim\nWORKDIR /app\n"));
        assert!(!is_alpine_node_recipe("FROM python:3.12-alpine\n"));
    }

    #[test]
    fn excludes_vendored_directories_from_clone() {
        assert!(is_excluded_clone_path("app/node_modules/left-pad/index.js"));
        assert!(is_excluded_clone_path(".git/HEAD"));
        assert!(!is_excluded_clone_path("src/index.js"));
    }

    #[test]
    fn debian_slim_recipe_has_no_alpine_base() {
        assert!(!debian_slim_next_recipe().contains("alpine"));
        assert!(debian_slim_next_recipe().contains("USER node"));
    }

    #[test]
    fn advance_to_building_walks_the_full_forward_chain() {
        let idx = STATE_CHAIN.iter().position(|s| *s == WorkflowState::Building).unwrap();
        let expected = vec![
            WorkflowState::Pending,
            WorkflowState::Analyzing,
            WorkflowState::Generating,
            WorkflowState::AwaitingReview,
            WorkflowState::ReadyToDeploy,
            WorkflowState::Building,
        ];
        assert_eq!(STATE_CHAIN[..=idx].to_vec(), expected);
    }
}
