//! Generate command: runs the full generation pipeline (§4.8.2) end to
//! end against one repository — inspect, analyze, generate, validate,
//! store, raise change request — reporting each stage to stdout as it
//! advances.

use anyhow::{bail, Context, Result};
use clap::Args;
use forge_agents::{invoke_with_retry, AgentVariant, ContextAnalyzerVariant, DockerfileGeneratorVariant, ExtractedPayload, VariantInput};
use forge_core::{DeploymentShape, LogSeverity, RepositoryRef, SessionId, WorkflowEngine, WorkflowState};
use forge_scm::{RepositoryInspector, SourceControlClient};
use forge_templates::{generate_fargate_stack, BackendConfig};
use forge_validate::{validate_dockerfile, validate_infra_code};
use tracing::info;

use super::config::AppConfig;

/// Any stage that raises fails the whole session (§4.8.5): record the
/// error on the session before it propagates, rather than leaving the
/// session stuck in whatever non-terminal state it was last in.
async fn or_fail<T>(engine: &WorkflowEngine, id: SessionId, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        let _ = engine.fail(id, format!("{err:#}")).await;
    }
    result
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Repository owner (organization or user)
    #[arg(long)]
    owner: String,

    /// Repository name
    #[arg(long)]
    repo: String,

    /// Identity of the caller this session runs on behalf of
    #[arg(long)]
    caller_id: String,

    /// Branch to open the change request against
    #[arg(long, default_value = "main")]
    base_branch: String,
}

pub async fn execute(args: GenerateArgs) -> Result<()> {
    let config = AppConfig::from_env()?;
    let scm = config.scm_client()?;
    let reasoning = config.reasoning_client();
    let store = config.artifact_store().await;
    let engine = WorkflowEngine::new();

    let repository = RepositoryRef { owner: args.owner.clone(), name: args.repo.clone() };
    let session = engine.create_session(&args.caller_id, repository, DeploymentShape::ContainerService).await;
    info!(session = %session.id, "generation session created");

    engine.transition(session.id, WorkflowState::Analyzing).await?;
    engine.log(session.id, "cli", LogSeverity::Info, "inspecting repository").await?;

    let inspector = RepositoryInspector::new(&scm);
    let snapshot = or_fail(&engine, session.id, inspector.inspect(&args.owner, &args.repo).await.context("repository inspection failed")).await?;
    engine
        .store_memory(session.id, "github-analysis", serde_json::to_value(&snapshot)?, "inspector")
        .await?;

    engine.transition(session.id, WorkflowState::Generating).await?;

    let analyzer = ContextAnalyzerVariant { agent_id: config.context_analyzer_agent_id.clone(), alias_id: config.context_analyzer_alias_id.clone() };
    let prompt = analyzer.build_prompt(&VariantInput::Snapshot(&snapshot));
    let response = or_fail(
        &engine,
        session.id,
        invoke_with_retry(&reasoning, analyzer.agent_id(), analyzer.alias_id(), &session.id.to_string(), &prompt, analyzer.name(), None)
            .await
            .context("context analyzer invocation failed"),
    )
    .await?;
    let parsed = or_fail(&engine, session.id, analyzer.parse(&response).context("context analyzer response could not be parsed")).await?;
    let ExtractedPayload::Context(mut context) = parsed else {
        let message = "context analyzer returned a non-context payload";
        engine.fail(session.id, message).await?;
        bail!(message);
    };
    context.has_existing_dockerfile = snapshot.has_existing_dockerfile();
    context.has_existing_terraform = snapshot.has_existing_terraform();
    context.terraform_location = snapshot.terraform_location.clone();
    engine
        .store_memory(session.id, "repository-context", serde_json::to_value(&context)?, "context-analyzer")
        .await?;

    let dockerfile = match &snapshot.existing_dockerfile {
        Some(existing) if DockerfileGeneratorVariant::existing_is_complete(existing) => {
            engine.log(session.id, "cli", LogSeverity::Info, "existing Dockerfile is complete, reusing it").await?;
            existing.clone()
        }
        _ => {
            let generator = DockerfileGeneratorVariant {
                agent_id: config.dockerfile_generator_agent_id.clone(),
                alias_id: config.dockerfile_generator_alias_id.clone(),
            };
            let prompt = generator.build_prompt(&VariantInput::Context(&context));
            let response = or_fail(
                &engine,
                session.id,
                invoke_with_retry(&reasoning, generator.agent_id(), generator.alias_id(), &session.id.to_string(), &prompt, generator.name(), None)
                    .await
                    .context("dockerfile generator invocation failed"),
            )
            .await?;
            let parsed = or_fail(&engine, session.id, generator.parse(&response).context("dockerfile generator response could not be parsed")).await?;
            let ExtractedPayload::Dockerfile(content) = parsed else {
                let message = "dockerfile generator returned a non-dockerfile payload";
                engine.fail(session.id, message).await?;
                bail!(message);
            };
            content
        }
    };

    let project_id = format!("{}-{}", args.owner, args.repo);
    let backend = BackendConfig { state_bucket: config.state_bucket.clone(), region: config.region.clone(), lock_table: config.lock_table.clone() };
    let infra_files = generate_fargate_stack(&context, &project_id, &args.repo, &backend);

    let dockerfile_report = validate_dockerfile(&dockerfile);
    let infra_report = validate_infra_code(&infra_files);
    if !dockerfile_report.valid || !infra_report.valid {
        let message = format!(
            "validation failed: dockerfile errors {:?}, infra errors {:?}",
            dockerfile_report.errors, infra_report.errors
        );
        engine.fail(session.id, &message).await?;
        bail!(message);
    }
    for warning in dockerfile_report.warnings.iter().chain(infra_report.warnings.iter()) {
        engine.log(session.id, "validator", LogSeverity::Warn, warning).await?;
    }

    engine.transition(session.id, WorkflowState::AwaitingReview).await?;

    let dockerfile_key = or_fail(&engine, session.id, store.put_artifact(&args.owner, &args.repo, "Dockerfile", &dockerfile).await.context("failed to store Dockerfile artifact")).await?;
    engine.record_artifact_key(session.id, &dockerfile_key).await?;

    let mut infra_entries: Vec<(String, String)> = infra_files.into_iter().collect();
    infra_entries.sort_by(|a, b| a.0.cmp(&b.0));
    let infra_keys = or_fail(&engine, session.id, store.put_artifacts(&args.owner, &args.repo, &infra_entries).await.context("failed to store infra artifacts")).await?;
    for key in &infra_keys {
        engine.record_artifact_key(session.id, key).await?;
    }

    let branch = format!("forge/generate-{}", session.id);
    or_fail(
        &engine,
        session.id,
        scm.create_or_update_file(&args.owner, &args.repo, "Dockerfile", &dockerfile, "forge: generate Dockerfile", &branch)
            .await
            .context("failed to write Dockerfile to branch"),
    )
    .await?;
    for (filename, content) in &infra_entries {
        or_fail(
            &engine,
            session.id,
            scm.create_or_update_file(&args.owner, &args.repo, &format!("terraform/{filename}"), content, "forge: generate infrastructure", &branch)
                .await
                .with_context(|| format!("failed to write {filename} to branch")),
        )
        .await?;
    }

    let pr_number = or_fail(
        &engine,
        session.id,
        scm.open_change_request(
            &args.owner,
            &args.repo,
            "forge: generated deployment configuration",
            "Dockerfile and Terraform stack generated by the forge pipeline. Review before merging.",
            &branch,
            &args.base_branch,
        )
        .await
        .context("failed to open change request"),
    )
    .await?;

    println!("session {} awaiting review, change request #{pr_number} opened against {}", session.id, args.base_branch);
    Ok(())
}
