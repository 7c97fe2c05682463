//! The two agent variants the generation pipeline invokes (§4.2A):
//! context-analyzer and dockerfile-generator. Each supplies only prompt
//! construction and the shape it expects back; the retry loop, chunk
//! streaming and extraction chain live once in [`crate::gateway`].

use forge_scm::{RepositoryContext, RepositorySnapshot};
use serde_json::Value;

use crate::error::{AgentError, AgentResult};
use crate::gateway::{extract_structured, normalize_container_field, ContainerKind};

/// What an [`AgentVariant`] was asked to reason about.
pub enum VariantInput<'a> {
    Snapshot(&'a RepositorySnapshot),
    Context(&'a RepositoryContext),
}

/// What parsing a variant's response produced.
pub enum ExtractedPayload {
    Context(RepositoryContext),
    Dockerfile(String),
}

/// One reasoning-service collaborator: builds its own prompt, and knows how
/// to turn the gateway's envelope-stripped response text into its own
/// output shape.
pub trait AgentVariant: Send + Sync {
    fn agent_id(&self) -> &str;
    fn alias_id(&self) -> &str;
    fn name(&self) -> &str;
    fn build_prompt(&self, input: &VariantInput<'_>) -> String;
    fn parse(&self, response: &str) -> AgentResult<ExtractedPayload>;
}

pub struct ContextAnalyzerVariant {
    pub agent_id: String,
    pub alias_id: String,
}

impl AgentVariant for ContextAnalyzerVariant {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn alias_id(&self) -> &str {
        &self.alias_id
    }

    fn name(&self) -> &str {
        "Context Analyzer"
    }

    fn build_prompt(&self, input: &VariantInput<'_>) -> String {
        let snapshot = match input {
            VariantInput::Snapshot(s) => s,
            VariantInput::Context(_) => panic!("context analyzer expects a repository snapshot"),
        };

        let file_list = snapshot.paths.iter().take(50).cloned().collect::<Vec<_>>().join(", ");
        let manifests = snapshot
            .manifests
            .iter()
            .map(|(name, content)| format!("### {name}\n{content}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Analyze this repository and respond with a single JSON object \
             describing language, framework, runtime, package_manager, \
             dependencies, deployment_target, ports, environment_vars, \
             health_check_path, start_command and build_command.\n\n\
             Files: {file_list}\n\nManifests:\n{manifests}\n\n\
             Respond with the JSON object in a ```json fenced block."
        )
    }

    fn parse(&self, response: &str) -> AgentResult<ExtractedPayload> {
        let mut value = extract_structured(self.name(), response)?;
        if let Value::Object(obj) = &mut value {
            normalize_container_field(obj, "dependencies", ContainerKind::Map);
            normalize_container_field(obj, "environment_variables", ContainerKind::List);
            normalize_container_field(obj, "ports", ContainerKind::List);
        }
        let context: RepositoryContext = serde_json::from_value(value).map_err(|_| AgentError::Unparseable { agent: self.name().to_string() })?;
        Ok(ExtractedPayload::Context(context))
    }
}

pub struct DockerfileGeneratorVariant {
    pub agent_id: String,
    pub alias_id: String,
}

impl DockerfileGeneratorVariant {
    /// An existing Dockerfile is used as-is when it has a base image and
    /// more than a handful of lines — otherwise it's treated as a stub
    /// worth enhancing.
    pub fn existing_is_complete(content: &str) -> bool {
        content.contains("FROM") && content.lines().filter(|line| !line.trim().is_empty()).count() > 5
    }
}

impl AgentVariant for DockerfileGeneratorVariant {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn alias_id(&self) -> &str {
        &self.alias_id
    }

    fn name(&self) -> &str {
        "Dockerfile Generator"
    }

    fn build_prompt(&self, input: &VariantInput<'_>) -> String {
        let context = match input {
            VariantInput::Context(c) => c,
            VariantInput::Snapshot(_) => panic!("dockerfile generator expects a repository context"),
        };

        format!(
            "Generate a production-ready Dockerfile for a {} application \
             using {} ({}), package manager {}, exposing ports {:?}, \
             start command {:?}.\n\n\
             Requirements: no placeholders, no hardcoded ports (use ARG/ENV), \
             a non-root user, pinned base image tags, a HEALTHCHECK against {}.\n\n\
             Respond with only the Dockerfile in a ```dockerfile fenced block.",
            context.language.as_deref().unwrap_or("unknown"),
            context.framework.as_deref().unwrap_or("unknown"),
            context.runtime.as_deref().unwrap_or("unknown"),
            context.package_manager.as_deref().unwrap_or("unknown"),
            context.ports,
            context.start_command,
            context.health_check_path.as_deref().unwrap_or("/health"),
        )
    }

    fn parse(&self, response: &str) -> AgentResult<ExtractedPayload> {
        Ok(ExtractedPayload::Dockerfile(clean_dockerfile(response)))
    }
}

/// Strips envelope tags and markdown fencing the reasoning service adds
/// around a plain-text Dockerfile.
fn clean_dockerfile(content: &str) -> String {
    let content = content
        .replace("<thinking>", "")
        .replace("</thinking>", "")
        .replace("<answer>", "")
        .replace("</answer>", "");

    if let Some(start) = content.find("```dockerfile") {
        let start = start + "```dockerfile".len();
        if let Some(end) = content[start..].find("```") {
            return content[start..start + end].trim().to_string();
        }
    }
    if let Some(start) = content.find("```") {
        let start = start + 3;
        if let Some(end) = content[start..].find("```") {
            return content[start..start + end].trim().to_string();
        }
    }
    content.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn context_analyzer_parses_fenced_json_and_normalizes_nulls() {
        let variant = ContextAnalyzerVariant { agent_id: "a".into(), alias_id: "b".into() };
        let response = "```json\n{\"language\": \"python\", \"dependencies\": null, \"ports\": [8080]}\n```";
        let ExtractedPayload::Context(ctx) = variant.parse(response).unwrap() else {
            panic!("expected context payload");
        };
        assert_eq!(ctx.language.as_deref(), Some("python"));
        assert!(ctx.dependencies.is_empty());
        assert_eq!(ctx.ports, vec![8080]);
    }

    #[test]
    fn dockerfile_generator_strips_fence_and_tags() {
        let variant = DockerfileGeneratorVariant { agent_id: "a".into(), alias_id: "b".into() };
        let response = "<thinking>reasoning</thinking>```dockerfile\nFROM node:20\n```";
        let ExtractedPayload::Dockerfile(content) = variant.parse(response).unwrap() else {
            panic!("expected dockerfile payload");
        };
        assert_eq!(content, "FROM node:20");
    }

    #[test]
    fn existing_dockerfile_with_few_lines_is_not_complete() {
        assert!(!DockerfileGeneratorVariant::existing_is_complete("FROM node"));
    }

    #[test]
    fn existing_dockerfile_with_base_image_and_body_is_complete() {
        let content = "FROM node:20\nWORKDIR /app\nCOPY . .\nRUN npm ci\nUSER node\nCMD [\"node\", \"index.js\"]";
        assert!(DockerfileGeneratorVariant::existing_is_complete(content));
    }

    #[test]
    fn blank_lines_do_not_count_toward_the_line_threshold() {
        let content = "FROM node:20\n\n\n\n\n\n\nCMD [\"node\", \"index.js\"]";
        assert!(!DockerfileGeneratorVariant::existing_is_complete(content));
    }

    #[test]
    fn build_prompt_mentions_detected_language() {
        let variant = ContextAnalyzerVariant { agent_id: "a".into(), alias_id: "b".into() };
        let snapshot = RepositorySnapshot {
            owner: "acme".into(),
            name: "widgets".into(),
            paths: vec!["app.py".into()],
            manifests: HashMap::new(),
            configs: HashMap::new(),
            dominant_language: Some("python".into()),
            existing_dockerfile: None,
            existing_terraform: HashMap::new(),
            terraform_location: None,
        };
        let prompt = variant.build_prompt(&VariantInput::Snapshot(&snapshot));
        assert!(prompt.contains("app.py"));
    }
}
