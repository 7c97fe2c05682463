//! Generation Agent Gateway (C2, §4.2): invokes a named external reasoning
//! service, retries through throttling with exponential backoff, and pulls
//! a structured object out of whatever text comes back.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};

const MAX_RETRIES: u32 = 3;

/// Collaborator that actually talks to the reasoning service. A real
/// implementation wraps a streaming agent-runtime client; tests substitute
/// a fixed script of responses.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn invoke(&self, agent_id: &str, alias_id: &str, session_id: &str, prompt: &str) -> AgentResult<Vec<String>>;
}

/// Per-chunk callback: (agent name, chunk text). Must never block the
/// upstream read loop longer than delivering the callback itself.
pub type ChunkObserver<'a> = &'a mut dyn FnMut(&str, &str);

/// Invokes `client`, retrying on throttle with `2^attempt` second backoff
/// (2, 4, 8), and returns the concatenated, envelope-stripped response text.
pub async fn invoke_with_retry(
    client: &dyn ReasoningClient,
    agent_id: &str,
    alias_id: &str,
    session_id: &str,
    prompt: &str,
    agent_name: &str,
    mut observer: Option<ChunkObserver<'_>>,
) -> AgentResult<String> {
    for attempt in 0..MAX_RETRIES {
        match client.invoke(agent_id, alias_id, session_id, prompt).await {
            Ok(chunks) => {
                let mut full = String::new();
                for chunk in &chunks {
                    if let Some(obs) = observer.as_deref_mut() {
                        obs(agent_name, chunk);
                    }
                    full.push_str(chunk);
                }
                info!(agent_name, chars = full.len(), "agent response received");
                return Ok(strip_reasoning_envelopes(full.trim()));
            }
            Err(AgentError::RateLimited { .. }) if attempt + 1 < MAX_RETRIES => {
                let wait = 2u64.pow(attempt + 1);
                warn!(agent_name, attempt, wait, "agent throttled, retrying");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }
            Err(AgentError::RateLimited { .. }) => {
                return Err(AgentError::RateLimited { agent: agent_name.to_string(), attempts: MAX_RETRIES });
            }
            Err(other) => return Err(other),
        }
    }
    unreachable!("loop always returns or retries within MAX_RETRIES")
}

/// Removes `<thinking>`/`<answer>` tag markers, leaving their inner text —
/// downstream extraction treats any leftover prose as noise around the
/// structured payload it's actually looking for.
fn strip_reasoning_envelopes(text: &str) -> String {
    text.replace("<thinking>", "")
        .replace("</thinking>", "")
        .replace("<answer>", "")
        .replace("</answer>", "")
}

/// Structured extraction, first success wins: (1) a fenced block tagged
/// `json`, (2) any fenced block, (3) the largest brace-delimited substring,
/// (4) the whole response stripped. Falls back to markdown key-value
/// scraping when all four fail to parse as JSON.
pub fn extract_structured(agent_name: &str, response: &str) -> AgentResult<Value> {
    let candidates = [
        fenced_block(response, Some("json")),
        fenced_block(response, None),
        largest_brace_substring(response),
        Some(response.trim().to_string()),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Ok(value);
        }
    }

    warn!(agent_name, "structured parse failed, falling back to markdown extraction");
    extract_from_markdown(response).ok_or_else(|| AgentError::Unparseable { agent: agent_name.to_string() })
}

fn fenced_block(text: &str, tag: Option<&str>) -> Option<String> {
    let marker = match tag {
        Some(tag) => format!("```{tag}"),
        None => "```".to_string(),
    };
    let start = text.find(&marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

fn largest_brace_substring(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end + 1 <= start {
        return None;
    }
    Some(text[start..end + 1].trim().to_string())
}

/// Last-resort extractor matching the reasoning service's looser bullet
/// style — pulls known key-value pairs and fills the rest with
/// conservative defaults, since downstream code assumes the full shape.
fn extract_from_markdown(text: &str) -> Option<Value> {
    use regex::Regex;

    let mut fields = Map::new();
    fields.insert("dependencies".into(), Value::Object(Map::new()));

    let patterns: &[(&str, &str)] = &[
        ("language", r"(?i)\*\*Language\*\*:?\s*([\w+\-.]+)"),
        ("framework", r"(?i)\*\*Framework\*\*:?\s*([\w\s\-.]+)"),
        ("runtime", r"(?i)\*\*Runtime\*\*:?\s*([\w\s\-.]+)"),
        ("package_manager", r"(?i)\*\*Package Manager\*\*:?\s*([\w\s\-.]+)"),
    ];
    let mut matched_any = false;
    for (key, pattern) in patterns {
        let re = Regex::new(pattern).ok()?;
        if let Some(caps) = re.captures(text) {
            if let Some(value) = caps.get(1) {
                fields.insert((*key).into(), Value::String(value.as_str().trim().to_string()));
                matched_any = true;
            }
        }
    }

    let port_re = Regex::new(r"(?i)\*\*.*?Port.*?\*\*:?\s*(\d+)").ok()?;
    let ports = match port_re.captures(text).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<u16>().ok()) {
        Some(port) => vec![Value::Number(port.into())],
        None => vec![Value::Number(3000u16.into())],
    };
    fields.insert("ports".into(), Value::Array(ports));

    fields.entry("language").or_insert_with(|| Value::String("javascript".into()));
    fields.entry("framework").or_insert_with(|| Value::String("unknown".into()));
    fields.entry("runtime").or_insert_with(|| Value::String("node20".into()));
    fields.entry("package_manager").or_insert_with(|| Value::String("npm".into()));
    fields.entry("deployment_target").or_insert_with(|| Value::String("fargate".into()));
    fields.entry("environment_vars").or_insert_with(|| Value::Array(vec![]));
    fields.entry("health_check_path").or_insert_with(|| Value::String("/health".into()));
    fields.entry("start_command").or_insert_with(|| Value::String("npm start".into()));
    fields.entry("build_command").or_insert(Value::Null);

    if !matched_any {
        warn!("markdown fallback extractor found no known fields, returning bare defaults");
    }
    Some(Value::Object(fields))
}

/// Kind of container a known field is expected to normalize to.
pub enum ContainerKind {
    Map,
    List,
}

/// Coerces a null or wrong-typed field to an empty container of the
/// expected kind. Out-of-type non-null values are dropped to the same
/// empty default — downstream code assumes the structured shape exactly.
pub fn normalize_container_field(obj: &mut Map<String, Value>, field: &str, kind: ContainerKind) {
    let empty = match kind {
        ContainerKind::Map => Value::Object(Map::new()),
        ContainerKind::List => Value::Array(vec![]),
    };
    let matches_kind = |value: &Value| match kind {
        ContainerKind::Map => value.is_object(),
        ContainerKind::List => value.is_array(),
    };
    match obj.get(field) {
        Some(value) if matches_kind(value) => {}
        _ => {
            obj.insert(field.to_string(), empty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ThrottleNTimes {
        remaining: AtomicU32,
        final_chunks: Vec<String>,
    }

    #[async_trait]
    impl ReasoningClient for ThrottleNTimes {
        async fn invoke(&self, _: &str, _: &str, _: &str, _: &str) -> AgentResult<Vec<String>> {
            if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(AgentError::RateLimited { agent: "test".into(), attempts: 1 })
            } else {
                Ok(self.final_chunks.clone())
            }
        }
    }

    #[tokio::test]
    async fn retries_until_success_then_returns_joined_chunks() {
        let client = ThrottleNTimes { remaining: AtomicU32::new(1), final_chunks: vec!["hel".into(), "lo".into()] };
        let result = invoke_with_retry(&client, "a", "b", "s", "prompt", "test-agent", None).await.unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_rate_limited() {
        let client = ThrottleNTimes { remaining: AtomicU32::new(10), final_chunks: vec![] };
        let err = invoke_with_retry(&client, "a", "b", "s", "prompt", "test-agent", None).await.unwrap_err();
        match err {
            AgentError::RateLimited { attempts, .. } => assert_eq!(attempts, MAX_RETRIES),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn extracts_from_json_fenced_block() {
        let response = "here you go\n```json\n{\"language\": \"python\"}\n```\nthanks";
        let value = extract_structured("ctx", response).unwrap();
        assert_eq!(value["language"], "python");
    }

    #[test]
    fn extracts_from_bare_fenced_block() {
        let response = "```\n{\"language\": \"go\"}\n```";
        let value = extract_structured("ctx", response).unwrap();
        assert_eq!(value["language"], "go");
    }

    #[test]
    fn extracts_largest_brace_substring_with_surrounding_prose() {
        let response = "I think {\"a\": 1} is the answer because {\"language\": \"ruby\", \"ok\": true}";
        let value = extract_structured("ctx", response).unwrap();
        assert_eq!(value["language"], "ruby");
    }

    #[test]
    fn falls_back_to_markdown_when_unparseable() {
        let response = "**Language**: python\n**Framework**: fastapi\n**Port**: 8080";
        let value = extract_structured("ctx", response).unwrap();
        assert_eq!(value["language"], "python");
        assert_eq!(value["ports"][0], 8080);
    }

    #[test]
    fn strips_envelope_tags_but_keeps_inner_text() {
        let stripped = strip_reasoning_envelopes("<thinking>reasoning here</thinking>{\"a\":1}");
        assert_eq!(stripped, "reasoning here{\"a\":1}");
    }

    #[test]
    fn normalize_replaces_null_map_with_empty_map() {
        let mut obj = Map::new();
        obj.insert("dependencies".into(), Value::Null);
        normalize_container_field(&mut obj, "dependencies", ContainerKind::Map);
        assert_eq!(obj["dependencies"], Value::Object(Map::new()));
    }

    #[test]
    fn normalize_leaves_well_typed_list_untouched() {
        let mut obj = Map::new();
        obj.insert("ports".into(), Value::Array(vec![Value::Number(80u16.into())]));
        normalize_container_field(&mut obj, "ports", ContainerKind::List);
        assert_eq!(obj["ports"].as_array().unwrap().len(), 1);
    }
}
