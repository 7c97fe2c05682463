//! HTTP-backed [`ReasoningClient`]: posts an invocation request to the
//! agent-runtime endpoint and reads back a newline-delimited stream of
//! response chunks, mirroring the original's chunked `invoke_agent` loop.

use futures_util::StreamExt;
use serde::Serialize;

use crate::error::{AgentError, AgentResult};
use crate::gateway::ReasoningClient;

#[derive(Serialize)]
struct InvokeRequest<'a> {
    agent_id: &'a str,
    alias_id: &'a str,
    session_id: &'a str,
    input_text: &'a str,
}

pub struct HttpReasoningClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReasoningClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait::async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn invoke(&self, agent_id: &str, alias_id: &str, session_id: &str, prompt: &str) -> AgentResult<Vec<String>> {
        let response = self
            .http
            .post(format!("{}/invoke", self.base_url))
            .json(&InvokeRequest { agent_id, alias_id, session_id, input_text: prompt })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AgentError::RateLimited { agent: agent_id.to_string(), attempts: 1 });
        }
        let response = response.error_for_status()?;

        let mut chunks = Vec::new();
        let mut stream = response.bytes_stream();
        let mut pending = String::new();
        while let Some(next) = stream.next().await {
            let bytes = next?;
            pending.push_str(&String::from_utf8_lossy(&bytes));
            while let Some(pos) = pending.find('\n') {
                let line = pending[..pos].to_string();
                pending = pending[pos + 1..].to_string();
                if !line.is_empty() {
                    chunks.push(line);
                }
            }
        }
        if !pending.is_empty() {
            chunks.push(pending);
        }
        Ok(chunks)
    }
}
