//! Error types for the generation agent gateway (C2).

use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("agent {agent} rate limited after {attempts} retries")]
    RateLimited { agent: String, attempts: u32 },

    #[error("agent {agent} invocation failed: {message}")]
    InvocationFailed { agent: String, message: String },

    #[error("could not extract a structured response from {agent}'s output")]
    Unparseable { agent: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn invocation_failed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvocationFailed { agent: agent.into(), message: message.into() }
    }
}
