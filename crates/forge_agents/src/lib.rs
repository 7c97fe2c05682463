//! # forge_agents
//!
//! Generation Agent Gateway (C2, §4.2): invokes the reasoning service behind
//! each generation-pipeline stage, retries through throttling, and extracts
//! a structured payload from whatever text comes back. `gateway` carries
//! the variant-agnostic machinery; `variants` supplies the two concrete
//! collaborators the pipeline actually invokes.

pub mod client;
pub mod error;
pub mod gateway;
pub mod variants;

pub use client::HttpReasoningClient;
pub use error::{AgentError, AgentResult};
pub use gateway::{extract_structured, invoke_with_retry, ChunkObserver, ContainerKind, ReasoningClient};
pub use variants::{AgentVariant, ContextAnalyzerVariant, DockerfileGeneratorVariant, ExtractedPayload, VariantInput};
