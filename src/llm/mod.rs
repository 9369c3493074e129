// src/llm/mod.rs
// LLM provider module

mod openai;
pub mod structured;

pub use self::openai::OpenAiCompatibleLlm;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::{ApiKeys, LlmConfig};
use crate::error::Result;

/// Capability interface for structured LLM completions.
///
/// Output that does not match the requested schema surfaces as
/// [`crate::error::MementoError::SchemaViolation`] so callers can retry.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run a completion constrained to `schema` and return the parsed JSON.
    async fn complete(
        &self,
        prompt: &str,
        schema: &Value,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Value>;
}

/// Build an LLM client from pre-loaded configuration.
///
/// Priority: OpenAI key → Ollama host → None
pub fn from_config(api_keys: &ApiKeys, config: &LlmConfig) -> Option<OpenAiCompatibleLlm> {
    if let Some(api_key) = api_keys.openai.as_ref() {
        info!(model = %config.model, "using OpenAI-compatible LLM");
        return Some(OpenAiCompatibleLlm::openai(
            api_key.clone(),
            config.model.clone(),
        ));
    }

    if let Some(host) = api_keys.ollama.as_ref() {
        info!(model = %config.model, host = %host, "using Ollama LLM");
        return Some(OpenAiCompatibleLlm::ollama(
            host.clone(),
            config.model.clone(),
        ));
    }

    None
}
