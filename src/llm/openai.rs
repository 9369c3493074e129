// src/llm/openai.rs
// Chat-completions client for OpenAI-compatible APIs (OpenAI, Ollama, and
// other providers speaking /v1/chat/completions)

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{MementoError, Result};

use super::LlmClient;
use super::structured::{extract_json, validate_shape};

/// HTTP timeout for completions
const TIMEOUT_SECS: u64 = 120;

const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Client for any /v1/chat/completions provider
pub struct OpenAiCompatibleLlm {
    base_url: String,
    api_key: Option<String>,
    model: String,
    http_client: reqwest::Client,
}

impl OpenAiCompatibleLlm {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            http_client,
        }
    }

    /// Hosted OpenAI endpoint
    pub fn openai(api_key: String, model: String) -> Self {
        Self::new(OPENAI_BASE_URL.to_string(), Some(api_key), model)
    }

    /// Local Ollama endpoint (no auth)
    pub fn ollama(host: String, model: String) -> Self {
        Self::new(host, None, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleLlm {
    async fn complete(
        &self,
        prompt: &str,
        schema: &Value,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Value> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "structured_output",
                    "schema": schema,
                    "strict": true,
                },
            },
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MementoError::from_status(status, &text));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| MementoError::Query(format!("invalid completion response: {e}")))?;

        let content = raw["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                MementoError::SchemaViolation("completion response has no text content".into())
            })?;

        debug!(model = %self.model, chars = content.len(), "completion received");

        let value = extract_json(content)?;
        validate_shape(&value, schema)?;
        Ok(value)
    }
}
