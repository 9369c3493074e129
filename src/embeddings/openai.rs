// src/embeddings/openai.rs
// OpenAI embeddings API client

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{MementoError, Result};
use crate::retry::{RetryBudget, RetryPolicy, with_backoff};

/// Max characters to embed (truncate longer text)
const MAX_TEXT_CHARS: usize = 8000;

/// Max texts per batch request
const MAX_BATCH_SIZE: usize = 256;

/// HTTP timeout
const TIMEOUT_SECS: u64 = 30;

/// Retry attempts per request
const RETRY_ATTEMPTS: u32 = 2;

/// API endpoint
const API_URL: &str = "https://api.openai.com/v1/embeddings";

/// Supported embedding models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAiEmbeddingModel {
    /// text-embedding-3-small: 1536 dimensions (recommended)
    #[default]
    TextEmbedding3Small,
    /// text-embedding-3-large: 3072 dimensions
    TextEmbedding3Large,
}

impl OpenAiEmbeddingModel {
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::TextEmbedding3Small => "text-embedding-3-small",
            Self::TextEmbedding3Large => "text-embedding-3-large",
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Self::TextEmbedding3Small => 1536,
            Self::TextEmbedding3Large => 3072,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI embeddings client
pub struct OpenAiEmbeddings {
    api_key: String,
    model: OpenAiEmbeddingModel,
    dimensions: usize,
    http_client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, OpenAiEmbeddingModel::default(), None)
    }

    /// Create a client with a specific model and optional dimension override
    pub fn with_model(
        api_key: String,
        model: OpenAiEmbeddingModel,
        dimensions: Option<usize>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            dimensions: dimensions.unwrap_or(model.dimensions()),
            model,
            http_client,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn model(&self) -> OpenAiEmbeddingModel {
        self.model
    }

    /// Embed a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.request(&[text]).await?;
        results
            .pop()
            .ok_or_else(|| MementoError::Query("empty embedding response".into()))
    }

    /// Embed multiple texts, chunked to the provider's batch limit
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            all.extend(self.request(&refs).await?);
        }
        Ok(all)
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<&str> = texts.iter().map(|t| clip(t)).collect();
        let body = serde_json::json!({
            "model": self.model.model_name(),
            "input": inputs,
        });

        let policy = RetryPolicy::with_max_retries(RETRY_ATTEMPTS);
        let budget = RetryBudget::unlimited();

        let response: EmbeddingResponse =
            with_backoff(&policy, &budget, "openai_embed", || async {
                let response = self
                    .http_client
                    .post(API_URL)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                if status.is_success() {
                    response
                        .json::<EmbeddingResponse>()
                        .await
                        .map_err(|e| MementoError::Query(format!("invalid embedding response: {e}")))
                } else {
                    let text = response.text().await.unwrap_or_default();
                    Err(MementoError::from_status(status, &text))
                }
            })
            .await?;

        // Responses carry an index field; sort to restore input order
        let mut indexed = response.data;
        indexed.sort_by_key(|d| d.index);

        if indexed.len() != texts.len() {
            return Err(MementoError::Query(format!(
                "embedding count mismatch: sent {}, got {}",
                texts.len(),
                indexed.len()
            )));
        }

        debug!(count = indexed.len(), model = self.model.model_name(), "embedded texts");
        Ok(indexed.into_iter().map(|d| d.embedding).collect())
    }
}

/// Truncate to the embedding character limit on a char boundary
fn clip(text: &str) -> &str {
    if text.len() <= MAX_TEXT_CHARS {
        return text;
    }
    let mut end = MAX_TEXT_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
