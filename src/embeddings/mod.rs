// src/embeddings/mod.rs
// Embedding provider module

mod ollama;
mod openai;

pub use self::ollama::OllamaEmbeddings;
pub use self::openai::{OpenAiEmbeddingModel, OpenAiEmbeddings};

use async_trait::async_trait;
use tracing::info;

use crate::config::{ApiKeys, EmbeddingsConfig};
use crate::error::{MementoError, Result};
use crate::vecmath::l2_normalize;

/// Capability interface for producing text embeddings.
///
/// Implementations reject empty or whitespace-only input with
/// [`MementoError::EmptyInput`] and return L2-normalized vectors.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts. The empty-input rule applies per element; an
    /// empty list returns an empty result.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Reject embedding requests for empty text before any network round trip.
pub(crate) fn ensure_nonempty(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        Err(MementoError::EmptyInput)
    } else {
        Ok(())
    }
}

/// Backend-specific embedding implementation
enum EmbeddingBackend {
    OpenAi(OpenAiEmbeddings),
    Ollama(OllamaEmbeddings),
}

/// Embedding client with automatic provider selection
///
/// Priority: OpenAI (highest quality) > Ollama (local, no key needed)
pub struct EmbeddingProvider {
    backend: EmbeddingBackend,
}

impl EmbeddingProvider {
    /// Create a provider from pre-loaded configuration.
    ///
    /// Priority: OpenAI key → Ollama host → None
    pub fn from_config(api_keys: &ApiKeys, config: &EmbeddingsConfig) -> Option<Self> {
        if let Some(api_key) = api_keys.openai.as_ref() {
            info!("using OpenAI embeddings (text-embedding-3-small)");
            return Some(Self {
                backend: EmbeddingBackend::OpenAi(OpenAiEmbeddings::with_model(
                    api_key.clone(),
                    OpenAiEmbeddingModel::default(),
                    config.dimensions,
                )),
            });
        }

        if let Some(host) = api_keys.ollama.as_ref() {
            let client = OllamaEmbeddings::new(
                host.clone(),
                config.ollama_model.clone(),
                config.dimensions,
            );
            info!(
                model = client.model_name(),
                dimensions = client.dimensions(),
                "using Ollama embeddings"
            );
            return Some(Self {
                backend: EmbeddingBackend::Ollama(client),
            });
        }

        None
    }

    /// Provider identifier for logging
    pub fn provider_id(&self) -> &'static str {
        match &self.backend {
            EmbeddingBackend::OpenAi(_) => "openai",
            EmbeddingBackend::Ollama(_) => "ollama",
        }
    }

    /// Embedding dimensions of the active backend
    pub fn dimensions(&self) -> usize {
        match &self.backend {
            EmbeddingBackend::OpenAi(c) => c.dimensions(),
            EmbeddingBackend::Ollama(c) => c.dimensions(),
        }
    }
}

#[async_trait]
impl EmbeddingClient for EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_nonempty(text)?;
        let raw = match &self.backend {
            EmbeddingBackend::OpenAi(c) => c.embed(text).await?,
            EmbeddingBackend::Ollama(c) => c.embed(text).await?,
        };
        Ok(l2_normalize(&raw))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            ensure_nonempty(text)?;
        }
        let raw = match &self.backend {
            EmbeddingBackend::OpenAi(c) => c.embed_batch(texts).await?,
            EmbeddingBackend::Ollama(c) => c.embed_batch(texts).await?,
        };
        Ok(raw.iter().map(|v| l2_normalize(v)).collect())
    }
}
