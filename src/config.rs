// src/config.rs
// Explicit configuration context, constructed once at startup and threaded
// through the engine by reference.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::SourceWeights;
use crate::proxy::ProxyConfig;

/// Top-level configuration for the memory engine and proxy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MementoConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub weighter: WeighterConfig,
    #[serde(default)]
    pub walker: WalkerConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl MementoConfig {
    /// Load config from the default location (~/.config/memento/config.toml),
    /// falling back to defaults when absent.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: MementoConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config path
    pub fn default_config_path() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        Ok(config_dir.join("memento").join("config.toml"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !self.retrieval.weights.is_valid() {
            anyhow::bail!("retrieval weights must be >= 0 with at least one > 0");
        }
        let alpha_sum = self.weighter.alpha_semantic
            + self.weighter.alpha_memory
            + self.weighter.alpha_structural;
        if (alpha_sum - 1.0).abs() > 0.01 {
            anyhow::bail!("weighter alphas must sum to 1.0, got {alpha_sum}");
        }
        if !(0.0..=1.0).contains(&self.walker.restart) {
            anyhow::bail!("walker restart probability must be within [0, 1]");
        }
        Ok(())
    }
}

/// Hybrid retriever settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned per retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// RRF rank constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    /// Per-source fusion weights
    #[serde(default)]
    pub weights: SourceWeights,
    /// Seed memories fetched to ground the graph walk
    #[serde(default = "default_seed_k")]
    pub seed_k: usize,
    /// Retries per failing sub-query
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Retry budget shared by one retrieval request
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rrf_k: default_rrf_k(),
            weights: SourceWeights::default(),
            seed_k: default_seed_k(),
            max_retries: default_max_retries(),
            retry_budget: default_retry_budget(),
        }
    }
}

/// Entity weighter signal blend. Alphas must sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeighterConfig {
    #[serde(default = "default_alpha_semantic")]
    pub alpha_semantic: f32,
    #[serde(default = "default_alpha_memory")]
    pub alpha_memory: f32,
    #[serde(default = "default_alpha_structural")]
    pub alpha_structural: f32,
}

impl Default for WeighterConfig {
    fn default() -> Self {
        Self {
            alpha_semantic: default_alpha_semantic(),
            alpha_memory: default_alpha_memory(),
            alpha_structural: default_alpha_structural(),
        }
    }
}

/// Personalized random walk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConfig {
    /// Steps taken per seed entity
    #[serde(default = "default_walk_steps")]
    pub steps: u32,
    /// Probability of teleporting back to a seed at each step
    #[serde(default = "default_restart")]
    pub restart: f32,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            steps: default_walk_steps(),
            restart: default_restart(),
        }
    }
}

/// Consolidation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Retries for LLM stages that return malformed output
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Overall pipeline deadline
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Context memories handed to the resolution stage
    #[serde(default = "default_context_k")]
    pub context_k: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            deadline_secs: default_deadline_secs(),
            context_k: default_context_k(),
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Override the provider's native dimensions
    pub dimensions: Option<usize>,
    /// Ollama embedding model name
    pub ollama_model: Option<String>,
}

/// LLM provider settings for extraction and resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: 0.0,
        }
    }
}

/// API keys loaded from environment variables, read once at startup
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// OpenAI API key (OPENAI_API_KEY)
    pub openai: Option<String>,
    /// Ollama host (OLLAMA_HOST)
    pub ollama: Option<String>,
}

impl ApiKeys {
    pub fn from_env() -> Self {
        let keys = Self {
            openai: Self::read_key("OPENAI_API_KEY"),
            ollama: Self::read_key("OLLAMA_HOST"),
        };
        keys.log_status();
        keys
    }

    /// Read a single env var, filtering empty values
    fn read_key(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|k| !k.trim().is_empty())
    }

    pub fn has_embeddings(&self) -> bool {
        self.openai.is_some() || self.ollama.is_some()
    }

    pub fn has_llm(&self) -> bool {
        self.openai.is_some() || self.ollama.is_some()
    }

    fn log_status(&self) {
        let mut available = Vec::new();
        if self.openai.is_some() {
            available.push("OpenAI");
        }
        if self.ollama.is_some() {
            available.push("Ollama");
        }
        if available.is_empty() {
            warn!("no API keys configured - retrieval and consolidation will be unavailable");
        } else {
            debug!(providers = ?available, "API keys loaded");
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_rrf_k() -> u32 {
    60
}
fn default_seed_k() -> usize {
    8
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_budget() -> u32 {
    8
}
fn default_alpha_semantic() -> f32 {
    0.5
}
fn default_alpha_memory() -> f32 {
    0.3
}
fn default_alpha_structural() -> f32 {
    0.2
}
fn default_walk_steps() -> u32 {
    10
}
fn default_restart() -> f32 {
    0.15
}
fn default_deadline_secs() -> u64 {
    60
}
fn default_context_k() -> usize {
    10
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_max_tokens() -> u32 {
    2048
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MementoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.rrf_k, 60);
        assert_eq!(config.walker.steps, 10);
        assert!((config.walker.restart - 0.15).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_toml_overrides() {
        let toml_str = r#"
[retrieval]
top_k = 5
rrf_k = 30

[walker]
steps = 20
restart = 0.25

[consolidation]
max_retries = 5
"#;
        let config: MementoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.rrf_k, 30);
        assert_eq!(config.walker.steps, 20);
        assert_eq!(config.consolidation.max_retries, 5);
        // Untouched sections keep defaults
        assert_eq!(config.consolidation.context_k, 10);
    }

    #[test]
    fn test_bad_alphas_rejected() {
        let toml_str = r#"
[weighter]
alpha_semantic = 0.9
alpha_memory = 0.9
alpha_structural = 0.9
"#;
        let config: MementoConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }
}
