// src/proxy/backend.rs
// Backend configuration and client management

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// API type for backend routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    /// Anthropic Messages API (/v1/messages)
    Anthropic,
    /// OpenAI-compatible API format (/v1/chat/completions).
    /// Refers to the protocol shape, not the OpenAI service.
    #[default]
    Openai,
    /// Ollama native API (/api/chat, /api/generate)
    Ollama,
}

/// Configuration for a single upstream LLM backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Display name for this backend
    pub name: String,
    /// Base URL for the API (e.g., "https://api.anthropic.com")
    pub base_url: String,
    /// API key (inline, not recommended for production)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable containing the API key (preferred)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Whether this backend is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// API protocol the backend speaks
    #[serde(default)]
    pub api_type: ApiType,
}

fn default_true() -> bool {
    true
}

impl BackendConfig {
    /// Get the API key, checking env var first then inline
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(env_var) = &self.api_key_env
            && let Ok(key) = std::env::var(env_var)
            && !key.is_empty()
        {
            return Some(key);
        }
        self.api_key.clone()
    }

    /// Usable means enabled and, except for local Ollama, authenticated
    pub fn is_usable(&self) -> bool {
        self.enabled && (self.api_type == ApiType::Ollama || self.get_api_key().is_some())
    }
}

/// A configured and ready-to-use backend
#[derive(Debug, Clone)]
pub struct Backend {
    pub config: BackendConfig,
    pub client: reqwest::Client,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Upstream path for a request arriving on a given inbound route
    pub fn upstream_path(&self, inbound: InboundRoute) -> &'static str {
        match self.config.api_type {
            ApiType::Anthropic => "/v1/messages",
            ApiType::Openai => "/v1/chat/completions",
            ApiType::Ollama => match inbound {
                InboundRoute::Generate => "/api/generate",
                _ => "/api/chat",
            },
        }
    }
}

/// Which proxy route a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundRoute {
    /// /chat/completions
    ChatCompletions,
    /// /messages
    Messages,
    /// /api/chat
    Chat,
    /// /api/generate
    Generate,
}

/// Top-level proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Port to listen on (default: 8100)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host to bind to (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,
    /// Default backend to use when none specified
    #[serde(default)]
    pub default_backend: Option<String>,
    /// Configured backends
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    /// Requests whose text contains one of these substrings bypass retrieval
    #[serde(default)]
    pub skip_patterns: Vec<String>,
}

fn default_port() -> u16 {
    8100
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            default_backend: None,
            backends: HashMap::new(),
            skip_patterns: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// List all usable backends
    pub fn usable_backends(&self) -> Vec<(&String, &BackendConfig)> {
        self.backends
            .iter()
            .filter(|(_, config)| config.is_usable())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProxyConfig::default();
        assert_eq!(config.port, 8100);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
port = 8200
default_backend = "anthropic"
skip_patterns = ["do not remember"]

[backends.anthropic]
name = "Anthropic"
base_url = "https://api.anthropic.com"
api_key_env = "ANTHROPIC_API_KEY"
api_type = "anthropic"

[backends.local]
name = "Ollama"
base_url = "http://localhost:11434"
api_type = "ollama"
"#;
        let config: ProxyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port, 8200);
        assert_eq!(config.default_backend, Some("anthropic".to_string()));
        assert_eq!(config.skip_patterns, vec!["do not remember"]);
        assert_eq!(
            config.backends["anthropic"].api_type,
            ApiType::Anthropic
        );
        // Ollama needs no key to be usable
        assert!(config.backends["local"].is_usable());
    }

    #[test]
    fn test_upstream_path_mapping() {
        let anthropic = Backend::new(BackendConfig {
            name: "a".into(),
            base_url: "https://api.anthropic.com".into(),
            api_key: Some("k".into()),
            api_key_env: None,
            enabled: true,
            api_type: ApiType::Anthropic,
        });
        assert_eq!(
            anthropic.upstream_path(InboundRoute::ChatCompletions),
            "/v1/messages"
        );

        let ollama = Backend::new(BackendConfig {
            name: "o".into(),
            base_url: "http://localhost:11434".into(),
            api_key: None,
            api_key_env: None,
            enabled: true,
            api_type: ApiType::Ollama,
        });
        assert_eq!(ollama.upstream_path(InboundRoute::Generate), "/api/generate");
        assert_eq!(ollama.upstream_path(InboundRoute::Chat), "/api/chat");
    }
}
