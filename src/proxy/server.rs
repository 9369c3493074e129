// src/proxy/server.rs
// Proxy state: configured backends plus the optional memory engine

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::MemoryEngine;
use crate::inject::{inject, inject_prompt, render_memento};

use super::backend::{Backend, InboundRoute, ProxyConfig};
use super::filter::should_skip;

/// Shared state for the proxy server
#[derive(Clone)]
pub struct ProxyServer {
    /// Proxy configuration
    pub config: ProxyConfig,
    /// Initialized backends (keyed by config name)
    pub backends: Arc<HashMap<String, Backend>>,
    /// Memory engine; absent when no providers are configured, in which
    /// case requests pass through untouched
    engine: Option<Arc<MemoryEngine>>,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig, engine: Option<Arc<MemoryEngine>>) -> Self {
        let mut backends = HashMap::new();
        for (name, backend_config) in &config.backends {
            if backend_config.is_usable() {
                backends.insert(name.clone(), Backend::new(backend_config.clone()));
            }
        }

        Self {
            config,
            backends: Arc::new(backends),
            engine,
        }
    }

    /// Get a backend: the override header, the configured default, or the
    /// only usable one.
    pub fn get_backend(&self, override_name: Option<&str>) -> Option<Backend> {
        if let Some(name) = override_name {
            return self.backends.get(name).cloned();
        }
        if let Some(name) = &self.config.default_backend {
            return self.backends.get(name).cloned();
        }
        if self.backends.len() == 1 {
            return self.backends.values().next().cloned();
        }
        None
    }

    /// Memory step for one request: skip-filter, retrieve, inject, and hand
    /// the turn to consolidation in the background. Retrieval failures are
    /// soft - the body is forwarded unmodified.
    pub async fn enrich(&self, body: &Value, route: InboundRoute) -> Value {
        let Some(engine) = &self.engine else {
            return body.clone();
        };
        let Some(text) = last_user_text(body) else {
            return body.clone();
        };
        if should_skip(&text, &self.config.skip_patterns) {
            debug!("skip pattern matched, bypassing retrieval");
            return body.clone();
        }

        // Consolidation happens off the request path
        let background = engine.clone();
        let note = text.clone();
        tokio::spawn(async move {
            if let Err(err) = background.consolidate_and_commit(&note).await {
                warn!(error = %err, "background consolidation failed");
            }
        });

        match engine.retrieve_for(&text).await {
            Ok(result) => {
                let memento = render_memento(&result);
                if route == InboundRoute::Generate {
                    inject_prompt(body, &memento)
                } else {
                    inject(body, &memento)
                }
            }
            Err(err) => {
                warn!(error = %err, "retrieval failed, forwarding without memento");
                body.clone()
            }
        }
    }

    /// Start the proxy server
    pub async fn run(self) -> anyhow::Result<()> {
        use super::routes;

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        tracing::info!("memento proxy listening on {}", addr);

        let app = routes::create_router(self);
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Pull the text of the last user turn out of a request body: the last
/// `user` message for chat shapes, the `prompt` field for generate shapes.
pub fn last_user_text(body: &Value) -> Option<String> {
    if let Some(messages) = body.get("messages").and_then(|m| m.as_array()) {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))?;
        return match last_user.get("content") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(blocks)) => {
                let text = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() { None } else { Some(text) }
            }
            _ => None,
        };
    }

    body.get("prompt")
        .and_then(|p| p.as_str())
        .map(|s| s.to_string())
}
