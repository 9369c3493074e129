// tests/common/mod.rs
// Shared test doubles: deterministic embedder and scripted LLM
#![allow(dead_code)]

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use memento::embeddings::EmbeddingClient;
use memento::error::{MementoError, Result};
use memento::llm::LlmClient;
use memento::vecmath::l2_normalize;

pub const DIM: usize = 8;

/// Deterministic bag-of-words embedder: each token lights up one of eight
/// dimensions, so texts sharing words get closer vectors.
pub struct StubEmbedder;

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for token in text.to_lowercase().split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        v[(hasher.finish() % DIM as u64) as usize] += 1.0;
    }
    l2_normalize(&v)
}

#[async_trait]
impl EmbeddingClient for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(MementoError::EmptyInput);
        }
        Ok(embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Embedder whose single-embed path fails, for exercising Branch A
/// degradation while plan materialization still works.
pub struct FlakySingleEmbedder;

#[async_trait]
impl EmbeddingClient for FlakySingleEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MementoError::Connection("embedding endpoint down".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// LLM returning a scripted queue of responses, one per `complete` call.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<Value>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Result<Value>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        prompt: &str,
        _schema: &Value,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<Value> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MementoError::Query("scripted LLM exhausted".into())))
    }
}
