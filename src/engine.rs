// src/engine.rs
// Wires the retriever, clients, and pipeline into one request-path facade

use std::sync::Arc;

use tracing::info;

use crate::config::MementoConfig;
use crate::consolidate::ConsolidationPipeline;
use crate::embeddings::EmbeddingClient;
use crate::error::Result;
use crate::graph::{CommitStats, GraphStore, RetrievalQuery, RetrievalResult};
use crate::llm::LlmClient;
use crate::retrieval::HybridRetriever;

/// The memory engine behind the proxy: retrieval on the request path,
/// consolidation off it.
pub struct MemoryEngine {
    store: Arc<dyn GraphStore>,
    retriever: Arc<HybridRetriever>,
    embedder: Arc<dyn EmbeddingClient>,
    pipeline: ConsolidationPipeline,
    config: MementoConfig,
}

impl MemoryEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        config: MementoConfig,
    ) -> Self {
        let retriever = Arc::new(HybridRetriever::new(store.clone(), &config));
        let pipeline = ConsolidationPipeline::new(
            store.clone(),
            retriever.clone(),
            embedder.clone(),
            llm,
            config.clone(),
        );
        Self {
            store,
            retriever,
            embedder,
            pipeline,
            config,
        }
    }

    /// Retrieve memories relevant to a request turn.
    pub async fn retrieve_for(&self, text: &str) -> Result<RetrievalResult> {
        let embedding = self.embedder.embed(text).await?;
        let query = RetrievalQuery {
            text: text.to_string(),
            embedding,
            k: self.config.retrieval.top_k,
            weights: self.config.retrieval.weights,
        };
        self.retriever.retrieve(&query).await
    }

    /// Consolidate a note and commit the resulting plan to the graph.
    pub async fn consolidate_and_commit(&self, note: &str) -> Result<CommitStats> {
        let plan = self.pipeline.consolidate(note).await?;
        let stats = self.store.apply(&plan).await?;
        info!(
            entities_created = stats.entities_created,
            memories_added = stats.memories_added,
            memories_updated = stats.memories_updated,
            "note consolidated"
        );
        Ok(stats)
    }
}
