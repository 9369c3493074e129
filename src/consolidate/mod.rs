// src/consolidate/mod.rs

//! Consolidation pipeline - turns a free-form note into graph mutations.
//!
//! Two branches run concurrently: Branch A retrieves prior context for the
//! note, Branch B extracts entities and memories from it. The join is a
//! barrier; resolution then decides how each extracted item lands in the
//! graph and the result is materialized as an idempotent [`WritePlan`].
//! The pipeline never writes - the caller commits the plan.

mod extract;
pub mod prompts;
mod resolve;

pub use extract::{ExtractedEntity, ExtractedMemory, Extraction, ExtractionStage};
pub use resolve::{Resolution, ResolutionStage};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{LlmConfig, MementoConfig};
use crate::embeddings::EmbeddingClient;
use crate::error::{MementoError, Result};
use crate::graph::{
    ConsolidationStats, Entity, EntityAction, GraphStore, MemoryAction, RetrievalQuery,
    RetrievalResult, WritePlan,
};
use crate::llm::LlmClient;
use crate::retry::RetryPolicy;
use crate::retrieval::HybridRetriever;

/// LLM call counters for one stage
#[derive(Debug, Clone, Copy, Default)]
pub struct StageMetrics {
    pub llm_calls: u32,
    pub retried: u32,
}

/// Run a structured completion, retrying schema violations and transient
/// failures up to `max_retries`, and deserialize the result.
pub(crate) async fn complete_with_retries<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    prompt: &str,
    schema: &Value,
    llm_config: &LlmConfig,
    max_retries: u32,
    metrics: &mut StageMetrics,
    op: &str,
) -> Result<T> {
    let policy = RetryPolicy::default();
    let mut attempt = 0;
    loop {
        metrics.llm_calls += 1;
        let result = llm
            .complete(
                prompt,
                schema,
                llm_config.max_tokens,
                llm_config.temperature,
            )
            .await
            .and_then(|value| {
                serde_json::from_value::<T>(value).map_err(|e| {
                    MementoError::SchemaViolation(format!("{op} output did not deserialize: {e}"))
                })
            });

        match result {
            Ok(parsed) => return Ok(parsed),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                metrics.retried += 1;
                warn!(op, attempt, error = %err, "LLM stage retrying");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// The two-branch consolidation pipeline
pub struct ConsolidationPipeline {
    store: Arc<dyn GraphStore>,
    retriever: Arc<HybridRetriever>,
    embedder: Arc<dyn EmbeddingClient>,
    extraction: ExtractionStage,
    resolution: ResolutionStage,
    config: MementoConfig,
}

impl ConsolidationPipeline {
    pub fn new(
        store: Arc<dyn GraphStore>,
        retriever: Arc<HybridRetriever>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        config: MementoConfig,
    ) -> Self {
        let extraction = ExtractionStage::new(
            llm.clone(),
            config.consolidation.clone(),
            config.llm.clone(),
        );
        let resolution = ResolutionStage::new(
            llm,
            config.consolidation.clone(),
            config.llm.clone(),
        );
        Self {
            store,
            retriever,
            embedder,
            extraction,
            resolution,
            config,
        }
    }

    /// Consolidate one note into a write plan, bounded by the pipeline
    /// deadline. Cancellation is atomic - on timeout no partial plan is
    /// produced.
    pub async fn consolidate(&self, note: &str) -> Result<WritePlan> {
        let deadline = Duration::from_secs(self.config.consolidation.deadline_secs);
        match tokio::time::timeout(deadline, self.run(note)).await {
            Ok(result) => result,
            Err(_) => Err(MementoError::TimeoutExceeded),
        }
    }

    async fn run(&self, note: &str) -> Result<WritePlan> {
        debug!(stage = "running_branches", "consolidation started");
        let (a, b) = tokio::join!(self.branch_a(note), self.branch_b(note));
        debug!(stage = "joined", "branches joined");

        // Branch A is best-effort: resolution still works with no context.
        // Branch B failing means there is nothing to consolidate.
        let (context, branch_a_ms) = match a {
            Ok((result, elapsed)) => (result, elapsed),
            Err(err) => {
                warn!(error = %err, "context retrieval failed, resolving without context");
                (RetrievalResult::default(), 0)
            }
        };
        let (extraction, branch_b_ms) = b?;

        debug!(
            stage = "resolving",
            entities = extraction.entities.len(),
            memories = extraction.memories.len(),
        );
        let context_entities = self.context_entities(&context).await.unwrap_or_default();
        let resolution = self
            .resolution
            .resolve(
                self.store.as_ref(),
                &extraction,
                &context.memories,
                &context_entities,
            )
            .await?;

        debug!(stage = "planned", "materializing write plan");
        let plan = self
            .materialize(extraction.metrics, resolution, branch_a_ms, branch_b_ms)
            .await?;

        debug!(
            stage = "done",
            entities = plan.entities.len(),
            memories = plan.memories.len(),
            llm_calls = plan.stats.llm_calls,
        );
        Ok(plan)
    }

    async fn branch_a(&self, note: &str) -> Result<(RetrievalResult, u64)> {
        let started = Instant::now();
        let embedding = self.embedder.embed(note).await?;
        let query = RetrievalQuery {
            text: note.to_string(),
            embedding,
            k: self.config.consolidation.context_k,
            weights: self.config.retrieval.weights,
        };
        let result = self.retriever.retrieve(&query).await?;
        Ok((result, started.elapsed().as_millis() as u64))
    }

    async fn branch_b(&self, note: &str) -> Result<(Extraction, u64)> {
        let started = Instant::now();
        let extraction = self.extraction.extract(note).await?;
        Ok((extraction, started.elapsed().as_millis() as u64))
    }

    /// Entities referenced by the context memories, for candidate matching
    async fn context_entities(&self, context: &RetrievalResult) -> Result<Vec<Entity>> {
        let mut ids: Vec<Uuid> = Vec::new();
        for sm in &context.memories {
            for id in &sm.memory.about {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.entities_by_ids(&ids).await
    }

    /// Attach embeddings to new rows and assemble the final plan.
    async fn materialize(
        &self,
        extraction_metrics: StageMetrics,
        resolution: Resolution,
        branch_a_ms: u64,
        branch_b_ms: u64,
    ) -> Result<WritePlan> {
        let Resolution {
            mut entities,
            mut memories,
            user_description,
            metrics,
            repaired,
        } = resolution;

        let mut texts: Vec<String> = Vec::new();
        for decision in &entities {
            if decision.action == EntityAction::Create {
                texts.push(decision.name.clone());
            }
        }
        for decision in &memories {
            if matches!(decision.action, MemoryAction::Add | MemoryAction::Update) {
                texts.push(decision.content.clone());
            }
        }

        if !texts.is_empty() {
            let vectors = self.embedder.embed_batch(&texts).await?;
            let mut vectors = vectors.into_iter();
            for decision in entities.iter_mut() {
                if decision.action == EntityAction::Create {
                    decision.embedding = vectors.next();
                }
            }
            for decision in memories.iter_mut() {
                if matches!(decision.action, MemoryAction::Add | MemoryAction::Update) {
                    decision.embedding = vectors.next();
                }
            }
        }

        let stats = ConsolidationStats {
            llm_calls: extraction_metrics.llm_calls + metrics.llm_calls,
            branch_a_ms,
            branch_b_ms,
            retried_decisions: extraction_metrics.retried + metrics.retried,
            repaired_decisions: repaired,
        };

        Ok(WritePlan {
            entities,
            memories,
            user_description,
            stats,
        })
    }
}
