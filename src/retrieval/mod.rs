// src/retrieval/mod.rs
// Hybrid retrieval - fuses vector, full-text, and graph-walk evidence into
// one ranked memory list.

mod walk;
mod weights;

pub use walk::{GraphWalker, seed_for_query};
pub use weights::{entity_weights, normalize_weights};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{MementoConfig, RetrievalConfig, WeighterConfig};
use crate::error::{MementoError, Result};
use crate::fusion::rrf_weighted;
use crate::graph::{
    GraphStore, Memory, RetrievalQuery, RetrievalResult, ScoreSource, ScoredMemory,
};
use crate::retry::{RetryBudget, RetryPolicy, with_backoff};
use crate::utils::sanitize_lucene;
use crate::vecmath::align_distribution;

/// Target moments for cross-source score alignment
const ALIGN_MEAN: f32 = 0.5;
const ALIGN_STDDEV: f32 = 0.2;

/// Orchestrates the three retrieval sub-queries and their fusion
pub struct HybridRetriever {
    store: Arc<dyn GraphStore>,
    retrieval: RetrievalConfig,
    weighter: WeighterConfig,
    walker: GraphWalker,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn GraphStore>, config: &MementoConfig) -> Self {
        Self {
            store,
            retrieval: config.retrieval.clone(),
            weighter: config.weighter.clone(),
            walker: GraphWalker::new(config.walker.clone()),
        }
    }

    /// Run the hybrid retrieval.
    ///
    /// Each sub-query retries transient failures; a sub-query that still
    /// fails is excluded from fusion with a warning. Only when every source
    /// fails does the whole retrieval error.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalResult> {
        let k = query.k.max(1);
        let policy = RetryPolicy::with_max_retries(self.retrieval.max_retries);
        let budget = RetryBudget::new(self.retrieval.retry_budget);
        let lucene = sanitize_lucene(&query.text);

        let (vector, fulltext, graph) = tokio::join!(
            with_backoff(&policy, &budget, "vector_search", || {
                self.store.search_vector(&query.embedding, k)
            }),
            with_backoff(&policy, &budget, "fulltext_search", || {
                self.store.search_fulltext(&lucene, k)
            }),
            self.graph_subquery(query, &policy, &budget),
        );

        let mut sources_used = Vec::new();
        let vector = admit(vector, ScoreSource::Vector, &mut sources_used);
        let fulltext = admit(fulltext, ScoreSource::Fulltext, &mut sources_used);
        let graph = admit(graph, ScoreSource::Graph, &mut sources_used);

        if sources_used.is_empty() {
            return Err(MementoError::Retrieval(
                "all retrieval sources failed".into(),
            ));
        }

        // Vector and full-text scores live on different scales; align both
        // to shared moments before fusing.
        let vector = to_scored(align_scores(vector), ScoreSource::Vector);
        let fulltext = to_scored(align_scores(fulltext), ScoreSource::Fulltext);
        let graph = to_scored(graph, ScoreSource::Graph);

        let weights = &query.weights;
        let fused = rrf_weighted(
            vec![
                (vector, weights.vector),
                (fulltext, weights.fulltext),
                (graph, weights.graph),
            ],
            self.retrieval.rrf_k,
            |sm: &ScoredMemory| sm.memory.id,
        );

        let mut memories: Vec<ScoredMemory> = fused
            .into_iter()
            .take(k)
            .map(|(sm, score)| ScoredMemory {
                memory: sm.memory,
                score,
                source: ScoreSource::Fused,
                about_names: Vec::new(),
            })
            .collect();

        self.resolve_about_names(&mut memories).await?;

        debug!(
            query = %query.text,
            results = memories.len(),
            sources = sources_used.len(),
            "hybrid retrieval complete"
        );

        Ok(RetrievalResult {
            memories,
            sources_used,
        })
    }

    /// Graph sub-query: vector-seeded entity weighting feeding a
    /// personalized random walk.
    async fn graph_subquery(
        &self,
        query: &RetrievalQuery,
        policy: &RetryPolicy,
        budget: &RetryBudget,
    ) -> Result<Vec<(Memory, f32)>> {
        let seeds_raw = with_backoff(policy, budget, "graph_seed", || {
            self.store
                .search_vector(&query.embedding, self.retrieval.seed_k)
        })
        .await?;
        if seeds_raw.is_empty() {
            return Ok(Vec::new());
        }

        let mut entity_ids: Vec<Uuid> = Vec::new();
        let mut seen = HashSet::new();
        for (memory, _) in &seeds_raw {
            for id in &memory.about {
                if seen.insert(*id) {
                    entity_ids.push(*id);
                }
            }
        }
        let entities = self.store.entities_by_ids(&entity_ids).await?;
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let seed_memories = to_scored(seeds_raw, ScoreSource::Vector);
        let raw_weights = entity_weights(
            &entities,
            &seed_memories,
            &query.embedding,
            &self.weighter,
        );
        let normalized = normalize_weights(&raw_weights);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let seeds: Vec<(Uuid, f32)> = entities
            .iter()
            .filter_map(|e| normalized.get(&e.name).map(|w| (e.id, *w)))
            .collect();

        let visits = self
            .walker
            .walk(self.store.as_ref(), &seeds, seed_for_query(&query.text))
            .await?;

        let mut ranked: Vec<(Uuid, f32)> = visits.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(query.k.max(1));

        let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
        let rows = self.store.memories_by_ids(&ids).await?;
        let by_id: HashMap<Uuid, Memory> = rows.into_iter().map(|m| (m.id, m)).collect();

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| by_id.get(&id).map(|m| (m.clone(), score)))
            .collect())
    }

    /// Fill `about_names` on fused results from the entity table.
    async fn resolve_about_names(&self, memories: &mut [ScoredMemory]) -> Result<()> {
        let mut ids: Vec<Uuid> = Vec::new();
        let mut seen = HashSet::new();
        for sm in memories.iter() {
            for id in &sm.memory.about {
                if seen.insert(*id) {
                    ids.push(*id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(());
        }

        let entities = self.store.entities_by_ids(&ids).await?;
        let names: HashMap<Uuid, String> =
            entities.into_iter().map(|e| (e.id, e.name)).collect();

        for sm in memories.iter_mut() {
            let mut about: Vec<String> = sm
                .memory
                .about
                .iter()
                .filter_map(|id| names.get(id).cloned())
                .collect();
            about.sort();
            sm.about_names = about;
        }
        Ok(())
    }
}

/// Admit a sub-query result into fusion, or log and exclude it.
fn admit(
    result: Result<Vec<(Memory, f32)>>,
    source: ScoreSource,
    sources_used: &mut Vec<ScoreSource>,
) -> Vec<(Memory, f32)> {
    match result {
        Ok(rows) => {
            sources_used.push(source);
            rows
        }
        Err(err) => {
            warn!(source = %source, error = %err, "retrieval source excluded");
            Vec::new()
        }
    }
}

fn align_scores(rows: Vec<(Memory, f32)>) -> Vec<(Memory, f32)> {
    let scores: Vec<f32> = rows.iter().map(|(_, s)| *s).collect();
    let aligned = align_distribution(&scores, ALIGN_MEAN, ALIGN_STDDEV);
    rows.into_iter()
        .zip(aligned)
        .map(|((memory, _), score)| (memory, score))
        .collect()
}

fn to_scored(rows: Vec<(Memory, f32)>, source: ScoreSource) -> Vec<ScoredMemory> {
    rows.into_iter()
        .map(|(memory, score)| ScoredMemory {
            memory,
            score,
            source,
            about_names: Vec::new(),
        })
        .collect()
}
