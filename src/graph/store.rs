// src/graph/store.rs

//! Capability trait for graph backends. All retrieval and consolidation goes
//! through this; no direct storage access in the engine.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use super::types::{CommitStats, Entity, Memory, WritePlan};

/// Trait for any graph backend holding entities, memories, and their edges.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Top-k memories by cosine similarity to the query embedding.
    async fn search_vector(&self, embedding: &[f32], k: usize) -> Result<Vec<(Memory, f32)>>;

    /// Top-k memories by full-text relevance. The query arrives already
    /// escaped for Lucene syntax.
    async fn search_fulltext(&self, query: &str, k: usize) -> Result<Vec<(Memory, f32)>>;

    /// One-hop edges from an entity: `(entity_id, memory_id)` pairs for each
    /// memory linked to it.
    async fn neighbors(&self, entity_id: Uuid) -> Result<Vec<(Uuid, Uuid)>>;

    /// Exact lookup by normalized name.
    async fn get_entity_by_name(&self, name: &str) -> Result<Option<Entity>>;

    /// Batch fetch, preserving input order for ids that exist.
    async fn entities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Entity>>;

    /// Batch fetch, preserving input order for ids that exist.
    async fn memories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Memory>>;

    /// Commit a write plan. Idempotent by decision id: replaying a plan
    /// leaves the graph unchanged.
    async fn apply(&self, plan: &WritePlan) -> Result<CommitStats>;
}
