// src/graph/mem.rs
// In-memory graph backend: two owned tables keyed by UUID v7 plus index-based
// back-references. Reference implementation and test double; no persistence.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::vecmath::cosine;

use super::store::GraphStore;
use super::types::{
    CommitStats, Entity, EntityAction, Memory, MemoryAction, MemoryDecision, WritePlan,
};

#[derive(Default)]
struct GraphTables {
    entities: HashMap<Uuid, Entity>,
    memories: HashMap<Uuid, Memory>,
    /// normalized name -> entity id
    by_name: HashMap<String, Uuid>,
    /// entity id -> linked memory ids
    edges: HashMap<Uuid, HashSet<Uuid>>,
}

impl GraphTables {
    fn link(&mut self, entity_id: Uuid, memory_id: Uuid) {
        self.edges.entry(entity_id).or_default().insert(memory_id);
        let degree = self.edges[&entity_id].len() as u32;
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.degree = degree;
        }
    }

    fn resolve_about(&self, names: &[String]) -> HashSet<Uuid> {
        names
            .iter()
            .filter_map(|name| self.by_name.get(name).copied())
            .collect()
    }

    fn insert_memory(&mut self, decision: &MemoryDecision) {
        let about = self.resolve_about(&decision.about);
        let memory = Memory {
            id: decision.id,
            content: decision.content.clone(),
            embedding: decision.embedding.clone().unwrap_or_default(),
            created_at: Utc::now(),
            valid_at: decision.valid_at,
            invalid_at: None,
            about: about.clone(),
        };
        self.memories.insert(decision.id, memory);
        for entity_id in about {
            self.link(entity_id, decision.id);
        }
    }
}

/// Tokio-guarded in-memory [`GraphStore`]
#[derive(Default)]
pub struct InMemoryGraphStore {
    tables: RwLock<GraphTables>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity directly, bypassing the write-plan path. Test setup
    /// and bootstrap only.
    pub async fn insert_entity(&self, entity: Entity) {
        let mut tables = self.tables.write().await;
        tables.by_name.insert(entity.name.clone(), entity.id);
        tables.entities.insert(entity.id, entity);
    }

    /// Seed a memory directly, linking it to its `about` entities.
    pub async fn insert_memory_raw(&self, memory: Memory) {
        let mut tables = self.tables.write().await;
        let about: Vec<Uuid> = memory.about.iter().copied().collect();
        let id = memory.id;
        tables.memories.insert(id, memory);
        for entity_id in about {
            tables.link(entity_id, id);
        }
    }

    pub async fn entity_count(&self) -> usize {
        self.tables.read().await.entities.len()
    }

    pub async fn memory_count(&self) -> usize {
        self.tables.read().await.memories.len()
    }

    pub async fn get_memory(&self, id: Uuid) -> Option<Memory> {
        self.tables.read().await.memories.get(&id).cloned()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn search_vector(&self, embedding: &[f32], k: usize) -> Result<Vec<(Memory, f32)>> {
        let tables = self.tables.read().await;
        let mut scored: Vec<(Memory, f32)> = tables
            .memories
            .values()
            .filter(|m| m.is_live() && !m.embedding.is_empty())
            .map(|m| (m.clone(), cosine(&m.embedding, embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn search_fulltext(&self, query: &str, k: usize) -> Result<Vec<(Memory, f32)>> {
        // The caller escapes Lucene metacharacters; strip the escapes back
        // out for plain substring matching.
        let unescaped = query.replace('\\', "");
        let terms: Vec<String> = unescaped
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let tables = self.tables.read().await;
        let mut scored: Vec<(Memory, f32)> = tables
            .memories
            .values()
            .filter(|m| m.is_live())
            .filter_map(|m| {
                let content = m.content.to_lowercase();
                let hits = terms.iter().filter(|t| content.contains(t.as_str())).count();
                if hits == 0 {
                    None
                } else {
                    Some((m.clone(), hits as f32 / terms.len() as f32))
                }
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn neighbors(&self, entity_id: Uuid) -> Result<Vec<(Uuid, Uuid)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .edges
            .get(&entity_id)
            .map(|memories| memories.iter().map(|m| (entity_id, *m)).collect())
            .unwrap_or_default())
    }

    async fn get_entity_by_name(&self, name: &str) -> Result<Option<Entity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_name
            .get(name)
            .and_then(|id| tables.entities.get(id))
            .cloned())
    }

    async fn entities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Entity>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.entities.get(id))
            .cloned()
            .collect())
    }

    async fn memories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Memory>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.memories.get(id))
            .cloned()
            .collect())
    }

    async fn apply(&self, plan: &WritePlan) -> Result<CommitStats> {
        let mut tables = self.tables.write().await;
        let mut stats = CommitStats::default();

        // Entities first so same-plan memories can link to them
        for decision in &plan.entities {
            match decision.action {
                EntityAction::Create => {
                    if tables.entities.contains_key(&decision.id)
                        || tables.by_name.contains_key(&decision.name)
                    {
                        // Replay or concurrent create: the row already exists
                        stats.entities_matched += 1;
                        continue;
                    }
                    tables.by_name.insert(decision.name.clone(), decision.id);
                    tables.entities.insert(
                        decision.id,
                        Entity {
                            id: decision.id,
                            name: decision.name.clone(),
                            entity_type: decision.entity_type.clone(),
                            embedding: decision.embedding.clone(),
                            degree: 0,
                        },
                    );
                    stats.entities_created += 1;
                }
                EntityAction::Match => {
                    stats.entities_matched += 1;
                }
            }
        }

        for decision in &plan.memories {
            match decision.action {
                MemoryAction::Add => {
                    if tables.memories.contains_key(&decision.id) {
                        stats.memories_skipped += 1;
                        continue;
                    }
                    tables.insert_memory(decision);
                    stats.memories_added += 1;
                }
                MemoryAction::Update => {
                    if tables.memories.contains_key(&decision.id) {
                        stats.memories_skipped += 1;
                        continue;
                    }
                    match decision.target_id {
                        Some(target) => {
                            if let Some(old) = tables.memories.get_mut(&target) {
                                if old.invalid_at.is_none() {
                                    old.invalid_at = Some(Utc::now());
                                }
                            } else {
                                warn!(%target, "update target missing, adding successor only");
                            }
                        }
                        None => {
                            warn!("update decision without target, adding successor only");
                        }
                    }
                    tables.insert_memory(decision);
                    stats.memories_updated += 1;
                }
                MemoryAction::Skip => {
                    stats.memories_skipped += 1;
                }
            }
        }

        debug!(
            created = stats.entities_created,
            matched = stats.entities_matched,
            added = stats.memories_added,
            updated = stats.memories_updated,
            "write plan applied"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{ConsolidationStats, EntityDecision};
    use crate::utils::generate_id;

    fn create_entity(name: &str) -> EntityDecision {
        EntityDecision {
            id: generate_id(),
            name: name.to_string(),
            entity_type: "technology".to_string(),
            action: EntityAction::Create,
            matched_id: None,
            reason: "new".to_string(),
            embedding: None,
        }
    }

    fn add_memory(content: &str, about: &[&str]) -> MemoryDecision {
        MemoryDecision {
            id: generate_id(),
            content: content.to_string(),
            action: MemoryAction::Add,
            target_id: None,
            reason: "new fact".to_string(),
            about: about.iter().map(|s| s.to_string()).collect(),
            embedding: Some(vec![1.0, 0.0]),
            valid_at: None,
        }
    }

    fn plan(entities: Vec<EntityDecision>, memories: Vec<MemoryDecision>) -> WritePlan {
        WritePlan {
            entities,
            memories,
            user_description: None,
            stats: ConsolidationStats::default(),
        }
    }

    #[tokio::test]
    async fn test_apply_creates_and_links() {
        let store = InMemoryGraphStore::new();
        let plan = plan(
            vec![create_entity("Rust")],
            vec![add_memory("User prefers Rust", &["Rust"])],
        );

        let stats = store.apply(&plan).await.unwrap();
        assert_eq!(stats.entities_created, 1);
        assert_eq!(stats.memories_added, 1);

        let entity = store.get_entity_by_name("Rust").await.unwrap().unwrap();
        assert_eq!(entity.degree, 1);

        let edges = store.neighbors(entity.id).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, entity.id);
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let store = InMemoryGraphStore::new();
        let plan = plan(
            vec![create_entity("Rust")],
            vec![add_memory("User prefers Rust", &["Rust"])],
        );

        store.apply(&plan).await.unwrap();
        let replay = store.apply(&plan).await.unwrap();

        assert_eq!(replay.entities_created, 0);
        assert_eq!(replay.entities_matched, 1);
        assert_eq!(replay.memories_added, 0);
        assert_eq!(replay.memories_skipped, 1);

        assert_eq!(store.entity_count().await, 1);
        assert_eq!(store.memory_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_invalidates_target() {
        let store = InMemoryGraphStore::new();
        let first = add_memory("User prefers Python", &[]);
        let target = first.id;
        store.apply(&plan(vec![], vec![first])).await.unwrap();

        let mut successor = add_memory("User prefers Rust now", &[]);
        successor.action = MemoryAction::Update;
        successor.target_id = Some(target);
        let stats = store.apply(&plan(vec![], vec![successor])).await.unwrap();

        assert_eq!(stats.memories_updated, 1);
        let old = store.get_memory(target).await.unwrap();
        assert!(old.invalid_at.is_some());
        assert_eq!(store.memory_count().await, 2);
    }

    #[tokio::test]
    async fn test_vector_search_ranks_by_similarity() {
        let store = InMemoryGraphStore::new();
        for (content, embedding) in [
            ("close", vec![1.0, 0.0]),
            ("far", vec![0.0, 1.0]),
            ("middle", vec![0.7, 0.7]),
        ] {
            let mut m = add_memory(content, &[]);
            m.embedding = Some(embedding);
            store.apply(&plan(vec![], vec![m])).await.unwrap();
        }

        let hits = store.search_vector(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.content, "close");
        assert!(hits[0].1 >= hits[1].1);
    }

    #[tokio::test]
    async fn test_fulltext_search_matches_escaped_query() {
        let store = InMemoryGraphStore::new();
        store
            .apply(&plan(
                vec![],
                vec![add_memory("Working on C++ programming", &[])],
            ))
            .await
            .unwrap();

        let escaped = crate::utils::sanitize_lucene("C++ programming");
        let hits = store.search_fulltext(&escaped, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidated_memories_are_not_searched() {
        let store = InMemoryGraphStore::new();
        let stale = add_memory("old fact about rust", &[]);
        let target = stale.id;
        store.apply(&plan(vec![], vec![stale])).await.unwrap();

        let mut successor = add_memory("new fact about rust", &[]);
        successor.action = MemoryAction::Update;
        successor.target_id = Some(target);
        store.apply(&plan(vec![], vec![successor])).await.unwrap();

        let hits = store.search_fulltext("rust", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.content, "new fact about rust");
    }
}
