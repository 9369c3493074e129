// src/graph/types.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A node in the knowledge graph representing a person, project, technology,
/// or other recurring subject. `name` is stored normalized; `degree` is the
/// number of memories linked to this entity and is maintained by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub entity_type: String,
    pub embedding: Option<Vec<f32>>,
    pub degree: u32,
}

/// A consolidated fact. Never deleted: superseded memories get `invalid_at`
/// set and a successor row takes over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub valid_at: Option<DateTime<Utc>>,
    pub invalid_at: Option<DateTime<Utc>>,
    pub about: HashSet<Uuid>,
}

impl Memory {
    /// A memory is live until something invalidates it.
    pub fn is_live(&self) -> bool {
        self.invalid_at.is_none()
    }
}

/// Which retrieval signal produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Vector,
    Fulltext,
    Graph,
    Fused,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Vector => "vector",
            ScoreSource::Fulltext => "fulltext",
            ScoreSource::Graph => "graph",
            ScoreSource::Fused => "fused",
        }
    }
}

impl std::fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A memory with its retrieval score and provenance
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
    pub source: ScoreSource,
    pub about_names: Vec<String>,
}

/// Per-source weights applied during fusion. All weights must be >= 0 with
/// at least one positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceWeights {
    pub vector: f32,
    pub fulltext: f32,
    pub graph: f32,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            vector: 1.0,
            fulltext: 1.0,
            graph: 1.0,
        }
    }
}

impl SourceWeights {
    pub fn is_valid(&self) -> bool {
        let ws = [self.vector, self.fulltext, self.graph];
        ws.iter().all(|w| *w >= 0.0) && ws.iter().any(|w| *w > 0.0)
    }
}

/// A single retrieval request against the graph
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub text: String,
    pub embedding: Vec<f32>,
    pub k: usize,
    pub weights: SourceWeights,
}

/// Ranked retrieval output. Scores are non-increasing; at most `k` entries.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub memories: Vec<ScoredMemory>,
    /// Sources that contributed (fewer than three under partial failure)
    pub sources_used: Vec<ScoreSource>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityAction {
    Create,
    Match,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryAction {
    Add,
    Update,
    Skip,
}

/// Resolved decision for one extracted entity.
///
/// `id` is materialized when the plan is built: a fresh v7 id for CREATE,
/// the matched entity's id for MATCH. Replaying the same plan is a no-op
/// because the store applies by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDecision {
    pub id: Uuid,
    pub name: String,
    pub entity_type: String,
    pub action: EntityAction,
    pub matched_id: Option<Uuid>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Resolved decision for one extracted memory. For UPDATE the new row (under
/// `id`) supersedes `target_id`, which gets invalidated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDecision {
    pub id: Uuid,
    pub content: String,
    pub action: MemoryAction,
    pub target_id: Option<Uuid>,
    pub reason: String,
    /// Normalized entity names this memory is about
    pub about: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub valid_at: Option<DateTime<Utc>>,
}

/// Counters observed while a consolidation run executes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationStats {
    pub llm_calls: u32,
    pub branch_a_ms: u64,
    pub branch_b_ms: u64,
    pub retried_decisions: u32,
    pub repaired_decisions: u32,
}

/// The full set of graph mutations produced by one consolidation run.
/// Application is idempotent: every CREATE/ADD carries its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritePlan {
    pub entities: Vec<EntityDecision>,
    pub memories: Vec<MemoryDecision>,
    pub user_description: Option<String>,
    pub stats: ConsolidationStats,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.memories.is_empty() && self.user_description.is_none()
    }
}

/// What actually changed when a plan was applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub entities_created: usize,
    pub entities_matched: usize,
    pub memories_added: usize,
    pub memories_updated: usize,
    pub memories_skipped: usize,
}
