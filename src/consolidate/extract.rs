// src/consolidate/extract.rs
// Extraction stage - LLM-driven entity and memory extraction from a note

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ConsolidationConfig, LlmConfig};
use crate::error::Result;
use crate::llm::LlmClient;
use crate::utils::{normalize_entity_name, parse_timestamp};

use super::prompts;
use super::{StageMetrics, complete_with_retries};

/// An entity surfaced by extraction, name already normalized
#[derive(Debug, Clone)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: String,
    pub description: Option<String>,
    pub is_well_known: bool,
}

/// A candidate fact surfaced by extraction
#[derive(Debug, Clone)]
pub struct ExtractedMemory {
    pub content: String,
    pub about_entities: Vec<String>,
    pub valid_at: Option<DateTime<Utc>>,
}

/// Everything Branch B hands to resolution
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entities: Vec<ExtractedEntity>,
    pub memories: Vec<ExtractedMemory>,
    pub user_facts: Vec<String>,
    pub metrics: StageMetrics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtraction {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    memories: Vec<RawMemory>,
    #[serde(default)]
    user_biographical_facts: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntity {
    name: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_well_known: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMemory {
    content: String,
    #[serde(default)]
    about_entities: Vec<String>,
    #[serde(default)]
    valid_at: Option<String>,
}

/// LLM extraction with shape validation and bounded retries
pub struct ExtractionStage {
    llm: Arc<dyn LlmClient>,
    consolidation: ConsolidationConfig,
    llm_config: LlmConfig,
}

impl ExtractionStage {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        consolidation: ConsolidationConfig,
        llm_config: LlmConfig,
    ) -> Self {
        Self {
            llm,
            consolidation,
            llm_config,
        }
    }

    /// Extract entities, memories, and biographical facts from a note.
    pub async fn extract(&self, note: &str) -> Result<Extraction> {
        let prompt = prompts::extraction_prompt(note);
        let schema = prompts::extraction_schema();
        let mut metrics = StageMetrics::default();

        let raw: RawExtraction = complete_with_retries(
            self.llm.as_ref(),
            &prompt,
            &schema,
            &self.llm_config,
            self.consolidation.max_retries,
            &mut metrics,
            "extraction",
        )
        .await?;

        let entities = raw
            .entities
            .into_iter()
            .filter_map(|e| self.sanitize_entity(e))
            .collect::<Vec<_>>();

        let memories = raw
            .memories
            .into_iter()
            .filter_map(sanitize_memory)
            .collect::<Vec<_>>();

        debug!(
            entities = entities.len(),
            memories = memories.len(),
            facts = raw.user_biographical_facts.len(),
            "extraction complete"
        );

        Ok(Extraction {
            entities,
            memories,
            user_facts: raw.user_biographical_facts,
            metrics,
        })
    }

    fn sanitize_entity(&self, raw: RawEntity) -> Option<ExtractedEntity> {
        let name = normalize_entity_name(raw.name.trim());
        if name.is_empty() {
            warn!("dropping extracted entity with empty name");
            return None;
        }

        let entity_type = raw.entity_type.trim().to_lowercase();
        if !prompts::ENTITY_TYPES.contains(&entity_type.as_str()) {
            warn!(name = %name, entity_type = %entity_type, "dropping entity with unknown type");
            return None;
        }

        Some(ExtractedEntity {
            name,
            entity_type,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            is_well_known: raw.is_well_known,
        })
    }
}

fn sanitize_memory(raw: RawMemory) -> Option<ExtractedMemory> {
    let content = raw.content.trim().to_string();
    if content.is_empty() {
        warn!("dropping extracted memory with empty content");
        return None;
    }

    let valid_at = match raw.valid_at {
        Some(ts) => {
            let parsed = parse_timestamp(&ts);
            if parsed.is_none() {
                warn!(valid_at = %ts, "dropping unparseable validAt timestamp");
            }
            parsed
        }
        None => None,
    };

    Some(ExtractedMemory {
        content,
        about_entities: raw
            .about_entities
            .iter()
            .map(|n| normalize_entity_name(n.trim()))
            .filter(|n| !n.is_empty())
            .collect(),
        valid_at,
    })
}
