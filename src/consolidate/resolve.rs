// src/consolidate/resolve.rs
// Resolution stage - decides, per extracted entity and memory, how the graph
// changes. Malformed target references are repaired to CREATE/ADD rather
// than surfaced.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ConsolidationConfig, LlmConfig};
use crate::error::Result;
use crate::graph::{
    Entity, EntityAction, EntityDecision, GraphStore, MemoryAction, MemoryDecision, ScoredMemory,
};
use crate::llm::LlmClient;
use crate::utils::generate_id;

use super::extract::Extraction;
use super::prompts;
use super::{StageMetrics, complete_with_retries};

/// Decisions plus the metrics observed while making them
#[derive(Debug, Default)]
pub struct Resolution {
    pub entities: Vec<EntityDecision>,
    pub memories: Vec<MemoryDecision>,
    pub user_description: Option<String>,
    pub metrics: StageMetrics,
    pub repaired: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntityDecision {
    action: String,
    #[serde(default)]
    matched_entity_id: Option<String>,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMemoryDecision {
    action: String,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptionDecision {
    should_update: bool,
    #[serde(default)]
    description: Option<String>,
}

/// LLM-driven decision making against retrieved context
pub struct ResolutionStage {
    llm: Arc<dyn LlmClient>,
    consolidation: ConsolidationConfig,
    llm_config: LlmConfig,
}

impl ResolutionStage {
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

    /// Resolve an extraction against Branch A context.
    pub async fn resolve(
        &self,
        store: &dyn GraphStore,
        extraction: &Extraction,
        context: &[ScoredMemory],
        context_entities: &[Entity],
    ) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        for entity in &extraction.entities {
            let decision = self
                .resolve_entity(store, entity, context_entities, &mut resolution)
                .await?;
            resolution.entities.push(decision);
        }

        for memory in &extraction.memories {
            let decision = self.resolve_memory(memory, context, &mut resolution).await?;
            resolution.memories.push(decision);
        }

        if !extraction.user_facts.is_empty() {
            resolution.user_description = self
                .resolve_user_description(&extraction.user_facts, &mut resolution)
                .await?;
        }

        debug!(
            entities = resolution.entities.len(),
            memories = resolution.memories.len(),
            repaired = resolution.repaired,
            "resolution complete"
        );
        Ok(resolution)
    }

    async fn resolve_entity(
        &self,
        store: &dyn GraphStore,
        entity: &super::extract::ExtractedEntity,
        context_entities: &[Entity],
        resolution: &mut Resolution,
    ) -> Result<EntityDecision> {
        // Candidates: entities surfaced by Branch A plus a direct name lookup
        let mut candidates: Vec<Entity> = context_entities.to_vec();
        if let Some(direct) = store.get_entity_by_name(&entity.name).await?
            && !candidates.iter().any(|c| c.id == direct.id)
        {
            candidates.push(direct);
        }

        if candidates.is_empty() {
            // Nothing to match against; no LLM round trip needed
            return Ok(create_entity(entity, "no existing candidates"));
        }

        let prompt = prompts::entity_resolution_prompt(&entity.name, &entity.entity_type, &candidates);
        let schema = prompts::entity_resolution_schema();

        let raw: RawEntityDecision = complete_with_retries(
            self.llm.as_ref(),
            &prompt,
            &schema,
            &self.llm_config,
            self.consolidation.max_retries,
            &mut resolution.metrics,
            "entity_resolution",
        )
        .await?;

        if raw.action == "MATCH" {
            let matched = raw
                .matched_entity_id
                .as_deref()
                .and_then(|id| Uuid::parse_str(id).ok())
                .filter(|id| candidates.iter().any(|c| c.id == *id));

            match matched {
                Some(id) => {
                    return Ok(EntityDecision {
                        id,
                        name: entity.name.clone(),
                        entity_type: entity.entity_type.clone(),
                        action: EntityAction::Match,
                        matched_id: Some(id),
                        reason: raw.reason,
                        embedding: None,
                    });
                }
                None => {
                    warn!(name = %entity.name, "MATCH without a valid candidate id, repairing to CREATE");
                    resolution.repaired += 1;
                    return Ok(create_entity(entity, "repaired: match target missing"));
                }
            }
        }

        Ok(EntityDecision {
            reason: raw.reason,
            ..create_entity(entity, "")
        })
    }

    async fn resolve_memory(
        &self,
        memory: &super::extract::ExtractedMemory,
        context: &[ScoredMemory],
        resolution: &mut Resolution,
    ) -> Result<MemoryDecision> {
        if context.is_empty() {
            return Ok(add_memory(memory, "no existing memories"));
        }

        let prompt = prompts::memory_resolution_prompt(&memory.content, context);
        let schema = prompts::memory_resolution_schema();

        let raw: RawMemoryDecision = complete_with_retries(
            self.llm.as_ref(),
            &prompt,
            &schema,
            &self.llm_config,
            self.consolidation.max_retries,
            &mut resolution.metrics,
            "memory_resolution",
        )
        .await?;

        match raw.action.as_str() {
            "UPDATE" => {
                let target = raw
                    .target_id
                    .as_deref()
                    .and_then(|id| Uuid::parse_str(id).ok())
                    .filter(|id| context.iter().any(|sm| sm.memory.id == *id));

                match target {
                    Some(target_id) => Ok(MemoryDecision {
                        id: generate_id(),
                        content: memory.content.clone(),
                        action: MemoryAction::Update,
                        target_id: Some(target_id),
                        reason: raw.reason,
                        about: memory.about_entities.clone(),
                        embedding: None,
                        valid_at: memory.valid_at,
                    }),
                    None => {
                        warn!("UPDATE without a valid target id, repairing to ADD");
                        resolution.repaired += 1;
                        Ok(add_memory(memory, "repaired: update target missing"))
                    }
                }
            }
            "SKIP" => Ok(MemoryDecision {
                id: generate_id(),
                content: memory.content.clone(),
                action: MemoryAction::Skip,
                target_id: None,
                reason: raw.reason,
                about: memory.about_entities.clone(),
                embedding: None,
                valid_at: memory.valid_at,
            }),
            _ => Ok(MemoryDecision {
                reason: raw.reason,
                ..add_memory(memory, "")
            }),
        }
    }

    async fn resolve_user_description(
        &self,
        facts: &[String],
        resolution: &mut Resolution,
    ) -> Result<Option<String>> {
        let prompt = prompts::user_description_prompt(facts, None);
        let schema = prompts::user_description_schema();

        let raw: RawDescriptionDecision = complete_with_retries(
            self.llm.as_ref(),
            &prompt,
            &schema,
            &self.llm_config,
            self.consolidation.max_retries,
            &mut resolution.metrics,
            "user_description",
        )
        .await?;

        if raw.should_update {
            Ok(raw.description.filter(|d| !d.trim().is_empty()))
        } else {
            Ok(None)
        }
    }
}

fn create_entity(entity: &super::extract::ExtractedEntity, reason: &str) -> EntityDecision {
    EntityDecision {
        id: generate_id(),
        name: entity.name.clone(),
        entity_type: entity.entity_type.clone(),
        action: EntityAction::Create,
        matched_id: None,
        reason: reason.to_string(),
        embedding: None,
    }
}

fn add_memory(memory: &super::extract::ExtractedMemory, reason: &str) -> MemoryDecision {
    MemoryDecision {
        id: generate_id(),
        content: memory.content.clone(),
        action: MemoryAction::Add,
        target_id: None,
        reason: reason.to_string(),
        about: memory.about_entities.clone(),
        embedding: None,
        valid_at: memory.valid_at,
    }
}
