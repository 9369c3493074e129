// src/retrieval/weights.rs
// Multi-signal entity weighting for walk personalization

use std::collections::HashMap;

use crate::config::WeighterConfig;
use crate::graph::{Entity, ScoredMemory};
use crate::vecmath::{cosine, normalize_to_unit_range};

/// Weight candidate entities against a query.
///
/// Three signals per entity:
/// - semantic: cosine of the entity embedding against the query (0 without
///   an embedding)
/// - memory: sum of `seed.score * cosine(seed, query)` over seed memories
///   referencing the entity, min-max normalized across entities
/// - structural: `log(1+degree) / log(1+max_degree)`; log dampening keeps
///   hub entities from dominating (a 1000x degree ratio compresses to ~4x)
///
/// Returns `name -> weight`; empty input yields an empty map.
pub fn entity_weights(
    entities: &[Entity],
    seeds: &[ScoredMemory],
    query_embedding: &[f32],
    config: &WeighterConfig,
) -> HashMap<String, f32> {
    if entities.is_empty() {
        return HashMap::new();
    }

    let max_degree = entities.iter().map(|e| e.degree).max().unwrap_or(0);

    let mem_raw: Vec<f32> = entities
        .iter()
        .map(|entity| {
            seeds
                .iter()
                .filter(|seed| {
                    seed.memory.about.contains(&entity.id)
                        || seed.about_names.iter().any(|n| n == &entity.name)
                })
                .map(|seed| seed.score * cosine(&seed.memory.embedding, query_embedding))
                .sum()
        })
        .collect();
    let mem_norm = normalize_to_unit_range(&mem_raw);

    let mut weights = HashMap::with_capacity(entities.len());
    for (i, entity) in entities.iter().enumerate() {
        let semantic = entity
            .embedding
            .as_ref()
            .map(|emb| cosine(emb, query_embedding))
            .unwrap_or(0.0);

        let structural = if max_degree == 0 {
            0.0
        } else {
            (1.0 + entity.degree as f32).ln() / (1.0 + max_degree as f32).ln()
        };

        let weight = config.alpha_semantic * semantic
            + config.alpha_memory * mem_norm[i]
            + config.alpha_structural * structural;

        // Negative similarity contributes nothing to the restart vector
        weights.insert(entity.name.clone(), weight.max(0.0));
    }
    weights
}

/// Scale weights to sum to 1, preserving ratios. A non-positive total
/// yields an empty map.
pub fn normalize_weights(weights: &HashMap<String, f32>) -> HashMap<String, f32> {
    let total: f32 = weights.values().sum();
    if total <= 0.0 {
        return HashMap::new();
    }
    weights
        .iter()
        .map(|(name, w)| (name.clone(), w / total))
        .collect()
}
