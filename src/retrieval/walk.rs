// src/retrieval/walk.rs
// Personalized random walk with restart over the entity-memory graph

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use uuid::Uuid;

use crate::config::WalkerConfig;
use crate::error::Result;
use crate::graph::GraphStore;

/// Deterministic PRNG seed derived from the query text, so identical queries
/// walk identically within a build.
pub fn seed_for_query(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Random walker producing memory visit fractions.
///
/// One walk of `steps` steps is launched per seed entity. At each step the
/// walker either teleports back to a seed sampled by the personalization
/// weights (probability `restart`) or follows a uniformly-chosen edge,
/// recording a visit on the traversed memory and moving to one of that
/// memory's other entities.
#[derive(Debug, Clone)]
pub struct GraphWalker {
    config: WalkerConfig,
}

impl GraphWalker {
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    /// Walk from weighted seed entities; returns `memory_id -> visit_fraction`.
    pub async fn walk(
        &self,
        store: &dyn GraphStore,
        seeds: &[(Uuid, f32)],
        rng_seed: u64,
    ) -> Result<HashMap<Uuid, f32>> {
        if seeds.is_empty() {
            return Ok(HashMap::new());
        }

        // Depth-1 adjacency around the seeds. Edge lists are sorted so walks
        // are reproducible for a fixed PRNG seed.
        let edge_lists = try_join_all(seeds.iter().map(|(id, _)| store.neighbors(*id))).await?;

        let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut memory_entities: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for edges in &edge_lists {
            for (entity_id, memory_id) in edges {
                adjacency.entry(*entity_id).or_default().push(*memory_id);
                memory_entities.entry(*memory_id).or_default().push(*entity_id);
            }
        }
        for memories in adjacency.values_mut() {
            memories.sort();
        }
        for entities in memory_entities.values_mut() {
            entities.sort();
        }

        let mut rng = StdRng::seed_from_u64(rng_seed);
        let mut visits: HashMap<Uuid, u32> = HashMap::new();
        let mut total: u64 = 0;

        for _ in 0..seeds.len() {
            let mut current = sample_seed(&mut rng, seeds);
            for _ in 0..self.config.steps {
                if rng.random::<f32>() < self.config.restart {
                    current = sample_seed(&mut rng, seeds);
                    continue;
                }

                let Some(memories) = adjacency.get(&current).filter(|m| !m.is_empty()) else {
                    // Dead end: restart
                    current = sample_seed(&mut rng, seeds);
                    continue;
                };

                let memory = memories[rng.random_range(0..memories.len())];
                *visits.entry(memory).or_insert(0) += 1;
                total += 1;

                if let Some(peers) = memory_entities.get(&memory).filter(|p| !p.is_empty()) {
                    current = peers[rng.random_range(0..peers.len())];
                }
            }
        }

        if total == 0 {
            return Ok(HashMap::new());
        }

        debug!(
            seeds = seeds.len(),
            memories = visits.len(),
            total_visits = total,
            "random walk complete"
        );

        Ok(visits
            .into_iter()
            .map(|(id, count)| (id, count as f32 / total as f32))
            .collect())
    }
}

/// Sample a seed entity according to the personalization weights.
fn sample_seed(rng: &mut StdRng, seeds: &[(Uuid, f32)]) -> Uuid {
    let roll: f32 = rng.random();
    let mut cumulative = 0.0;
    for (id, weight) in seeds {
        cumulative += weight;
        if roll < cumulative {
            return *id;
        }
    }
    // Rounding drift: fall back to the last seed
    seeds[seeds.len() - 1].0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        ConsolidationStats, EntityAction, EntityDecision, InMemoryGraphStore, MemoryAction,
        MemoryDecision, WritePlan,
    };
    use crate::utils::generate_id;

    async fn seeded_store() -> (InMemoryGraphStore, Uuid, Uuid) {
        let store = InMemoryGraphStore::new();
        let popular = EntityDecision {
            id: generate_id(),
            name: "Popular".to_string(),
            entity_type: "technology".to_string(),
            action: EntityAction::Create,
            matched_id: None,
            reason: "seed".to_string(),
            embedding: None,
        };
        let niche = EntityDecision {
            id: generate_id(),
            name: "Niche".to_string(),
            entity_type: "technology".to_string(),
            action: EntityAction::Create,
            matched_id: None,
            reason: "seed".to_string(),
            embedding: None,
        };
        let popular_id = popular.id;
        let niche_id = niche.id;

        let mut memories = Vec::new();
        for i in 0..4 {
            memories.push(MemoryDecision {
                id: generate_id(),
                content: format!("popular fact {i}"),
                action: MemoryAction::Add,
                target_id: None,
                reason: "seed".to_string(),
                about: vec!["Popular".to_string()],
                embedding: Some(vec![1.0, 0.0]),
                valid_at: None,
            });
        }
        memories.push(MemoryDecision {
            id: generate_id(),
            content: "niche fact".to_string(),
            action: MemoryAction::Add,
            target_id: None,
            reason: "seed".to_string(),
            about: vec!["Niche".to_string()],
            embedding: Some(vec![0.0, 1.0]),
            valid_at: None,
        });

        let plan = WritePlan {
            entities: vec![popular, niche],
            memories,
            user_description: None,
            stats: ConsolidationStats::default(),
        };
        store.apply(&plan).await.unwrap();
        (store, popular_id, niche_id)
    }

    #[tokio::test]
    async fn test_walk_is_deterministic_for_fixed_seed() {
        let (store, popular, niche) = seeded_store().await;
        let walker = GraphWalker::new(WalkerConfig::default());
        let seeds = vec![(popular, 0.7), (niche, 0.3)];

        let first = walker.walk(&store, &seeds, 42).await.unwrap();
        let second = walker.walk(&store, &seeds, 42).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_walk_favors_heavily_weighted_seed() {
        let (store, popular, niche) = seeded_store().await;
        let walker = GraphWalker::new(WalkerConfig {
            steps: 200,
            restart: 0.3,
        });
        let seeds = vec![(popular, 0.95), (niche, 0.05)];

        let visits = walker
            .walk(&store, &seeds, seed_for_query("query"))
            .await
            .unwrap();

        // Niche owns exactly one memory; everything else is popular's
        let niche_memories: Vec<Uuid> = store
            .neighbors(niche)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, m)| m)
            .collect();
        let popular_mass: f32 = visits
            .iter()
            .filter(|(id, _)| !niche_memories.contains(id))
            .map(|(_, f)| f)
            .sum();

        assert!(popular_mass > 0.5);
    }

    #[tokio::test]
    async fn test_walk_fractions_sum_to_one() {
        let (store, popular, niche) = seeded_store().await;
        let walker = GraphWalker::new(WalkerConfig::default());
        let seeds = vec![(popular, 0.5), (niche, 0.5)];

        let visits = walker.walk(&store, &seeds, 7).await.unwrap();
        if !visits.is_empty() {
            let total: f32 = visits.values().sum();
            assert!((total - 1.0).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn test_walk_empty_seeds() {
        let (store, _, _) = seeded_store().await;
        let walker = GraphWalker::new(WalkerConfig::default());
        let visits = walker.walk(&store, &[], 1).await.unwrap();
        assert!(visits.is_empty());
    }
}
