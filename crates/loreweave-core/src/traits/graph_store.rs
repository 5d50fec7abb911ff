//! Graph store trait: persistence primitives for the knowledge graph.
//!
//! The store owns transactional guarantees (per-entity writes, atomic merge
//! repointing, strength-max upserts). Embedding generation and change
//! comparison live above it in the engine's graph adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LoreResult;
use crate::types::{Entity, EntityVersion, NewRelationship, Relationship, UpsertOutcome};

/// Nearest-neighbor hit with its cosine distance.
#[derive(Debug, Clone)]
pub struct SimilarEntity {
    pub entity: Entity,
    /// Cosine distance, ascending = closer.
    pub distance: f32,
}

/// Core GraphStore trait - all knowledge-graph backends implement this.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Persist a new entity together with its CREATED version row, atomically.
    async fn create_entity(&self, entity: &Entity, version: &EntityVersion) -> LoreResult<()>;

    /// Persist a full entity update, appending a version row when one is
    /// given, atomically.
    async fn save_entity(
        &self,
        entity: &Entity,
        version: Option<&EntityVersion>,
    ) -> LoreResult<()>;

    /// Fetch one entity by id.
    async fn get_entity(&self, id: &str) -> LoreResult<Option<Entity>>;

    /// All ACTIVE entities in a story, most recently updated first.
    async fn active_entities(&self, story_id: &str) -> LoreResult<Vec<Entity>>;

    /// Fetch entities by id, preserving only those that exist.
    async fn entities_by_ids(&self, ids: &[String]) -> LoreResult<Vec<Entity>>;

    /// Top-N ACTIVE entities ordered by importance then recency.
    async fn top_entities(&self, story_id: &str, limit: usize) -> LoreResult<Vec<Entity>>;

    /// Create-on-absence; on presence refresh the description and raise
    /// strength to at least the new value, never lower it.
    async fn upsert_relationship(&self, rel: &NewRelationship) -> LoreResult<UpsertOutcome>;

    /// All relationships whose endpoints are both within the given id set.
    async fn relationships_among(&self, ids: &[String]) -> LoreResult<Vec<Relationship>>;

    /// Merge duplicates into a canonical entity: union aliases (excluding the
    /// canonical name), merge attributes (later duplicates overwrite), repoint
    /// every edge referencing a duplicate, and mark duplicates MERGED. The
    /// repoint and status flip are atomic per duplicate group.
    async fn merge_entities(
        &self,
        story_id: &str,
        canonical_id: &str,
        duplicate_ids: &[String],
    ) -> LoreResult<()>;

    /// Transition an entity to ARCHIVED (relevance curation).
    async fn archive_entity(&self, id: &str) -> LoreResult<()>;

    /// Breadth-first traversal from the seed entities, both directions,
    /// admitting only edges with strength >= `min_strength`, until
    /// `max_expansion` ids are collected or the frontier is exhausted.
    /// Seeds are not included in the returned set.
    async fn expand_relationships(
        &self,
        seed_ids: &[String],
        min_strength: u8,
        max_expansion: usize,
    ) -> LoreResult<Vec<String>>;

    /// Nearest-neighbor search over ACTIVE entities with non-null embeddings,
    /// ascending cosine distance, limited to `k`.
    async fn search_similar(
        &self,
        story_id: &str,
        query: &[f32],
        k: usize,
    ) -> LoreResult<Vec<SimilarEntity>>;

    /// Append-only version history for an entity, oldest first.
    async fn entity_versions(&self, entity_id: &str) -> LoreResult<Vec<EntityVersion>>;
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Database path; ":memory:" or empty for an in-memory store.
    pub path: String,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
        }
    }
}
