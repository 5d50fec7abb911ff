//! Knowledge-graph adapter: turns extraction results into graph writes.
//!
//! Sits between the extractor and the store. Owns resolution, change
//! comparison, embedding-before-persist, and version snapshots; the store
//! underneath owns transactional guarantees. One failed entity never aborts
//! the rest of the batch.

use std::sync::Arc;

use crate::error::{LoreError, LoreResult};
use crate::extraction::{ExtractedEntity, ExtractedRelationship, ExtractionResult};
use crate::resolver::Resolver;
use crate::traits::{Embedder, GraphStore};
use crate::types::{
    merge_attributes, ChangeActor, ChangeType, Entity, EntityVersion, NewRelationship,
    UpsertOutcome,
};

/// Counters for one persisted extraction batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub entities_created: usize,
    pub entities_updated: usize,
    /// Resolved mentions that carried nothing new (or only aliases).
    pub entities_skipped: usize,
    pub entities_failed: usize,
    pub relationships_created: usize,
    pub relationships_updated: usize,
    /// Relationships dropped because an endpoint did not resolve.
    pub relationships_skipped: usize,
}

enum EntityOutcome {
    Created(Entity),
    Updated(Entity),
    Skipped(Entity),
}

/// Applies extraction results to the graph store.
pub struct KnowledgeGraph {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    resolver: Resolver,
}

impl KnowledgeGraph {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>, resolver: Resolver) -> Self {
        Self {
            store,
            embedder,
            resolver,
        }
    }

    /// Persist one extraction batch: entities first (so relationships can
    /// reference mentions created in the same batch), then relationships.
    ///
    /// `known` is the story's ACTIVE entity set as of the extraction call.
    pub async fn persist(
        &self,
        story_id: &str,
        result: &ExtractionResult,
        known: &[Entity],
        source_message_id: Option<i64>,
    ) -> LoreResult<PersistStats> {
        let mut stats = PersistStats::default();
        // Working set grows as the batch creates entities.
        let mut working: Vec<Entity> = known.to_vec();

        for extracted in &result.entities {
            match self
                .persist_entity(story_id, extracted, &working, source_message_id)
                .await
            {
                Ok(EntityOutcome::Created(entity)) => {
                    stats.entities_created += 1;
                    working.push(entity);
                }
                Ok(EntityOutcome::Updated(entity)) => {
                    stats.entities_updated += 1;
                    replace_in(&mut working, entity);
                }
                Ok(EntityOutcome::Skipped(entity)) => {
                    stats.entities_skipped += 1;
                    replace_in(&mut working, entity);
                }
                Err(LoreError::Cancelled) => return Err(LoreError::Cancelled),
                Err(e) => {
                    stats.entities_failed += 1;
                    tracing::warn!(name = %extracted.name, error = %e, "failed to persist entity, continuing batch");
                }
            }
        }

        for rel in &result.relationships {
            match self
                .persist_relationship(story_id, rel, &working, source_message_id)
                .await
            {
                Ok(Some(UpsertOutcome::Created)) => stats.relationships_created += 1,
                Ok(Some(UpsertOutcome::Updated)) => stats.relationships_updated += 1,
                Ok(None) => stats.relationships_skipped += 1,
                Err(LoreError::Cancelled) => return Err(LoreError::Cancelled),
                Err(e) => {
                    stats.relationships_skipped += 1;
                    tracing::warn!(from = %rel.from, to = %rel.to, error = %e, "failed to persist relationship");
                }
            }
        }

        tracing::info!(
            story_id,
            created = stats.entities_created,
            updated = stats.entities_updated,
            skipped = stats.entities_skipped,
            failed = stats.entities_failed,
            relationships = stats.relationships_created + stats.relationships_updated,
            "extraction batch persisted"
        );
        Ok(stats)
    }

    async fn persist_entity(
        &self,
        story_id: &str,
        extracted: &ExtractedEntity,
        working: &[Entity],
        source_message_id: Option<i64>,
    ) -> LoreResult<EntityOutcome> {
        match self
            .resolver
            .resolve(&extracted.name, extracted.entity_type, working)
        {
            Some(existing) => {
                self.update_entity(existing.clone(), extracted, source_message_id)
                    .await
            }
            None => {
                self.create_entity(story_id, extracted, source_message_id)
                    .await
            }
        }
    }

    async fn create_entity(
        &self,
        story_id: &str,
        extracted: &ExtractedEntity,
        source_message_id: Option<i64>,
    ) -> LoreResult<EntityOutcome> {
        let mut entity = Entity::new(
            story_id,
            extracted.entity_type,
            &extracted.name,
            &extracted.description,
        )
        .with_importance(extracted.importance)
        .with_aliases(extracted.aliases.clone());
        entity.attributes = extracted.attributes.clone();
        entity.embedding = self.embed_description(&entity).await;

        let version = EntityVersion::snapshot(
            &entity,
            ChangeType::Created,
            "extracted",
            ChangeActor::Ai,
            source_message_id,
        );
        self.store.create_entity(&entity, &version).await?;
        tracing::debug!(name = %entity.name, entity_type = %entity.entity_type, "entity created");
        Ok(EntityOutcome::Created(entity))
    }

    async fn update_entity(
        &self,
        mut entity: Entity,
        extracted: &ExtractedEntity,
        source_message_id: Option<i64>,
    ) -> LoreResult<EntityOutcome> {
        let mut substantive = false;

        if !extracted.description.is_empty() && extracted.description != entity.description {
            entity.description = extracted.description.clone();
            entity.embedding = self.embed_description(&entity).await;
            substantive = true;
        }

        let merged = merge_attributes(&entity.attributes, &extracted.attributes);
        if merged != entity.attributes {
            entity.attributes = merged;
            substantive = true;
        }

        if extracted.importance > entity.importance {
            entity.importance = extracted.importance.clamp(1, 10);
            substantive = true;
        }

        // A mention under a different surface form becomes an alias.
        let mut alias_added = entity.add_alias(&extracted.name);
        for alias in &extracted.aliases {
            alias_added |= entity.add_alias(alias);
        }

        if substantive {
            entity.updated_at = chrono::Utc::now();
            let version = EntityVersion::snapshot(
                &entity,
                ChangeType::Updated,
                "re-extracted",
                ChangeActor::Ai,
                source_message_id,
            );
            self.store.save_entity(&entity, Some(&version)).await?;
            tracing::debug!(name = %entity.name, "entity updated");
            Ok(EntityOutcome::Updated(entity))
        } else if alias_added {
            // Alias-only changes are not version-worthy.
            entity.updated_at = chrono::Utc::now();
            self.store.save_entity(&entity, None).await?;
            Ok(EntityOutcome::Skipped(entity))
        } else {
            Ok(EntityOutcome::Skipped(entity))
        }
    }

    async fn persist_relationship(
        &self,
        story_id: &str,
        rel: &ExtractedRelationship,
        working: &[Entity],
        source_message_id: Option<i64>,
    ) -> LoreResult<Option<UpsertOutcome>> {
        let Some(from) = resolve_endpoint(&rel.from, working) else {
            tracing::debug!(name = %rel.from, "relationship endpoint not resolved, skipping");
            return Ok(None);
        };
        let Some(to) = resolve_endpoint(&rel.to, working) else {
            tracing::debug!(name = %rel.to, "relationship endpoint not resolved, skipping");
            return Ok(None);
        };
        if from.id == to.id {
            return Ok(None);
        }

        let mut new_rel = NewRelationship::new(
            story_id,
            &from.id,
            &to.id,
            rel.rel_type,
            &rel.description,
            rel.strength,
        );
        if let Some(id) = source_message_id {
            new_rel = new_rel.with_source_message(id);
        }
        self.store.upsert_relationship(&new_rel).await.map(Some)
    }

    /// Embed an entity's description. Embedding failure leaves the entity
    /// without a vector (it falls out of semantic search until re-embedded)
    /// but never blocks the write.
    async fn embed_description(&self, entity: &Entity) -> Option<Vec<f32>> {
        if entity.description.trim().is_empty() {
            return None;
        }
        let text = format!("{}: {}", entity.name, entity.description);
        match self.embedder.embed(&text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                tracing::warn!(name = %entity.name, error = %e, "embedding failed, persisting without vector");
                None
            }
        }
    }
}

/// Relationship endpoints resolve by exact name or alias match against the
/// working set, any entity type.
fn resolve_endpoint<'a>(name: &str, working: &'a [Entity]) -> Option<&'a Entity> {
    working.iter().find(|e| e.answers_to(name))
}

fn replace_in(working: &mut [Entity], entity: Entity) {
    if let Some(slot) = working.iter_mut().find(|e| e.id == entity.id) {
        *slot = entity;
    }
}
