//! Token-budget-adaptive semantic retrieval over the knowledge graph.
//!
//! The result count K scales with the caller's token budget instead of being
//! fixed: `K = min(budget / avg_tokens_per_entity, hard_cap)`. Seed hits are
//! expanded one relationship hop at a time through strong edges, and any
//! failure in the semantic path falls back to importance-plus-recency
//! ordering rather than returning nothing.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::{LoreError, LoreResult};
use crate::traits::{Embedder, GraphStore};
use crate::types::{Entity, Relationship};

/// How the entity set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Nearest-neighbor search plus graph expansion.
    Semantic,
    /// Importance-plus-recency fallback after a semantic-path failure.
    FellBack,
}

/// Entities and their interconnecting relationships for one query.
#[derive(Debug, Clone)]
pub struct RetrievedKnowledge {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub outcome: RetrievalOutcome,
}

/// Retrieves query-relevant graph knowledge within a token budget.
pub struct SemanticRetriever {
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl SemanticRetriever {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            graph,
            embedder,
            config,
        }
    }

    /// Derive the adaptive result count from a token budget.
    pub fn result_count(&self, token_budget: usize) -> usize {
        (token_budget / self.config.avg_tokens_per_entity)
            .min(self.config.hard_cap)
            .max(1)
    }

    /// Retrieve entities relevant to `query`, sized to `token_budget`.
    ///
    /// Expansion-added entities follow the seed hits; within both groups the
    /// original ordering (distance, then traversal order) is kept.
    pub async fn retrieve(
        &self,
        story_id: &str,
        query: &str,
        token_budget: usize,
    ) -> LoreResult<RetrievedKnowledge> {
        let k = self.result_count(token_budget);

        let seeds = match self.semantic_seeds(story_id, query, k).await {
            Ok(seeds) if !seeds.is_empty() => seeds,
            Ok(_) => {
                tracing::debug!(story_id, "no semantic hits, using importance fallback");
                return self.fallback(story_id).await;
            }
            Err(LoreError::Cancelled) => return Err(LoreError::Cancelled),
            Err(e) => {
                tracing::warn!(story_id, error = %e, "semantic retrieval failed, using importance fallback");
                return self.fallback(story_id).await;
            }
        };

        // A backend failure past the seed stage degrades the same way.
        match self.expand_and_connect(seeds).await {
            Ok(knowledge) => {
                tracing::debug!(
                    story_id,
                    k,
                    entities = knowledge.entities.len(),
                    relationships = knowledge.relationships.len(),
                    "semantic retrieval complete"
                );
                Ok(knowledge)
            }
            Err(LoreError::Cancelled) => Err(LoreError::Cancelled),
            Err(e) => {
                tracing::warn!(story_id, error = %e, "graph expansion failed, using importance fallback");
                self.fallback(story_id).await
            }
        }
    }

    async fn expand_and_connect(&self, seeds: Vec<Entity>) -> LoreResult<RetrievedKnowledge> {
        let seed_ids: Vec<String> = seeds.iter().map(|e| e.id.clone()).collect();
        let expanded_ids = self
            .graph
            .expand_relationships(
                &seed_ids,
                self.config.expansion_min_strength,
                self.config.max_expansion,
            )
            .await?;

        let mut entities = seeds;
        let mut seen: HashSet<String> = entities.iter().map(|e| e.id.clone()).collect();
        for entity in self.graph.entities_by_ids(&expanded_ids).await? {
            if seen.insert(entity.id.clone()) {
                entities.push(entity);
            }
        }

        let all_ids: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
        let relationships = self.graph.relationships_among(&all_ids).await?;

        Ok(RetrievedKnowledge {
            entities,
            relationships,
            outcome: RetrievalOutcome::Semantic,
        })
    }

    async fn semantic_seeds(
        &self,
        story_id: &str,
        query: &str,
        k: usize,
    ) -> LoreResult<Vec<Entity>> {
        let query_embedding = self.embedder.embed(query).await?;
        let hits = self
            .graph
            .search_similar(story_id, &query_embedding, k)
            .await?;
        Ok(hits.into_iter().map(|h| h.entity).collect())
    }

    async fn fallback(&self, story_id: &str) -> LoreResult<RetrievedKnowledge> {
        let entities = self
            .graph
            .top_entities(story_id, self.config.fallback_top_n)
            .await?;
        let ids: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
        let relationships = self.graph.relationships_among(&ids).await?;
        Ok(RetrievedKnowledge {
            entities,
            relationships,
            outcome: RetrievalOutcome::FellBack,
        })
    }

    /// Render retrieved knowledge as prompt text.
    ///
    /// Entities render as "Name (type): description"; only relationships at
    /// or above the render strength threshold appear, phrased directionally
    /// ("Klaus is-enemy-of Anna").
    pub fn format_knowledge(&self, knowledge: &RetrievedKnowledge) -> String {
        let mut out = String::new();

        if !knowledge.entities.is_empty() {
            out.push_str("KNOWN WORLD:\n");
            for entity in &knowledge.entities {
                out.push_str(&format!(
                    "- {} ({}): {}",
                    entity.name, entity.entity_type, entity.description
                ));
                if !entity.attributes.is_empty() {
                    let attrs: Vec<String> = entity
                        .attributes
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect();
                    out.push_str(&format!(" [{}]", attrs.join(", ")));
                }
                out.push('\n');
            }
        }

        let strong: Vec<&Relationship> = knowledge
            .relationships
            .iter()
            .filter(|r| r.strength >= self.config.render_min_strength)
            .collect();
        if !strong.is_empty() {
            let names: std::collections::HashMap<&str, &str> = knowledge
                .entities
                .iter()
                .map(|e| (e.id.as_str(), e.name.as_str()))
                .collect();
            out.push_str("\nRELATIONSHIPS:\n");
            for rel in strong {
                let from = names.get(rel.from_entity_id.as_str()).copied();
                let to = names.get(rel.to_entity_id.as_str()).copied();
                if let (Some(from), Some(to)) = (from, to) {
                    out.push_str(&format!(
                        "- {} {} {} ({})\n",
                        from,
                        rel.rel_type.phrase(),
                        to,
                        rel.description
                    ));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::traits::SimilarEntity;
    use crate::types::{
        ChangeActor, EntityType, EntityVersion, NewRelationship, RelationshipType, UpsertOutcome,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct MockEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, _text: &str) -> LoreResult<Vec<f32>> {
            if self.fail {
                Err(LoreError::embedding("down"))
            } else {
                Ok(vec![0.1, 0.2, 0.3])
            }
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    /// GraphStore stub returning scripted entity sets.
    #[derive(Default)]
    struct MockGraph {
        similar: Vec<SimilarEntity>,
        expanded: Vec<Entity>,
        top: Vec<Entity>,
        relationships: Vec<Relationship>,
        expand_calls: Mutex<Vec<(Vec<String>, u8, usize)>>,
        fail_expand: bool,
    }

    #[async_trait]
    impl GraphStore for MockGraph {
        async fn create_entity(&self, _: &Entity, _: &EntityVersion) -> LoreResult<()> {
            Ok(())
        }
        async fn save_entity(&self, _: &Entity, _: Option<&EntityVersion>) -> LoreResult<()> {
            Ok(())
        }
        async fn get_entity(&self, _: &str) -> LoreResult<Option<Entity>> {
            Ok(None)
        }
        async fn active_entities(&self, _: &str) -> LoreResult<Vec<Entity>> {
            Ok(Vec::new())
        }
        async fn entities_by_ids(&self, ids: &[String]) -> LoreResult<Vec<Entity>> {
            Ok(self
                .expanded
                .iter()
                .filter(|e| ids.contains(&e.id))
                .cloned()
                .collect())
        }
        async fn top_entities(&self, _: &str, limit: usize) -> LoreResult<Vec<Entity>> {
            Ok(self.top.iter().take(limit).cloned().collect())
        }
        async fn upsert_relationship(&self, _: &NewRelationship) -> LoreResult<UpsertOutcome> {
            Ok(UpsertOutcome::Created)
        }
        async fn relationships_among(&self, ids: &[String]) -> LoreResult<Vec<Relationship>> {
            Ok(self
                .relationships
                .iter()
                .filter(|r| ids.contains(&r.from_entity_id) && ids.contains(&r.to_entity_id))
                .cloned()
                .collect())
        }
        async fn merge_entities(&self, _: &str, _: &str, _: &[String]) -> LoreResult<()> {
            Ok(())
        }
        async fn archive_entity(&self, _: &str) -> LoreResult<()> {
            Ok(())
        }
        async fn expand_relationships(
            &self,
            seed_ids: &[String],
            min_strength: u8,
            max_expansion: usize,
        ) -> LoreResult<Vec<String>> {
            self.expand_calls.lock().unwrap().push((
                seed_ids.to_vec(),
                min_strength,
                max_expansion,
            ));
            if self.fail_expand {
                return Err(LoreError::database("edge table unavailable"));
            }
            Ok(self.expanded.iter().map(|e| e.id.clone()).collect())
        }
        async fn search_similar(
            &self,
            _: &str,
            _: &[f32],
            k: usize,
        ) -> LoreResult<Vec<SimilarEntity>> {
            Ok(self.similar.iter().take(k).cloned().collect())
        }
        async fn entity_versions(&self, _: &str) -> LoreResult<Vec<EntityVersion>> {
            Ok(Vec::new())
        }
    }

    fn entity(name: &str) -> Entity {
        Entity::new("story-1", EntityType::Character, name, "desc")
    }

    fn relationship(from: &Entity, to: &Entity, strength: u8) -> Relationship {
        Relationship {
            id: uuid::Uuid::new_v4().to_string(),
            story_id: "story-1".into(),
            from_entity_id: from.id.clone(),
            to_entity_id: to.id.clone(),
            rel_type: RelationshipType::Enemy,
            description: "hates".into(),
            strength,
            created_by: ChangeActor::Ai,
            source_message_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn retriever(graph: MockGraph, fail_embed: bool) -> SemanticRetriever {
        SemanticRetriever::new(
            Arc::new(graph),
            Arc::new(MockEmbedder { fail: fail_embed }),
            RetrievalConfig::default(),
        )
    }

    #[test]
    fn test_result_count_scales_with_budget() {
        let r = retriever(MockGraph::default(), false);
        assert_eq!(r.result_count(3000), 50);
        assert_eq!(r.result_count(600), 10);
        // Hard cap
        assert_eq!(r.result_count(100_000), 100);
        // Tiny budgets still ask for one entity
        assert_eq!(r.result_count(10), 1);
    }

    #[tokio::test]
    async fn test_retrieve_merges_seeds_and_expansion() {
        let klaus = entity("Klaus");
        let anna = entity("Anna");
        let citadel = entity("Citadel");
        let graph = MockGraph {
            similar: vec![
                SimilarEntity {
                    entity: klaus.clone(),
                    distance: 0.1,
                },
                SimilarEntity {
                    entity: anna.clone(),
                    distance: 0.2,
                },
            ],
            // Expansion returns one seed again plus one new entity
            expanded: vec![anna.clone(), citadel.clone()],
            relationships: vec![relationship(&klaus, &anna, 9)],
            ..Default::default()
        };
        let r = retriever(graph, false);

        let knowledge = r.retrieve("story-1", "the general", 3000).await.unwrap();
        assert_eq!(knowledge.outcome, RetrievalOutcome::Semantic);
        // Seeds first, expansion deduplicated
        let names: Vec<&str> = knowledge.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Klaus", "Anna", "Citadel"]);
        assert_eq!(knowledge.relationships.len(), 1);
    }

    #[tokio::test]
    async fn test_expansion_uses_configured_gates() {
        let klaus = entity("Klaus");
        let graph = MockGraph {
            similar: vec![SimilarEntity {
                entity: klaus,
                distance: 0.1,
            }],
            ..Default::default()
        };
        let store = Arc::new(graph);
        let r = SemanticRetriever::new(
            store.clone(),
            Arc::new(MockEmbedder { fail: false }),
            RetrievalConfig::default(),
        );

        r.retrieve("story-1", "query", 3000).await.unwrap();
        let calls = store.expand_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 7);
        assert_eq!(calls[0].2, 20);
    }

    #[tokio::test]
    async fn test_embed_failure_falls_back() {
        let graph = MockGraph {
            top: vec![entity("Klaus"), entity("Anna")],
            ..Default::default()
        };
        let r = retriever(graph, true);

        let knowledge = r.retrieve("story-1", "query", 3000).await.unwrap();
        assert_eq!(knowledge.outcome, RetrievalOutcome::FellBack);
        assert_eq!(knowledge.entities.len(), 2);
    }

    #[tokio::test]
    async fn test_expansion_failure_falls_back() {
        // Seeds resolve fine but the expansion hop hits a store error; the
        // caller still gets the importance-ordered fallback set.
        let graph = MockGraph {
            similar: vec![SimilarEntity {
                entity: entity("Klaus"),
                distance: 0.1,
            }],
            top: vec![entity("Klaus"), entity("Anna")],
            fail_expand: true,
            ..Default::default()
        };
        let r = retriever(graph, false);

        let knowledge = r.retrieve("story-1", "query", 3000).await.unwrap();
        assert_eq!(knowledge.outcome, RetrievalOutcome::FellBack);
        assert_eq!(knowledge.entities.len(), 2);
    }

    #[tokio::test]
    async fn test_no_hits_falls_back() {
        let graph = MockGraph {
            top: vec![entity("Klaus")],
            ..Default::default()
        };
        let r = retriever(graph, false);

        let knowledge = r.retrieve("story-1", "query", 3000).await.unwrap();
        assert_eq!(knowledge.outcome, RetrievalOutcome::FellBack);
        assert_eq!(knowledge.entities.len(), 1);
    }

    #[tokio::test]
    async fn test_format_knowledge_strength_threshold() {
        let klaus = entity("Klaus");
        let anna = entity("Anna");
        let weak_target = entity("Innkeeper");

        let knowledge = RetrievedKnowledge {
            relationships: vec![
                relationship(&klaus, &anna, 9),
                relationship(&klaus, &weak_target, 3),
            ],
            entities: vec![klaus, anna, weak_target],
            outcome: RetrievalOutcome::Semantic,
        };
        let r = retriever(MockGraph::default(), false);

        let text = r.format_knowledge(&knowledge);
        assert!(text.contains("Klaus is-enemy-of Anna"));
        assert!(!text.contains("Innkeeper is-enemy-of"));
        assert!(!text.contains("Klaus is-enemy-of Innkeeper"));
        assert!(text.contains("Klaus (character): desc"));
    }
}
