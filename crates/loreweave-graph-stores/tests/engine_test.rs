//! End-to-end engine flows against the embedded SQLite stores.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use loreweave_core::config::{DedupConfig, EngineConfig};
use loreweave_core::engine::Engine;
use loreweave_core::error::LoreResult;
use loreweave_core::retrieval::RetrievalOutcome;
use loreweave_core::traits::{
    Embedder, GenerationOptions, GraphStore, Llm, LlmResponse, MessageStore,
};
use loreweave_core::types::{
    ChangeActor, ChangeType, Command, ConversationRole, Entity, EntityStatus, EntityType,
    EntityVersion, Message, MessageCategory,
};
use loreweave_graph_stores::{EmbeddedGraphStore, EmbeddedMessageStore};

struct ScriptedLlm {
    responses: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn generate(
        &self,
        _: &[Message],
        _: Option<GenerationOptions>,
    ) -> LoreResult<LlmResponse> {
        let mut responses = self.responses.lock().unwrap();
        let content = if responses.is_empty() {
            r#"{"entities": [], "relationships": []}"#.to_string()
        } else {
            responses.remove(0)
        };
        Ok(LlmResponse {
            content: Some(content),
            usage: None,
        })
    }
    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Deterministic two-dimensional embedder keyed on character names, so
/// nearest-neighbor search prefers the entity the query mentions.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        let text = text.to_lowercase();
        let klaus = if text.contains("klaus") { 1.0 } else { 0.0 };
        let anna = if text.contains("anna") { 1.0 } else { 0.0 };
        Ok(vec![klaus + 0.1, anna + 0.1])
    }
    fn dimension(&self) -> usize {
        2
    }
    fn model_name(&self) -> &str {
        "keyword"
    }
}

struct Stores {
    graph: Arc<EmbeddedGraphStore>,
    messages: Arc<EmbeddedMessageStore>,
}

fn engine(llm: ScriptedLlm) -> (Engine, Stores) {
    let graph = Arc::new(EmbeddedGraphStore::in_memory().unwrap());
    let messages = Arc::new(EmbeddedMessageStore::in_memory().unwrap());
    let config = EngineConfig {
        dedup: DedupConfig {
            call_delay_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = Engine::new(
        Arc::new(llm),
        Arc::new(KeywordEmbedder),
        graph.clone(),
        messages.clone(),
        config,
    );
    (
        engine,
        Stores {
            graph,
            messages,
        },
    )
}

const EXTRACTION_V1: &str = r#"{"entities": [
    {"name": "Klaus", "type": "character", "description": "a general", "importance": 8, "isNew": true},
    {"name": "Anna", "type": "character", "description": "a spy", "importance": 7, "isNew": true}
], "relationships": [
    {"from": "Klaus", "to": "Anna", "type": "enemy", "description": "hates her", "strength": 8}
]}"#;

const EXTRACTION_V2: &str = r#"{"entities": [
    {"name": "Klaus", "type": "character", "description": "a disgraced general", "importance": 8, "isNew": false},
    {"name": "Anna", "type": "character", "description": "a spy", "importance": 7, "isNew": false}
], "relationships": [
    {"from": "Klaus", "to": "Anna", "type": "enemy", "description": "still hates her", "strength": 3}
]}"#;

#[tokio::test]
async fn test_extraction_persists_graph_with_history() {
    let (engine, stores) = engine(ScriptedLlm::new(vec![EXTRACTION_V1]));
    let cancel = CancellationToken::new();

    let id = stores
        .messages
        .append(
            "c1",
            ConversationRole::User,
            "Klaus, o general, odeia Anna.",
            MessageCategory::Dialogue,
            false,
        )
        .unwrap();

    let stats = engine
        .extract_and_persist("story-1", "Klaus, o general, odeia Anna.", "", Some(id), &cancel)
        .await
        .unwrap();
    assert_eq!(stats.entities_created, 2);
    assert_eq!(stats.relationships_created, 1);

    let active = stores.graph.active_entities("story-1").await.unwrap();
    assert_eq!(active.len(), 2);
    let klaus = active.iter().find(|e| e.name == "Klaus").unwrap();
    assert_eq!(klaus.importance, 8);
    assert!(klaus.embedding.is_some());

    let versions = stores.graph.entity_versions(&klaus.id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].change_type, ChangeType::Created);
    assert_eq!(versions[0].source_message_id, Some(id));

    let ids: Vec<String> = active.iter().map(|e| e.id.clone()).collect();
    let rels = stores.graph.relationships_among(&ids).await.unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].strength, 8);
    assert_eq!(rels[0].source_message_id, Some(id));
}

#[tokio::test]
async fn test_reextraction_updates_and_keeps_strength() {
    let (engine, stores) = engine(ScriptedLlm::new(vec![EXTRACTION_V1, EXTRACTION_V2]));
    let cancel = CancellationToken::new();

    engine
        .extract_and_persist("story-1", "Klaus odeia Anna.", "", None, &cancel)
        .await
        .unwrap();
    let stats = engine
        .extract_and_persist("story-1", "Klaus, desonrado, ainda odeia Anna.", "", None, &cancel)
        .await
        .unwrap();

    // Resolution finds the existing entities; nothing is duplicated.
    assert_eq!(stats.entities_created, 0);
    assert_eq!(stats.entities_updated, 1);

    let active = stores.graph.active_entities("story-1").await.unwrap();
    assert_eq!(active.len(), 2);
    let klaus = active.iter().find(|e| e.name == "Klaus").unwrap();
    assert_eq!(klaus.description, "a disgraced general");

    // Description change appended a version.
    let versions = stores.graph.entity_versions(&klaus.id).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].change_type, ChangeType::Updated);

    // Weaker re-statement refreshed the description but not the strength.
    let ids: Vec<String> = active.iter().map(|e| e.id.clone()).collect();
    let rels = stores.graph.relationships_among(&ids).await.unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].strength, 8);
    assert_eq!(rels[0].description, "still hates her");
}

#[tokio::test]
async fn test_assemble_context_semantic_knowledge() {
    let (engine, stores) = engine(ScriptedLlm::new(vec![EXTRACTION_V1]));
    let cancel = CancellationToken::new();

    engine
        .extract_and_persist("story-1", "Klaus odeia Anna.", "", None, &cancel)
        .await
        .unwrap();
    for i in 0..4 {
        let role = if i % 2 == 0 {
            ConversationRole::User
        } else {
            ConversationRole::Model
        };
        stores
            .messages
            .append("c1", role, &format!("turn {}", i), MessageCategory::Dialogue, false)
            .unwrap();
    }

    let context = engine
        .assemble_context("c1", "story-1", "what happens next for Klaus?", 3000, &cancel)
        .await
        .unwrap();

    assert_eq!(context.command, Command::NextBeat);
    assert_eq!(context.retrieval, RetrievalOutcome::Semantic);
    assert_eq!(context.entries.len(), 4);
    assert!(context.knowledge.contains("Klaus"));
    assert!(context.knowledge.contains("is-enemy-of"));
    assert!(context.estimated_tokens > 0);
}

#[tokio::test]
async fn test_deduplicate_merges_and_archives_in_store() {
    let (engine, stores) = engine(ScriptedLlm::new(vec![
        r#"{"groups": [{"canonical": "Klaus", "duplicates": ["The General"]}]}"#,
        r#"{"irrelevant": ["the innkeeper", "Klaus"]}"#,
    ]));
    let cancel = CancellationToken::new();

    let mut ids = Vec::new();
    for (name, importance) in [("Klaus", 8u8), ("The General", 4), ("the innkeeper", 2)] {
        let entity = Entity::new("story-1", EntityType::Character, name, "somebody")
            .with_importance(importance);
        let version =
            EntityVersion::snapshot(&entity, ChangeType::Created, "seed", ChangeActor::Ai, None);
        stores.graph.create_entity(&entity, &version).await.unwrap();
        ids.push(entity.id);
    }

    let report = engine.deduplicate("story-1", &cancel).await.unwrap();
    assert_eq!(report.groups_merged, 1);
    assert_eq!(report.entities_merged, 1);
    // Klaus was flagged irrelevant too, but sits above the importance cap.
    assert_eq!(report.entities_archived, 1);

    let klaus = stores.graph.get_entity(&ids[0]).await.unwrap().unwrap();
    assert_eq!(klaus.status, EntityStatus::Active);
    assert_eq!(klaus.aliases, vec!["The General"]);

    let general = stores.graph.get_entity(&ids[1]).await.unwrap().unwrap();
    assert_eq!(general.status, EntityStatus::Merged);
    assert_eq!(general.merged_into.as_deref(), Some(ids[0].as_str()));

    let innkeeper = stores.graph.get_entity(&ids[2]).await.unwrap().unwrap();
    assert_eq!(innkeeper.status, EntityStatus::Archived);
}

#[tokio::test]
async fn test_graph_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lore.db");

    {
        let store = EmbeddedGraphStore::new(&path).unwrap();
        let entity = Entity::new("story-1", EntityType::Location, "Ravenport", "a port city");
        let version =
            EntityVersion::snapshot(&entity, ChangeType::Created, "seed", ChangeActor::Ai, None);
        store.create_entity(&entity, &version).await.unwrap();
    }

    let store = EmbeddedGraphStore::new(&path).unwrap();
    let active = store.active_entities("story-1").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Ravenport");
}
