//! The engine facade: composed operations over extraction, the knowledge
//! graph, retrieval, and conversation memory.

mod graph;

pub use graph::{KnowledgeGraph, PersistStats};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{LoreError, LoreResult};
use crate::extraction::Extractor;
use crate::memory::{estimate_tokens, ContextEntry, MemoryBuilder, SelectiveLoader};
use crate::resolver::Resolver;
use crate::retrieval::{RetrievalOutcome, SemanticRetriever};
use crate::traits::{Embedder, GraphStore, Llm, MessageStore};
use crate::types::{Command, Entity, EntityType};

/// Everything assembled for one model turn.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub command: Command,
    /// Tiered history, oldest first.
    pub entries: Vec<ContextEntry>,
    /// Rendered graph knowledge relevant to the user turn.
    pub knowledge: String,
    pub retrieval: RetrievalOutcome,
    pub estimated_tokens: usize,
}

/// Outcome counters for one curation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub groups_merged: usize,
    pub entities_merged: usize,
    pub entities_archived: usize,
}

/// Composed context-memory engine.
///
/// All public operations accept a cancellation token; a cancelled operation
/// returns [`LoreError::Cancelled`] without finishing in-flight LLM calls.
pub struct Engine {
    config: EngineConfig,
    graph_store: Arc<dyn GraphStore>,
    extractor: Arc<Extractor>,
    graph: KnowledgeGraph,
    retriever: SemanticRetriever,
    loader: SelectiveLoader,
    builder: MemoryBuilder,
}

impl Engine {
    pub fn new(
        llm: Arc<dyn Llm>,
        embedder: Arc<dyn Embedder>,
        graph_store: Arc<dyn GraphStore>,
        message_store: Arc<dyn MessageStore>,
        config: EngineConfig,
    ) -> Self {
        let extractor = Arc::new(Extractor::new(
            llm,
            Duration::from_secs(config.cache.known_entities_ttl_secs),
        ));
        let graph = KnowledgeGraph::new(
            graph_store.clone(),
            embedder.clone(),
            Resolver::new(config.resolver.clone()),
        );
        let retriever =
            SemanticRetriever::new(graph_store.clone(), embedder, config.retrieval.clone());
        let loader = SelectiveLoader::new(message_store.clone());
        let builder = MemoryBuilder::new(extractor.clone(), message_store, config.memory.clone());

        Self {
            config,
            graph_store,
            extractor,
            graph,
            retriever,
            loader,
            builder,
        }
    }

    /// Extract entities and relationships from one piece of content and
    /// persist them into the story's knowledge graph.
    pub async fn extract_and_persist(
        &self,
        story_id: &str,
        content: &str,
        story_context: &str,
        source_message_id: Option<i64>,
        cancel: &CancellationToken,
    ) -> LoreResult<PersistStats> {
        with_cancel(cancel, async {
            let known = self.graph_store.active_entities(story_id).await?;
            let result = self
                .extractor
                .extract(story_id, content, &known, story_context)
                .await?;
            if result.is_empty() {
                return Ok(PersistStats::default());
            }
            self.graph
                .persist(story_id, &result, &known, source_message_id)
                .await
        })
        .await
    }

    /// Bulk-ingest a dossier document (cold-start population). Resolution
    /// still runs, so re-ingesting the same dossier updates instead of
    /// duplicating.
    pub async fn ingest_dossier(
        &self,
        story_id: &str,
        content: &str,
        cancel: &CancellationToken,
    ) -> LoreResult<PersistStats> {
        with_cancel(cancel, async {
            let known = self.graph_store.active_entities(story_id).await?;
            let result = self.extractor.extract_dossier(content).await?;
            if result.is_empty() {
                return Ok(PersistStats::default());
            }
            self.graph.persist(story_id, &result, &known, None).await
        })
        .await
    }

    /// Assemble tiered history plus retrieved graph knowledge for one user
    /// turn, sized to the caller's token budget.
    pub async fn assemble_context(
        &self,
        conversation_id: &str,
        story_id: &str,
        user_text: &str,
        token_budget: usize,
        cancel: &CancellationToken,
    ) -> LoreResult<AssembledContext> {
        with_cancel(cancel, async {
            let command = Command::detect(user_text);
            let messages = self.loader.load(conversation_id, command).await?;
            let entries = self.builder.build(&messages).await?;

            let retrieved = self
                .retriever
                .retrieve(story_id, user_text, token_budget)
                .await?;
            let knowledge = self.retriever.format_knowledge(&retrieved);

            let estimated_tokens = estimate_tokens(&knowledge)
                + entries
                    .iter()
                    .map(|e| match e {
                        ContextEntry::Summary(s) => estimate_tokens(s),
                        ContextEntry::Message { content, .. } => estimate_tokens(content),
                    })
                    .sum::<usize>();

            tracing::debug!(
                conversation_id,
                command = command.as_str(),
                entries = entries.len(),
                estimated_tokens,
                "context assembled"
            );

            Ok(AssembledContext {
                command,
                entries,
                knowledge,
                retrieval: retrieved.outcome,
                estimated_tokens,
            })
        })
        .await
    }

    /// Two-phase graph curation: merge duplicate entities, then archive
    /// low-importance entities the model flags as narratively stale.
    ///
    /// One LLM call per entity type per phase, with a configured delay
    /// between calls.
    pub async fn deduplicate(
        &self,
        story_id: &str,
        cancel: &CancellationToken,
    ) -> LoreResult<DedupReport> {
        with_cancel(cancel, self.deduplicate_inner(story_id)).await
    }

    async fn deduplicate_inner(&self, story_id: &str) -> LoreResult<DedupReport> {
        let mut report = DedupReport::default();
        let delay = Duration::from_millis(self.config.dedup.call_delay_ms);
        let mut first_call = true;

        // Phase 1: duplicate merging per type group.
        let entities = self.graph_store.active_entities(story_id).await?;
        let count_before = entities.len();
        for entity_type in EntityType::all() {
            let group: Vec<Entity> = entities
                .iter()
                .filter(|e| e.entity_type == *entity_type)
                .cloned()
                .collect();
            if group.len() < 2 {
                continue;
            }
            pace(&mut first_call, delay).await;

            for dup_group in self.extractor.find_duplicates(*entity_type, &group).await? {
                let Some(canonical) = group.iter().find(|e| e.answers_to(&dup_group.canonical))
                else {
                    tracing::debug!(name = %dup_group.canonical, "canonical name did not resolve, skipping group");
                    continue;
                };
                let duplicate_ids: Vec<String> = dup_group
                    .duplicates
                    .iter()
                    .filter_map(|name| group.iter().find(|e| e.answers_to(name)))
                    .filter(|e| e.id != canonical.id)
                    .map(|e| e.id.clone())
                    .collect();
                if duplicate_ids.is_empty() {
                    continue;
                }
                self.graph_store
                    .merge_entities(story_id, &canonical.id, &duplicate_ids)
                    .await?;
                tracing::info!(
                    canonical = %canonical.name,
                    merged = duplicate_ids.len(),
                    "duplicate group merged"
                );
                report.groups_merged += 1;
                report.entities_merged += duplicate_ids.len();
            }
        }

        // Phase 2: irrelevance archival over the post-merge graph.
        let entities = self.graph_store.active_entities(story_id).await?;
        for entity_type in EntityType::all() {
            let group: Vec<Entity> = entities
                .iter()
                .filter(|e| e.entity_type == *entity_type)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }
            pace(&mut first_call, delay).await;

            for name in self.extractor.find_irrelevant(*entity_type, &group).await? {
                let Some(entity) = group.iter().find(|e| e.answers_to(&name)) else {
                    continue;
                };
                if entity.importance > self.config.dedup.archive_max_importance {
                    tracing::debug!(name = %entity.name, importance = entity.importance, "flagged entity too important to archive");
                    continue;
                }
                self.graph_store.archive_entity(&entity.id).await?;
                tracing::info!(name = %entity.name, "entity archived as irrelevant");
                report.entities_archived += 1;
            }
        }

        if report.entities_merged > 0 || report.entities_archived > 0 {
            self.extractor
                .invalidate_known_entities(story_id, count_before);
        }
        Ok(report)
    }
}

/// Inter-call pacing for curation passes: no delay before the first call.
async fn pace(first_call: &mut bool, delay: Duration) {
    if *first_call {
        *first_call = false;
    } else if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn with_cancel<F, T>(cancel: &CancellationToken, fut: F) -> LoreResult<T>
where
    F: std::future::Future<Output = LoreResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoreError::Cancelled),
        result = fut => result,
    }
}
