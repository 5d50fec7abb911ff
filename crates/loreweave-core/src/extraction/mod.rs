//! LLM-backed extraction: turn narrative content into structured entity and
//! relationship mentions, plus the summarization and curation calls that
//! share the same plumbing.

mod parser;
mod prompts;

pub use parser::{
    parse_dedup, parse_extraction, parse_irrelevance, strip_json_wrapper, DedupGroup,
    ExtractedEntity, ExtractedRelationship, ExtractionResult,
};

use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::error::{LoreError, LoreResult};
use crate::traits::{GenerationOptions, Llm, ResponseFormat};
use crate::types::{Entity, EntityType, Message};

/// Runs extraction, summarization, and curation calls against an LLM.
///
/// The known-entities prompt section is cached per (story, entity count) so
/// back-to-back turns in the same story reuse it; any entity create or
/// update changes the count and naturally misses the cache.
pub struct Extractor {
    llm: Arc<dyn Llm>,
    known_entities_cache: TtlCache<(String, usize), String>,
}

impl Extractor {
    pub fn new(llm: Arc<dyn Llm>, known_entities_ttl: Duration) -> Self {
        Self {
            llm,
            known_entities_cache: TtlCache::new(known_entities_ttl),
        }
    }

    /// Extract entities and relationships from one piece of content.
    ///
    /// An unparseable response or a failed upstream call degrades to an
    /// empty result; ingestion must never poison the conversation flow.
    /// Cancellation propagates.
    pub async fn extract(
        &self,
        story_id: &str,
        content: &str,
        known: &[Entity],
        story_context: &str,
    ) -> LoreResult<ExtractionResult> {
        let known_summary = self.known_entities_summary(story_id, known);
        let messages = vec![
            Message::system(prompts::extraction_system_prompt()),
            Message::user(prompts::extraction_user_prompt(
                content,
                &known_summary,
                story_context,
            )),
        ];
        self.json_call(&messages)
            .await
            .map(|response| parse_extraction(&response))
    }

    /// Extract from a bulk dossier document (cold-start population). No
    /// known-entity context is offered; resolution still deduplicates.
    pub async fn extract_dossier(&self, content: &str) -> LoreResult<ExtractionResult> {
        let messages = vec![
            Message::system(prompts::extraction_system_prompt()),
            Message::user(prompts::dossier_user_prompt(content)),
        ];
        self.json_call(&messages)
            .await
            .map(|response| parse_extraction(&response))
    }

    /// Summarize a conversation span into one compact paragraph. Errors
    /// propagate; the caller decides whether to fall back to raw content.
    pub async fn summarize(&self, span: &str) -> LoreResult<String> {
        let messages = vec![
            Message::system(prompts::summarization_system_prompt()),
            Message::user(prompts::summarization_user_prompt(span)),
        ];
        let response = self.llm.generate(&messages, Some(text_options())).await?;
        let summary = response.content_or_empty().trim().to_string();
        if summary.is_empty() {
            return Err(LoreError::llm("summarization returned empty content"));
        }
        Ok(summary)
    }

    /// Ask the model for duplicate groups within one type group.
    pub async fn find_duplicates(
        &self,
        entity_type: EntityType,
        entities: &[Entity],
    ) -> LoreResult<Vec<DedupGroup>> {
        let messages = vec![
            Message::system(prompts::dedup_system_prompt()),
            Message::user(prompts::dedup_user_prompt(entity_type, entities)),
        ];
        self.json_call(&messages)
            .await
            .map(|response| parse_dedup(&response))
    }

    /// Ask the model for narratively stale entities within one type group.
    pub async fn find_irrelevant(
        &self,
        entity_type: EntityType,
        entities: &[Entity],
    ) -> LoreResult<Vec<String>> {
        let messages = vec![
            Message::system(prompts::irrelevance_system_prompt()),
            Message::user(prompts::irrelevance_user_prompt(entity_type, entities)),
        ];
        self.json_call(&messages)
            .await
            .map(|response| parse_irrelevance(&response))
    }

    /// Drop the cached known-entities summary for one story.
    pub fn invalidate_known_entities(&self, story_id: &str, entity_count: usize) {
        self.known_entities_cache
            .invalidate(&(story_id.to_string(), entity_count));
    }

    fn known_entities_summary(&self, story_id: &str, known: &[Entity]) -> String {
        let key = (story_id.to_string(), known.len());
        if let Some(cached) = self.known_entities_cache.get(&key) {
            return cached;
        }
        let summary = prompts::known_entities_summary(known);
        self.known_entities_cache.insert(key, summary.clone());
        summary
    }

    /// Run one JSON-mode call, degrading upstream failures to an empty-body
    /// response. Cancellation is the one error that propagates.
    async fn json_call(&self, messages: &[Message]) -> LoreResult<String> {
        let mut options = text_options();
        if self.llm.supports_json_mode() {
            options.response_format = Some(ResponseFormat::Json);
        }
        match self.llm.generate(messages, Some(options)).await {
            Ok(response) => Ok(response.content_or_empty().to_string()),
            Err(LoreError::Cancelled) => Err(LoreError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "extraction call failed, degrading to empty result");
                Ok(String::new())
            }
        }
    }
}

fn text_options() -> GenerationOptions {
    GenerationOptions {
        temperature: Some(0.1),
        max_tokens: None,
        response_format: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LlmResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted LLM returning canned responses in order.
    struct MockLlm {
        responses: Mutex<Vec<LoreResult<String>>>,
        calls: Mutex<Vec<Vec<Message>>>,
    }

    impl MockLlm {
        fn new(responses: Vec<LoreResult<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Llm for MockLlm {
        async fn generate(
            &self,
            messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> LoreResult<LlmResponse> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(LlmResponse::default());
            }
            responses.remove(0).map(|content| LlmResponse {
                content: Some(content),
                usage: None,
            })
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn extractor(responses: Vec<LoreResult<String>>) -> (Extractor, Arc<MockLlm>) {
        let llm = Arc::new(MockLlm::new(responses));
        (
            Extractor::new(llm.clone(), Duration::from_secs(60)),
            llm,
        )
    }

    #[tokio::test]
    async fn test_extract_parses_response() {
        let (extractor, llm) = extractor(vec![Ok(r#"{
            "entities": [{"name": "Klaus", "type": "character", "description": "a general", "importance": 8, "isNew": true}],
            "relationships": []
        }"#
        .to_string())]);

        let result = extractor
            .extract("story-1", "Klaus, o general.", &[], "")
            .await
            .unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "Klaus");

        // System + user message, and the content appears in the user prompt
        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 2);
        assert!(calls[0][1].content.contains("Klaus, o general."));
    }

    #[tokio::test]
    async fn test_known_entities_listed_in_prompt() {
        let (extractor, llm) = extractor(vec![Ok(
            r#"{"entities": [], "relationships": []}"#.to_string()
        )]);
        let known = vec![Entity::new(
            "story-1",
            EntityType::Character,
            "Klaus",
            "a general",
        )];

        extractor
            .extract("story-1", "more about him", &known, "")
            .await
            .unwrap();
        let calls = llm.calls.lock().unwrap();
        assert!(calls[0][1].content.contains("KNOWN ENTITIES"));
        assert!(calls[0][1].content.contains("Klaus (character)"));
    }

    #[tokio::test]
    async fn test_upstream_failure_degrades_to_empty() {
        let (extractor, _) = extractor(vec![Err(LoreError::llm("boom"))]);
        let result = extractor.extract("story-1", "text", &[], "").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let (extractor, _) = extractor(vec![Err(LoreError::Cancelled)]);
        let err = extractor
            .extract("story-1", "text", &[], "")
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Cancelled));
    }

    #[tokio::test]
    async fn test_summarize_propagates_errors() {
        let (failing_extractor, _) = extractor(vec![Err(LoreError::llm("boom"))]);
        assert!(failing_extractor.summarize("span").await.is_err());

        let (extractor, _) = extractor(vec![Ok("  A summary.  ".to_string())]);
        assert_eq!(extractor.summarize("span").await.unwrap(), "A summary.");
    }
}
