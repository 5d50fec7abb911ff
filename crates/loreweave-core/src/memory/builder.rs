//! Hierarchical memory builder.
//!
//! History is layered by age: the newest messages stay verbatim, older
//! messages collapse into cached block summaries, and once the old set
//! grows past the consolidation threshold it collapses into a single
//! long-term entry. Summaries are cached in the message rows themselves,
//! tagged by tier, and persisted off the request path.

use std::sync::Arc;

use crate::config::MemoryTierConfig;
use crate::error::LoreResult;
use crate::extraction::Extractor;
use crate::traits::MessageStore;
use crate::types::{ConversationMessage, ConversationRole, BLOCK_TAG, CONSOLIDATED_TAG};

/// One entry of assembled context, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEntry {
    /// A summary standing in for a span of older messages.
    Summary(String),
    /// A verbatim conversation message.
    Message {
        role: ConversationRole,
        content: String,
    },
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Builds tiered context from a loaded history window.
pub struct MemoryBuilder {
    extractor: Arc<Extractor>,
    store: Arc<dyn MessageStore>,
    config: MemoryTierConfig,
}

impl MemoryBuilder {
    pub fn new(
        extractor: Arc<Extractor>,
        store: Arc<dyn MessageStore>,
        config: MemoryTierConfig,
    ) -> Self {
        Self {
            extractor,
            store,
            config,
        }
    }

    /// Assemble tiered context entries from messages in ascending id order.
    ///
    /// Summarization failures degrade to the raw messages for the affected
    /// span; the build itself only fails on cancellation or store errors.
    pub async fn build(&self, messages: &[ConversationMessage]) -> LoreResult<Vec<ContextEntry>> {
        let messages = self.filter_interruptions(messages);

        let split = messages.len().saturating_sub(self.config.immediate_window);
        let (older, immediate) = messages.split_at(split);

        let mut entries: Vec<ContextEntry> = Vec::new();

        if older.len() >= self.config.consolidation_threshold {
            entries.push(self.consolidated_entry(older).await?);
        } else if !older.is_empty() {
            self.block_entries(older, &mut entries).await?;
        }

        for message in immediate {
            entries.push(ContextEntry::Message {
                role: message.role,
                content: message.content.clone(),
            });
        }

        let total: usize = entries
            .iter()
            .map(|e| match e {
                ContextEntry::Summary(s) => estimate_tokens(s),
                ContextEntry::Message { content, .. } => estimate_tokens(content),
            })
            .sum();
        if total > self.config.soft_token_ceiling {
            tracing::warn!(
                estimated_tokens = total,
                ceiling = self.config.soft_token_ceiling,
                "assembled context exceeds soft token ceiling"
            );
        }

        Ok(entries)
    }

    /// Drop aborted exchanges: a MODEL message carrying the interruption
    /// marker, together with the USER message that triggered it.
    fn filter_interruptions<'a>(
        &self,
        messages: &'a [ConversationMessage],
    ) -> Vec<&'a ConversationMessage> {
        let mut kept: Vec<&ConversationMessage> = Vec::with_capacity(messages.len());
        for message in messages {
            if message.role == ConversationRole::Model
                && message.content.trim() == self.config.interruption_marker
            {
                if kept
                    .last()
                    .is_some_and(|prev| prev.role == ConversationRole::User)
                {
                    kept.pop();
                }
                continue;
            }
            kept.push(message);
        }
        kept
    }

    /// One consolidated summary for the entire old set. Cached on the
    /// oldest old message; a cache hit skips the LLM entirely.
    async fn consolidated_entry(
        &self,
        older: &[&ConversationMessage],
    ) -> LoreResult<ContextEntry> {
        let anchor = older[0];
        if let Some(cached) = anchor.summary_with_tag(CONSOLIDATED_TAG) {
            tracing::debug!(message_id = anchor.id, "consolidated summary cache hit");
            return Ok(ContextEntry::Summary(cached.to_string()));
        }

        match self.extractor.summarize(&render_span(older)).await {
            Ok(summary) => {
                self.persist_summary(anchor.id, format!("{} {}", CONSOLIDATED_TAG, summary));
                Ok(ContextEntry::Summary(summary))
            }
            Err(crate::error::LoreError::Cancelled) => Err(crate::error::LoreError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "consolidation failed, keeping raw span");
                Ok(ContextEntry::Summary(render_span(older)))
            }
        }
    }

    /// Block summaries for full blocks of old messages, oldest first. A
    /// trailing partial block stays verbatim until it fills.
    async fn block_entries(
        &self,
        older: &[&ConversationMessage],
        entries: &mut Vec<ContextEntry>,
    ) -> LoreResult<()> {
        let block_size = self.config.mid_term_block_size;
        let full = (older.len() / block_size) * block_size;

        for block in older[..full].chunks(block_size) {
            let anchor = block[0];
            if let Some(cached) = anchor.summary_with_tag(BLOCK_TAG) {
                tracing::debug!(message_id = anchor.id, "block summary cache hit");
                entries.push(ContextEntry::Summary(cached.to_string()));
                continue;
            }

            match self.extractor.summarize(&render_span(block)).await {
                Ok(summary) => {
                    self.persist_summary(anchor.id, format!("{} {}", BLOCK_TAG, summary));
                    entries.push(ContextEntry::Summary(summary));
                }
                Err(crate::error::LoreError::Cancelled) => {
                    return Err(crate::error::LoreError::Cancelled)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "block summarization failed, keeping raw block");
                    for message in block {
                        entries.push(ContextEntry::Message {
                            role: message.role,
                            content: message.content.clone(),
                        });
                    }
                }
            }
        }

        for message in &older[full..] {
            entries.push(ContextEntry::Message {
                role: message.role,
                content: message.content.clone(),
            });
        }
        Ok(())
    }

    /// Write the tier-tagged summary cache off the request path. A lost
    /// write only costs one redundant summarization later.
    fn persist_summary(&self, message_id: i64, tagged: String) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.update_summary(message_id, &tagged).await {
                tracing::warn!(message_id, error = %e, "failed to cache summary");
            }
        });
    }
}

fn render_span(messages: &[&ConversationMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
