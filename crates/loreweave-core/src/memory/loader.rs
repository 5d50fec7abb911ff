//! Selective history loading: execute a command's load plan against the
//! message store.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::LoreResult;
use crate::traits::MessageStore;
use crate::types::{Command, ConversationMessage};

/// Executes per-command load plans and returns a deduplicated, ordered
/// history window.
pub struct SelectiveLoader {
    store: Arc<dyn MessageStore>,
}

impl SelectiveLoader {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Load the history shape for one command.
    ///
    /// Slices are unioned, deduplicated by message id, and returned in
    /// ascending id order regardless of which slice contributed a message.
    pub async fn load(
        &self,
        conversation_id: &str,
        command: Command,
    ) -> LoreResult<Vec<ConversationMessage>> {
        let plan = command.load_plan();
        let mut messages: Vec<ConversationMessage> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();

        for slice in plan.slices {
            let loaded = self
                .store
                .load_slice(conversation_id, slice.category, slice.limit, slice.skip)
                .await?;
            tracing::debug!(
                conversation_id,
                command = command.as_str(),
                category = slice.category.as_str(),
                count = loaded.len(),
                "loaded history slice"
            );
            for message in loaded {
                if seen.insert(message.id) {
                    messages.push(message);
                }
            }
        }

        if let Some(important) = plan.important {
            let loaded = self
                .store
                .load_important(conversation_id, important.limit, important.within_days)
                .await?;
            tracing::debug!(
                conversation_id,
                command = command.as_str(),
                count = loaded.len(),
                "loaded important messages"
            );
            for message in loaded {
                if seen.insert(message.id) {
                    messages.push(message);
                }
            }
        }

        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationRole, MessageCategory};
    use async_trait::async_trait;
    use chrono::Utc;

    fn message(id: i64, category: MessageCategory, important: bool) -> ConversationMessage {
        ConversationMessage {
            id,
            conversation_id: "c1".into(),
            role: ConversationRole::User,
            content: format!("message {}", id),
            category,
            important,
            is_meta: false,
            summary: None,
            created_at: Utc::now(),
        }
    }

    /// In-memory store backed by a flat message list.
    struct FakeStore {
        messages: Vec<ConversationMessage>,
    }

    #[async_trait]
    impl MessageStore for FakeStore {
        async fn load_slice(
            &self,
            _conversation_id: &str,
            category: MessageCategory,
            limit: usize,
            skip: usize,
        ) -> LoreResult<Vec<ConversationMessage>> {
            let mut matching: Vec<ConversationMessage> = self
                .messages
                .iter()
                .filter(|m| m.category == category)
                .cloned()
                .collect();
            matching.sort_by_key(|m| std::cmp::Reverse(m.id));
            let mut slice: Vec<ConversationMessage> =
                matching.into_iter().skip(skip).take(limit).collect();
            slice.sort_by_key(|m| m.id);
            Ok(slice)
        }

        async fn load_important(
            &self,
            _conversation_id: &str,
            limit: usize,
            _within_days: i64,
        ) -> LoreResult<Vec<ConversationMessage>> {
            Ok(self
                .messages
                .iter()
                .filter(|m| m.important)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn update_summary(&self, _message_id: i64, _summary: &str) -> LoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_unions_and_orders() {
        let store = FakeStore {
            messages: vec![
                message(3, MessageCategory::Narration, false),
                message(1, MessageCategory::Dialogue, false),
                // Important AND dialogue: must appear once
                message(2, MessageCategory::Dialogue, true),
                message(4, MessageCategory::PlotSummary, false),
            ],
        };
        let loader = SelectiveLoader::new(Arc::new(store));

        let loaded = loader.load("c1", Command::General).await.unwrap();
        let ids: Vec<i64> = loaded.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_load_respects_plan_categories() {
        let store = FakeStore {
            messages: vec![
                message(1, MessageCategory::Dialogue, false),
                message(2, MessageCategory::CharacterSheet, false),
            ],
        };
        let loader = SelectiveLoader::new(Arc::new(store));

        // Recap plan loads plot summaries and narration only, plus the
        // important top-up; neither message qualifies.
        let loaded = loader.load("c1", Command::Recap).await.unwrap();
        assert!(loaded.is_empty());
    }
}
