//! Message store trait: read access to the append-only conversation stream.
//!
//! The engine treats conversation content as read-only; the tier-tagged
//! `summary` field is the single writable column.

use async_trait::async_trait;

use crate::error::LoreResult;
use crate::types::{ConversationMessage, MessageCategory};

/// Core MessageStore trait.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Load up to `limit` messages of one category, skipping the newest
    /// `skip`, returned in ascending id order.
    async fn load_slice(
        &self,
        conversation_id: &str,
        category: MessageCategory,
        limit: usize,
        skip: usize,
    ) -> LoreResult<Vec<ConversationMessage>>;

    /// Load up to `limit` messages flagged important within the last
    /// `within_days` days, ascending id order.
    async fn load_important(
        &self,
        conversation_id: &str,
        limit: usize,
        within_days: i64,
    ) -> LoreResult<Vec<ConversationMessage>>;

    /// Write the tier-tagged summary cache field for one message.
    async fn update_summary(&self, message_id: i64, summary: &str) -> LoreResult<()>;
}
