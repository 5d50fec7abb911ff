//! Embedded SQLite message store.
//!
//! The conversation stream is append-only; the tier-tagged `summary` column
//! is the single field the engine writes back.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use loreweave_core::error::{LoreError, LoreResult};
use loreweave_core::traits::MessageStore;
use loreweave_core::types::{ConversationMessage, ConversationRole, MessageCategory};

use super::{db_err, parse_ts, schema};

const MESSAGE_COLS: &str =
    "id, conversation_id, role, content, category, important, is_meta, summary, created_at";

struct MessageRow {
    id: i64,
    conversation_id: String,
    role: String,
    content: String,
    category: String,
    important: bool,
    is_meta: bool,
    summary: Option<String>,
    created_at: String,
}

fn read_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        category: row.get(4)?,
        important: row.get(5)?,
        is_meta: row.get(6)?,
        summary: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn message_from_row(raw: MessageRow) -> LoreResult<ConversationMessage> {
    let role = ConversationRole::parse(&raw.role)
        .ok_or_else(|| LoreError::database(format!("unknown message role '{}'", raw.role)))?;
    let category = MessageCategory::parse(&raw.category).ok_or_else(|| {
        LoreError::database(format!("unknown message category '{}'", raw.category))
    })?;
    Ok(ConversationMessage {
        id: raw.id,
        conversation_id: raw.conversation_id,
        role,
        content: raw.content,
        category,
        important: raw.important,
        is_meta: raw.is_meta,
        summary: raw.summary,
        created_at: parse_ts(&raw.created_at)?,
    })
}

/// Embedded conversation store on SQLite.
pub struct EmbeddedMessageStore {
    conn: Mutex<Connection>,
}

impl EmbeddedMessageStore {
    /// Open (or create) a store at the given database path.
    pub fn new(db_path: impl AsRef<Path>) -> LoreResult<Self> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store.
    pub fn in_memory() -> LoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> LoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LoreError::internal(e.to_string()))
    }

    /// Append a message to the conversation stream. Returns its id.
    pub fn append(
        &self,
        conversation_id: &str,
        role: ConversationRole,
        content: &str,
        category: MessageCategory,
        important: bool,
    ) -> LoreResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (conversation_id, role, content, category, important, \
             is_meta, created_at) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                conversation_id,
                role.as_str(),
                content,
                category.as_str(),
                important,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch one message by id.
    pub fn get(&self, message_id: i64) -> LoreResult<Option<ConversationMessage>> {
        use rusqlite::OptionalExtension;
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLS),
                params![message_id],
                read_message_row,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(message_from_row).transpose()
    }
}

#[async_trait]
impl MessageStore for EmbeddedMessageStore {
    async fn load_slice(
        &self,
        conversation_id: &str,
        category: MessageCategory,
        limit: usize,
        skip: usize,
    ) -> LoreResult<Vec<ConversationMessage>> {
        let conn = self.conn()?;
        // Newest-first window, then flipped back to ascending order.
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM messages \
                 WHERE conversation_id = ?1 AND category = ?2 AND is_meta = 0 \
                 ORDER BY id DESC LIMIT ?3 OFFSET ?4",
                MESSAGE_COLS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![conversation_id, category.as_str(), limit as i64, skip as i64],
                read_message_row,
            )
            .map_err(db_err)?;
        let mut messages: Vec<ConversationMessage> = rows
            .map(|r| message_from_row(r.map_err(db_err)?))
            .collect::<LoreResult<_>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn load_important(
        &self,
        conversation_id: &str,
        limit: usize,
        within_days: i64,
    ) -> LoreResult<Vec<ConversationMessage>> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(within_days);
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM messages \
                 WHERE conversation_id = ?1 AND important = 1 AND is_meta = 0 \
                 AND created_at >= ?2 \
                 ORDER BY id ASC LIMIT ?3",
                MESSAGE_COLS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![conversation_id, cutoff.to_rfc3339(), limit as i64],
                read_message_row,
            )
            .map_err(db_err)?;
        rows.map(|r| message_from_row(r.map_err(db_err)?)).collect()
    }

    async fn update_summary(&self, message_id: i64, summary: &str) -> LoreResult<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE messages SET summary = ?2 WHERE id = ?1",
                params![message_id, summary],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(LoreError::database(format!(
                "message {} not found",
                message_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_dialogue(n: i64) -> EmbeddedMessageStore {
        let store = EmbeddedMessageStore::in_memory().unwrap();
        for i in 1..=n {
            let role = if i % 2 == 1 {
                ConversationRole::User
            } else {
                ConversationRole::Model
            };
            store
                .append("c1", role, &format!("message {}", i), MessageCategory::Dialogue, false)
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_load_slice_window_ascending() {
        let store = store_with_dialogue(10);

        let slice = store
            .load_slice("c1", MessageCategory::Dialogue, 3, 0)
            .await
            .unwrap();
        assert_eq!(
            slice.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![8, 9, 10]
        );

        // Skip the newest two
        let slice = store
            .load_slice("c1", MessageCategory::Dialogue, 3, 2)
            .await
            .unwrap();
        assert_eq!(slice.iter().map(|m| m.id).collect::<Vec<_>>(), vec![6, 7, 8]);

        // Other categories and conversations are invisible
        let slice = store
            .load_slice("c1", MessageCategory::PlotSummary, 10, 0)
            .await
            .unwrap();
        assert!(slice.is_empty());
        let slice = store
            .load_slice("other", MessageCategory::Dialogue, 10, 0)
            .await
            .unwrap();
        assert!(slice.is_empty());
    }

    #[tokio::test]
    async fn test_load_important_recent_only() {
        let store = store_with_dialogue(4);
        store
            .append("c1", ConversationRole::User, "the oath", MessageCategory::Dialogue, true)
            .unwrap();

        let important = store.load_important("c1", 10, 30).await.unwrap();
        assert_eq!(important.len(), 1);
        assert_eq!(important[0].content, "the oath");

        // A cutoff in the future excludes everything
        let none = store.load_important("c1", 10, -1).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_summary_round_trip() {
        let store = store_with_dialogue(2);
        store.update_summary(2, "[BLOCK] they met").await.unwrap();

        let msg = store.get(2).unwrap().unwrap();
        assert_eq!(msg.summary.as_deref(), Some("[BLOCK] they met"));

        let err = store.update_summary(99, "x").await.unwrap_err();
        assert!(matches!(err, LoreError::Database { .. }));
    }
}
