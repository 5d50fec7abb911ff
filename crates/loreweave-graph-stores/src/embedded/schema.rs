//! SQLite schema for the embedded stores.
//!
//! Four tables:
//! - `entities`: the knowledge-graph nodes, embeddings inline as BLOBs
//! - `entity_versions`: append-only change history per entity
//! - `relationships`: directed typed edges, unique per (from, to, type)
//! - `messages`: the append-only conversation stream

use rusqlite::Connection;

use loreweave_core::error::LoreResult;

use super::db_err;

pub const CREATE_ENTITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    name TEXT NOT NULL,
    aliases TEXT NOT NULL DEFAULT '[]',
    description TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL DEFAULT '{}',
    importance INTEGER NOT NULL DEFAULT 5,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    merged_into TEXT,
    embedding BLOB,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

pub const CREATE_ENTITIES_STORY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_entities_story_status ON entities(story_id, status)
"#;

pub const CREATE_ENTITIES_NAME_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name)
"#;

pub const CREATE_ENTITY_VERSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entity_versions (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL DEFAULT '{}',
    change_type TEXT NOT NULL,
    change_note TEXT NOT NULL DEFAULT '',
    created_by TEXT NOT NULL,
    source_message_id INTEGER,
    created_at TEXT NOT NULL
)
"#;

pub const CREATE_ENTITY_VERSIONS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_entity_versions_entity ON entity_versions(entity_id)
"#;

pub const CREATE_RELATIONSHIPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relationships (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL,
    from_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    to_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    rel_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    strength INTEGER NOT NULL DEFAULT 5,
    created_by TEXT NOT NULL,
    source_message_id INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(from_entity_id, to_entity_id, rel_type)
)
"#;

pub const CREATE_RELATIONSHIPS_FROM_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_from ON relationships(from_entity_id)
"#;

pub const CREATE_RELATIONSHIPS_TO_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_to ON relationships(to_entity_id)
"#;

pub const CREATE_MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'general',
    important INTEGER NOT NULL DEFAULT 0,
    is_meta INTEGER NOT NULL DEFAULT 0,
    summary TEXT,
    created_at TEXT NOT NULL
)
"#;

pub const CREATE_MESSAGES_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, category)
"#;

/// Initialize the schema. Idempotent.
pub fn init_schema(conn: &Connection) -> LoreResult<()> {
    conn.execute("PRAGMA foreign_keys = ON", []).map_err(db_err)?;

    conn.execute(CREATE_ENTITIES_TABLE, []).map_err(db_err)?;
    conn.execute(CREATE_ENTITY_VERSIONS_TABLE, [])
        .map_err(db_err)?;
    conn.execute(CREATE_RELATIONSHIPS_TABLE, [])
        .map_err(db_err)?;
    conn.execute(CREATE_MESSAGES_TABLE, []).map_err(db_err)?;

    conn.execute(CREATE_ENTITIES_STORY_INDEX, [])
        .map_err(db_err)?;
    conn.execute(CREATE_ENTITIES_NAME_INDEX, [])
        .map_err(db_err)?;
    conn.execute(CREATE_ENTITY_VERSIONS_INDEX, [])
        .map_err(db_err)?;
    conn.execute(CREATE_RELATIONSHIPS_FROM_INDEX, [])
        .map_err(db_err)?;
    conn.execute(CREATE_RELATIONSHIPS_TO_INDEX, [])
        .map_err(db_err)?;
    conn.execute(CREATE_MESSAGES_INDEX, []).map_err(db_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"entities".to_string()));
        assert!(tables.contains(&"entity_versions".to_string()));
        assert!(tables.contains(&"relationships".to_string()));
        assert!(tables.contains(&"messages".to_string()));
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_relationship_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO entities (id, story_id, entity_type, name, created_at, updated_at)
             VALUES ('a', 's', 'character', 'Klaus', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
                    ('b', 's', 'character', 'Anna', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO relationships (id, story_id, from_entity_id, to_entity_id, rel_type, created_by, created_at, updated_at)
             VALUES ('r1', 's', 'a', 'b', 'enemy', 'AI', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        // Same (from, to, type) again must violate the unique constraint
        let result = conn.execute(
            "INSERT INTO relationships (id, story_id, from_entity_id, to_entity_id, rel_type, created_by, created_at, updated_at)
             VALUES ('r2', 's', 'a', 'b', 'enemy', 'AI', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());

        // A different type between the same endpoints is fine
        conn.execute(
            "INSERT INTO relationships (id, story_id, from_entity_id, to_entity_id, rel_type, created_by, created_at, updated_at)
             VALUES ('r3', 's', 'a', 'b', 'rivalry', 'AI', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
    }
}
