//! Embedded SQLite-backed stores.
//!
//! A single-file (or in-memory) backend with no external services:
//! embeddings live inline as BLOBs and nearest-neighbor search is a linear
//! scan, which is comfortably fast at per-story graph sizes. Thread safety
//! comes from a Mutex around the connection; writes that must be atomic
//! (entity + version, merge repointing) run inside one transaction.

mod messages;
pub mod schema;

pub use messages::EmbeddedMessageStore;

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use loreweave_core::error::{ErrorCode, LoreError, LoreResult};
use loreweave_core::traits::{GraphStore, GraphStoreConfig, SimilarEntity};
use loreweave_core::types::{
    merge_attributes, ChangeActor, ChangeType, Entity, EntityStatus, EntityType, EntityVersion,
    NewRelationship, Relationship, RelationshipType, UpsertOutcome,
};

pub(crate) fn db_err(e: rusqlite::Error) -> LoreError {
    LoreError::Database {
        message: e.to_string(),
        code: ErrorCode::DbOperationFailed,
        source: Some(Box::new(e)),
    }
}

fn parse_ts(s: &str) -> LoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LoreError::database(format!("invalid timestamp '{}': {}", s, e)))
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine distance, 0 = identical direction. Mismatched or zero-norm
/// vectors are maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

const ENTITY_COLS: &str = "id, story_id, entity_type, name, aliases, description, attributes, \
     importance, status, merged_into, embedding, created_at, updated_at";

const RELATIONSHIP_COLS: &str = "id, story_id, from_entity_id, to_entity_id, rel_type, \
     description, strength, created_by, source_message_id, created_at, updated_at";

/// Raw entity row before type conversion.
struct EntityRow {
    id: String,
    story_id: String,
    entity_type: String,
    name: String,
    aliases: String,
    description: String,
    attributes: String,
    importance: i64,
    status: String,
    merged_into: Option<String>,
    embedding: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

fn read_entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    Ok(EntityRow {
        id: row.get(0)?,
        story_id: row.get(1)?,
        entity_type: row.get(2)?,
        name: row.get(3)?,
        aliases: row.get(4)?,
        description: row.get(5)?,
        attributes: row.get(6)?,
        importance: row.get(7)?,
        status: row.get(8)?,
        merged_into: row.get(9)?,
        embedding: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn entity_from_row(raw: EntityRow) -> LoreResult<Entity> {
    let entity_type = EntityType::from_str_flexible(&raw.entity_type)
        .ok_or_else(|| LoreError::database(format!("unknown entity type '{}'", raw.entity_type)))?;
    let status = EntityStatus::parse(&raw.status)
        .ok_or_else(|| LoreError::database(format!("unknown entity status '{}'", raw.status)))?;
    Ok(Entity {
        id: raw.id,
        story_id: raw.story_id,
        entity_type,
        name: raw.name,
        aliases: serde_json::from_str(&raw.aliases)?,
        description: raw.description,
        attributes: serde_json::from_str(&raw.attributes)?,
        importance: raw.importance.clamp(1, 10) as u8,
        status,
        merged_into: raw.merged_into,
        embedding: raw.embedding.as_deref().map(blob_to_embedding),
        created_at: parse_ts(&raw.created_at)?,
        updated_at: parse_ts(&raw.updated_at)?,
    })
}

struct RelationshipRow {
    id: String,
    story_id: String,
    from_entity_id: String,
    to_entity_id: String,
    rel_type: String,
    description: String,
    strength: i64,
    created_by: String,
    source_message_id: Option<i64>,
    created_at: String,
    updated_at: String,
}

fn read_relationship_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RelationshipRow> {
    Ok(RelationshipRow {
        id: row.get(0)?,
        story_id: row.get(1)?,
        from_entity_id: row.get(2)?,
        to_entity_id: row.get(3)?,
        rel_type: row.get(4)?,
        description: row.get(5)?,
        strength: row.get(6)?,
        created_by: row.get(7)?,
        source_message_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn relationship_from_row(raw: RelationshipRow) -> LoreResult<Relationship> {
    let rel_type = RelationshipType::from_str_flexible(&raw.rel_type).ok_or_else(|| {
        LoreError::database(format!("unknown relationship type '{}'", raw.rel_type))
    })?;
    let created_by = ChangeActor::parse(&raw.created_by)
        .ok_or_else(|| LoreError::database(format!("unknown change actor '{}'", raw.created_by)))?;
    Ok(Relationship {
        id: raw.id,
        story_id: raw.story_id,
        from_entity_id: raw.from_entity_id,
        to_entity_id: raw.to_entity_id,
        rel_type,
        description: raw.description,
        strength: raw.strength.clamp(1, 10) as u8,
        created_by,
        source_message_id: raw.source_message_id,
        created_at: parse_ts(&raw.created_at)?,
        updated_at: parse_ts(&raw.updated_at)?,
    })
}

/// Embedded knowledge-graph store on SQLite.
pub struct EmbeddedGraphStore {
    conn: Mutex<Connection>,
}

impl EmbeddedGraphStore {
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

    /// Create from a GraphStoreConfig.
    pub fn from_config(config: &GraphStoreConfig) -> LoreResult<Self> {
        if config.path.is_empty() || config.path == ":memory:" {
            Self::in_memory()
        } else {
            Self::new(&config.path)
        }
    }

    fn conn(&self) -> LoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LoreError::internal(e.to_string()))
    }

    fn insert_entity_tx(tx: &rusqlite::Transaction<'_>, entity: &Entity) -> LoreResult<()> {
        tx.execute(
            "INSERT INTO entities (id, story_id, entity_type, name, aliases, description, \
             attributes, importance, status, merged_into, embedding, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                entity.id,
                entity.story_id,
                entity.entity_type.as_str(),
                entity.name,
                serde_json::to_string(&entity.aliases)?,
                entity.description,
                serde_json::to_string(&entity.attributes)?,
                entity.importance as i64,
                entity.status.as_str(),
                entity.merged_into,
                entity.embedding.as_deref().map(embedding_to_blob),
                entity.created_at.to_rfc3339(),
                entity.updated_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn update_entity_tx(tx: &rusqlite::Transaction<'_>, entity: &Entity) -> LoreResult<()> {
        let changed = tx
            .execute(
                "UPDATE entities SET name = ?2, aliases = ?3, description = ?4, attributes = ?5, \
                 importance = ?6, status = ?7, merged_into = ?8, embedding = ?9, updated_at = ?10 \
                 WHERE id = ?1",
                params![
                    entity.id,
                    entity.name,
                    serde_json::to_string(&entity.aliases)?,
                    entity.description,
                    serde_json::to_string(&entity.attributes)?,
                    entity.importance as i64,
                    entity.status.as_str(),
                    entity.merged_into,
                    entity.embedding.as_deref().map(embedding_to_blob),
                    entity.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(LoreError::entity_not_found(&entity.id));
        }
        Ok(())
    }

    fn insert_version_tx(tx: &rusqlite::Transaction<'_>, version: &EntityVersion) -> LoreResult<()> {
        tx.execute(
            "INSERT INTO entity_versions (id, entity_id, name, description, attributes, \
             change_type, change_note, created_by, source_message_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                version.id,
                version.entity_id,
                version.name,
                version.description,
                serde_json::to_string(&version.attributes)?,
                version.change_type.as_str(),
                version.change_note,
                version.created_by.as_str(),
                version.source_message_id,
                version.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn fetch_entity(conn: &Connection, id: &str) -> LoreResult<Option<Entity>> {
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLS),
                params![id],
                read_entity_row,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(entity_from_row).transpose()
    }
}

#[async_trait]
impl GraphStore for EmbeddedGraphStore {
    async fn create_entity(&self, entity: &Entity, version: &EntityVersion) -> LoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        Self::insert_entity_tx(&tx, entity)?;
        Self::insert_version_tx(&tx, version)?;
        tx.commit().map_err(db_err)
    }

    async fn save_entity(
        &self,
        entity: &Entity,
        version: Option<&EntityVersion>,
    ) -> LoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        Self::update_entity_tx(&tx, entity)?;
        if let Some(version) = version {
            Self::insert_version_tx(&tx, version)?;
        }
        tx.commit().map_err(db_err)
    }

    async fn get_entity(&self, id: &str) -> LoreResult<Option<Entity>> {
        let conn = self.conn()?;
        Self::fetch_entity(&conn, id)
    }

    async fn active_entities(&self, story_id: &str) -> LoreResult<Vec<Entity>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM entities WHERE story_id = ?1 AND status = 'ACTIVE' \
                 ORDER BY updated_at DESC",
                ENTITY_COLS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![story_id], read_entity_row)
            .map_err(db_err)?;
        rows.map(|r| entity_from_row(r.map_err(db_err)?)).collect()
    }

    async fn entities_by_ids(&self, ids: &[String]) -> LoreResult<Vec<Entity>> {
        let conn = self.conn()?;
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = Self::fetch_entity(&conn, id)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    async fn top_entities(&self, story_id: &str, limit: usize) -> LoreResult<Vec<Entity>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM entities WHERE story_id = ?1 AND status = 'ACTIVE' \
                 ORDER BY importance DESC, updated_at DESC LIMIT ?2",
                ENTITY_COLS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![story_id, limit as i64], read_entity_row)
            .map_err(db_err)?;
        rows.map(|r| entity_from_row(r.map_err(db_err)?)).collect()
    }

    async fn upsert_relationship(&self, rel: &NewRelationship) -> LoreResult<UpsertOutcome> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        let existing: Option<(String, i64)> = conn
            .query_row(
                "SELECT id, strength FROM relationships \
                 WHERE from_entity_id = ?1 AND to_entity_id = ?2 AND rel_type = ?3",
                params![rel.from_entity_id, rel.to_entity_id, rel.rel_type.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        match existing {
            Some((id, strength)) => {
                // Strength only ever rises.
                let new_strength = strength.max(rel.strength as i64);
                conn.execute(
                    "UPDATE relationships SET description = ?2, strength = ?3, updated_at = ?4 \
                     WHERE id = ?1",
                    params![id, rel.description, new_strength, now],
                )
                .map_err(db_err)?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                conn.execute(
                    "INSERT INTO relationships (id, story_id, from_entity_id, to_entity_id, \
                     rel_type, description, strength, created_by, source_message_id, \
                     created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        rel.story_id,
                        rel.from_entity_id,
                        rel.to_entity_id,
                        rel.rel_type.as_str(),
                        rel.description,
                        rel.strength as i64,
                        rel.created_by.as_str(),
                        rel.source_message_id,
                        now,
                    ],
                )
                .map_err(db_err)?;
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn relationships_among(&self, ids: &[String]) -> LoreResult<Vec<Relationship>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM relationships \
             WHERE from_entity_id IN ({placeholders}) AND to_entity_id IN ({placeholders})",
            RELATIONSHIP_COLS
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(ids.iter().chain(ids.iter())),
                read_relationship_row,
            )
            .map_err(db_err)?;
        rows.map(|r| relationship_from_row(r.map_err(db_err)?))
            .collect()
    }

    async fn merge_entities(
        &self,
        _story_id: &str,
        canonical_id: &str,
        duplicate_ids: &[String],
    ) -> LoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;

        let raw = tx
            .query_row(
                &format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLS),
                params![canonical_id],
                read_entity_row,
            )
            .optional()
            .map_err(db_err)?;
        let mut canonical = match raw {
            Some(raw) => entity_from_row(raw)?,
            None => return Err(LoreError::entity_not_found(canonical_id)),
        };

        let now = Utc::now();
        for dup_id in duplicate_ids {
            if dup_id == canonical_id {
                continue;
            }
            let raw = tx
                .query_row(
                    &format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLS),
                    params![dup_id],
                    read_entity_row,
                )
                .optional()
                .map_err(db_err)?;
            let Some(dup) = raw.map(entity_from_row).transpose()? else {
                tracing::warn!(dup_id, "duplicate entity missing, skipping");
                continue;
            };

            canonical.add_alias(&dup.name);
            for alias in &dup.aliases {
                canonical.add_alias(alias);
            }
            canonical.attributes = merge_attributes(&canonical.attributes, &dup.attributes);
            canonical.importance = canonical.importance.max(dup.importance);

            // Repoint the duplicate's edges one at a time. An edge that
            // collides with an existing canonical edge folds into it,
            // keeping the higher strength; repointing can also produce
            // self-loops, which carry no information and are deleted.
            let dup_edges: Vec<(String, String, String, String, i64)> = {
                let mut stmt = tx
                    .prepare(
                        "SELECT id, from_entity_id, to_entity_id, rel_type, strength \
                         FROM relationships \
                         WHERE from_entity_id = ?1 OR to_entity_id = ?1",
                    )
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![dup_id], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    })
                    .map_err(db_err)?;
                rows.collect::<rusqlite::Result<_>>().map_err(db_err)?
            };
            for (edge_id, from, to, rel_type, strength) in dup_edges {
                let new_from = if &from == dup_id {
                    canonical_id
                } else {
                    from.as_str()
                };
                let new_to = if &to == dup_id {
                    canonical_id
                } else {
                    to.as_str()
                };
                if new_from == new_to {
                    tx.execute("DELETE FROM relationships WHERE id = ?1", params![edge_id])
                        .map_err(db_err)?;
                    continue;
                }
                let survivor: Option<String> = tx
                    .query_row(
                        "SELECT id FROM relationships \
                         WHERE from_entity_id = ?1 AND to_entity_id = ?2 \
                         AND rel_type = ?3 AND id != ?4",
                        params![new_from, new_to, rel_type, edge_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(db_err)?;
                match survivor {
                    Some(survivor_id) => {
                        tx.execute(
                            "UPDATE relationships \
                             SET strength = MAX(strength, ?2), updated_at = ?3 \
                             WHERE id = ?1",
                            params![survivor_id, strength, now.to_rfc3339()],
                        )
                        .map_err(db_err)?;
                        tx.execute("DELETE FROM relationships WHERE id = ?1", params![edge_id])
                            .map_err(db_err)?;
                    }
                    None => {
                        tx.execute(
                            "UPDATE relationships \
                             SET from_entity_id = ?2, to_entity_id = ?3, updated_at = ?4 \
                             WHERE id = ?1",
                            params![edge_id, new_from, new_to, now.to_rfc3339()],
                        )
                        .map_err(db_err)?;
                    }
                }
            }

            tx.execute(
                "UPDATE entities SET status = 'MERGED', merged_into = ?1, updated_at = ?2 \
                 WHERE id = ?3",
                params![canonical_id, now.to_rfc3339(), dup_id],
            )
            .map_err(db_err)?;
        }

        canonical.updated_at = now;
        Self::update_entity_tx(&tx, &canonical)?;
        tx.commit().map_err(db_err)
    }

    async fn archive_entity(&self, id: &str) -> LoreResult<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE entities SET status = 'ARCHIVED', updated_at = ?2 WHERE id = ?1",
                params![id, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(LoreError::entity_not_found(id));
        }
        Ok(())
    }

    async fn expand_relationships(
        &self,
        seed_ids: &[String],
        min_strength: u8,
        max_expansion: usize,
    ) -> LoreResult<Vec<String>> {
        if seed_ids.is_empty() || max_expansion == 0 {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut edges_stmt = conn
            .prepare(
                "SELECT from_entity_id, to_entity_id FROM relationships \
                 WHERE (from_entity_id = ?1 OR to_entity_id = ?1) AND strength >= ?2",
            )
            .map_err(db_err)?;
        let mut status_stmt = conn
            .prepare("SELECT status FROM entities WHERE id = ?1")
            .map_err(db_err)?;

        let mut visited: HashSet<String> = seed_ids.iter().cloned().collect();
        let mut frontier: Vec<String> = seed_ids.to_vec();
        let mut result: Vec<String> = Vec::new();

        'bfs: while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in &frontier {
                let neighbors: Vec<(String, String)> = edges_stmt
                    .query_map(params![id, min_strength as i64], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })
                    .map_err(db_err)?
                    .collect::<Result<_, _>>()
                    .map_err(db_err)?;

                for (from, to) in neighbors {
                    for neighbor in [from, to] {
                        if !visited.insert(neighbor.clone()) {
                            continue;
                        }
                        let status: Option<String> = status_stmt
                            .query_row(params![neighbor], |row| row.get(0))
                            .optional()
                            .map_err(db_err)?;
                        if status.as_deref() != Some("ACTIVE") {
                            continue;
                        }
                        result.push(neighbor.clone());
                        next.push(neighbor);
                        if result.len() >= max_expansion {
                            break 'bfs;
                        }
                    }
                }
            }
            frontier = next;
        }

        Ok(result)
    }

    async fn search_similar(
        &self,
        story_id: &str,
        query: &[f32],
        k: usize,
    ) -> LoreResult<Vec<SimilarEntity>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM entities \
                 WHERE story_id = ?1 AND status = 'ACTIVE' AND embedding IS NOT NULL",
                ENTITY_COLS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![story_id], read_entity_row)
            .map_err(db_err)?;

        let mut hits: Vec<SimilarEntity> = Vec::new();
        for row in rows {
            let entity = entity_from_row(row.map_err(db_err)?)?;
            let Some(ref embedding) = entity.embedding else {
                continue;
            };
            let distance = cosine_distance(query, embedding);
            hits.push(SimilarEntity { entity, distance });
        }
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn entity_versions(&self, entity_id: &str) -> LoreResult<Vec<EntityVersion>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, entity_id, name, description, attributes, change_type, change_note, \
                 created_by, source_message_id, created_at \
                 FROM entity_versions WHERE entity_id = ?1 ORDER BY created_at ASC, id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                    row.get::<_, String>(9)?,
                ))
            })
            .map_err(db_err)?;

        let mut versions = Vec::new();
        for row in rows {
            let (id, entity_id, name, description, attributes, change_type, change_note, created_by, source_message_id, created_at) =
                row.map_err(db_err)?;
            versions.push(EntityVersion {
                id,
                entity_id,
                name,
                description,
                attributes: serde_json::from_str(&attributes)?,
                change_type: ChangeType::parse(&change_type).ok_or_else(|| {
                    LoreError::database(format!("unknown change type '{}'", change_type))
                })?,
                change_note,
                created_by: ChangeActor::parse(&created_by).ok_or_else(|| {
                    LoreError::database(format!("unknown change actor '{}'", created_by))
                })?,
                source_message_id,
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(versions)
    }
}
