//! Entity types for the knowledge graph.
//!
//! An entity is a tracked narrative concept: a character, location, object,
//! event, faction, or abstract concept. Entities are never physically
//! deleted; deduplication marks them merged and curation archives them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity types that can be extracted from narrative content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A character (e.g., "Klaus", "Anna").
    Character,
    /// A physical place (e.g., "the citadel", "Ravenport").
    Location,
    /// A physical object (e.g., "the iron key").
    Object,
    /// An event (e.g., "the siege", "the wedding").
    Event,
    /// A faction or group (e.g., "the rebellion", "House Vane").
    Faction,
    /// An abstract concept (e.g., "the prophecy", "honor").
    Concept,
}

impl EntityType {
    /// Parse an entity type from a string with flexible matching.
    ///
    /// Tolerates the casing and synonym variation LLM output shows:
    /// "CHARACTER", "person", "npc", "place", "item", and so on.
    pub fn from_str_flexible(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();

        match normalized.as_str() {
            // Character variants
            "character" | "char" | "person" | "people" | "npc" | "protagonist"
            | "individual" => Some(Self::Character),

            // Location variants
            "location" | "loc" | "place" | "city" | "region" | "building"
            | "area" | "site" | "venue" => Some(Self::Location),

            // Object variants
            "object" | "obj" | "item" | "artifact" | "weapon" | "thing"
            | "possession" => Some(Self::Object),

            // Event variants
            "event" | "evt" | "battle" | "ceremony" | "occurrence"
            | "happening" | "incident" => Some(Self::Event),

            // Faction variants
            "faction" | "group" | "organization" | "organisation" | "guild"
            | "house" | "clan" | "order" | "army" => Some(Self::Faction),

            // Concept variants
            "concept" | "idea" | "theme" | "notion" | "belief_system"
            | "abstract" => Some(Self::Concept),

            _ => None,
        }
    }

    /// Get all entity type variants.
    pub fn all() -> &'static [EntityType] {
        &[
            Self::Character,
            Self::Location,
            Self::Object,
            Self::Event,
            Self::Faction,
            Self::Concept,
        ]
    }

    /// Convert to string for prompts and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Location => "location",
            Self::Object => "object",
            Self::Event => "event",
            Self::Faction => "faction",
            Self::Concept => "concept",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_flexible(s).ok_or_else(|| format!("Unknown entity type: {}", s))
    }
}

/// Lifecycle status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityStatus {
    /// Live, resolvable, retrievable.
    Active,
    /// Folded into a canonical entity; `merged_into` points at it.
    Merged,
    /// Curated out of retrieval but kept for history.
    Archived,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Merged => "MERGED",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "MERGED" => Some(Self::Merged),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// A scalar value in an entity's open attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl AttributeValue {
    /// Convert a loose JSON value into an attribute value, stringifying
    /// anything non-scalar.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Null => None,
            other => Some(Self::String(other.to_string())),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Open key-value map for domain-specific entity facts.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Shallow key-overwrite union: keys from `incoming` replace keys in `base`.
pub fn merge_attributes(base: &AttributeMap, incoming: &AttributeMap) -> AttributeMap {
    let mut merged = base.clone();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// A tracked narrative entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Surrogate key (uuid).
    pub id: String,
    /// Owning conversation/session scope.
    pub story_id: String,
    pub entity_type: EntityType,
    /// Canonical display name.
    pub name: String,
    /// Alternate names; deduplicated, never contains the canonical name.
    pub aliases: Vec<String>,
    /// Latest known truth about the entity.
    pub description: String,
    pub attributes: AttributeMap,
    /// Narrative importance, 1-10.
    pub importance: u8,
    pub status: EntityStatus,
    /// Set only when status is Merged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_into: Option<String>,
    /// Regenerated whenever the description changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new active entity with a fresh surrogate key.
    pub fn new(
        story_id: impl Into<String>,
        entity_type: EntityType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            story_id: story_id.into(),
            entity_type,
            name: name.into(),
            aliases: Vec::new(),
            description: description.into(),
            attributes: AttributeMap::new(),
            importance: 5,
            status: EntityStatus::Active,
            merged_into: None,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the importance, clamped to 1-10.
    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.clamp(1, 10);
        self
    }

    /// Add aliases, dropping duplicates and the canonical name itself.
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        for alias in aliases {
            self.add_alias(alias);
        }
        self
    }

    /// Add one alias if it is not the canonical name or already present
    /// (case-insensitive). Returns true if the alias was added.
    pub fn add_alias(&mut self, alias: impl Into<String>) -> bool {
        let alias = alias.into();
        let trimmed = alias.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(&self.name) {
            return false;
        }
        if self
            .aliases
            .iter()
            .any(|a| a.eq_ignore_ascii_case(trimmed))
        {
            return false;
        }
        self.aliases.push(trimmed.to_string());
        true
    }

    /// Whether the given name matches this entity's name or any alias,
    /// case-insensitively.
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Who recorded a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeActor {
    Ai,
    System,
}

impl ChangeActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::System => "SYSTEM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AI" => Some(Self::Ai),
            "SYSTEM" => Some(Self::System),
            _ => None,
        }
    }
}

/// Kind of change an entity version records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Created,
    Updated,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "UPDATED" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// Immutable audit record of an entity's substantive fields at one point in
/// time. Append-only; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityVersion {
    pub id: String,
    pub entity_id: String,
    pub name: String,
    pub description: String,
    pub attributes: AttributeMap,
    pub change_type: ChangeType,
    pub change_note: String,
    pub created_by: ChangeActor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl EntityVersion {
    /// Snapshot an entity's substantive fields into a version record.
    pub fn snapshot(
        entity: &Entity,
        change_type: ChangeType,
        change_note: impl Into<String>,
        created_by: ChangeActor,
        source_message_id: Option<i64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity_id: entity.id.clone(),
            name: entity.name.clone(),
            description: entity.description.clone(),
            attributes: entity.attributes.clone(),
            change_type,
            change_note: change_note.into(),
            created_by,
            source_message_id,
            created_at: Utc::now(),
        }
    }
}
