//! Relationship types: directed, typed, weighted edges between entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entity::ChangeActor;

/// The closed set of relationship types between narrative entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Family,
    Friendship,
    Romance,
    Rivalry,
    Mentorship,
    Hierarchy,
    Alliance,
    Enemy,
    Ownership,
    Residence,
    Membership,
    Participation,
    Belief,
    Affiliation,
}

impl RelationshipType {
    /// Parse a relationship type from a string with flexible matching.
    pub fn from_str_flexible(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");

        match normalized.as_str() {
            "family" | "sibling" | "parent" | "child" | "cousin" | "related"
            | "kin" => Some(Self::Family),

            "friendship" | "friend" | "friends" | "friends_with"
            | "companion" => Some(Self::Friendship),

            "romance" | "romantic" | "lover" | "loves" | "married_to"
            | "spouse" | "partner" => Some(Self::Romance),

            "rivalry" | "rival" | "rivals" | "competes_with"
            | "competitor" => Some(Self::Rivalry),

            "mentorship" | "mentor" | "mentors" | "teacher_of" | "student_of"
            | "apprentice" => Some(Self::Mentorship),

            "hierarchy" | "superior" | "subordinate" | "commands"
            | "reports_to" | "serves" => Some(Self::Hierarchy),

            "alliance" | "ally" | "allies" | "allied_with"
            | "ally_of" => Some(Self::Alliance),

            "enemy" | "enemies" | "enemy_of" | "hates" | "hostile_to"
            | "nemesis" | "foe" => Some(Self::Enemy),

            "ownership" | "owns" | "owned_by" | "possesses"
            | "property_of" => Some(Self::Ownership),

            "residence" | "lives_in" | "resides_in" | "lives_at"
            | "home" => Some(Self::Residence),

            "membership" | "member_of" | "belongs_to"
            | "part_of" => Some(Self::Membership),

            "participation" | "participated_in" | "attended" | "took_part_in"
            | "involved_in" => Some(Self::Participation),

            "belief" | "believes_in" | "worships" | "follows"
            | "faith_in" => Some(Self::Belief),

            "affiliation" | "affiliated_with" | "associated_with"
            | "linked_to" | "connected_to" => Some(Self::Affiliation),

            _ => None,
        }
    }

    /// Get all relationship type variants.
    pub fn all() -> &'static [RelationshipType] {
        &[
            Self::Family,
            Self::Friendship,
            Self::Romance,
            Self::Rivalry,
            Self::Mentorship,
            Self::Hierarchy,
            Self::Alliance,
            Self::Enemy,
            Self::Ownership,
            Self::Residence,
            Self::Membership,
            Self::Participation,
            Self::Belief,
            Self::Affiliation,
        ]
    }

    /// Convert to string for prompts, storage, and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Friendship => "friendship",
            Self::Romance => "romance",
            Self::Rivalry => "rivalry",
            Self::Mentorship => "mentorship",
            Self::Hierarchy => "hierarchy",
            Self::Alliance => "alliance",
            Self::Enemy => "enemy",
            Self::Ownership => "ownership",
            Self::Residence => "residence",
            Self::Membership => "membership",
            Self::Participation => "participation",
            Self::Belief => "belief",
            Self::Affiliation => "affiliation",
        }
    }

    /// Directional phrasing for rendered knowledge ("X is-enemy-of Y").
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Family => "is-family-of",
            Self::Friendship => "is-friend-of",
            Self::Romance => "is-romantically-involved-with",
            Self::Rivalry => "is-rival-of",
            Self::Mentorship => "is-mentor-of",
            Self::Hierarchy => "is-superior-of",
            Self::Alliance => "is-ally-of",
            Self::Enemy => "is-enemy-of",
            Self::Ownership => "owns",
            Self::Residence => "resides-in",
            Self::Membership => "is-member-of",
            Self::Participation => "participated-in",
            Self::Belief => "believes-in",
            Self::Affiliation => "is-affiliated-with",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_flexible(s).ok_or_else(|| format!("Unknown relationship type: {}", s))
    }
}

/// A directed, typed, weighted edge between two entities.
///
/// Unique on (from, to, type). Strength is monotonically non-decreasing:
/// re-extraction of the same fact refreshes the description and raises the
/// strength, never lowers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub story_id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub rel_type: RelationshipType,
    pub description: String,
    /// Edge weight, 1-10.
    pub strength: u8,
    pub created_by: ChangeActor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for relationship upserts: everything but the surrogate key and
/// timestamps, which the store owns.
#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub story_id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub rel_type: RelationshipType,
    pub description: String,
    pub strength: u8,
    pub created_by: ChangeActor,
    pub source_message_id: Option<i64>,
}

impl NewRelationship {
    pub fn new(
        story_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        rel_type: RelationshipType,
        description: impl Into<String>,
        strength: u8,
    ) -> Self {
        Self {
            story_id: story_id.into(),
            from_entity_id: from.into(),
            to_entity_id: to.into(),
            rel_type,
            description: description.into(),
            strength: strength.clamp(1, 10),
            created_by: ChangeActor::Ai,
            source_message_id: None,
        }
    }

    pub fn with_source_message(mut self, message_id: i64) -> Self {
        self.source_message_id = Some(message_id);
        self
    }
}

/// Outcome of a relationship upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}
