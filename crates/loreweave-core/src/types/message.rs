//! Message types: conversation history records and LLM chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tier prefix written into a message's `summary` field once the whole old
/// set has been collapsed into one long-term entry.
pub const CONSOLIDATED_TAG: &str = "[CONSOLIDATED]";

/// Tier prefix for a cached mid-term block summary.
pub const BLOCK_TAG: &str = "[BLOCK]";

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationRole {
    User,
    Model,
}

impl ConversationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Model => "MODEL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Self::User),
            "MODEL" => Some(Self::Model),
            _ => None,
        }
    }
}

/// Closed message category used by the selective loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// In-character spoken exchange.
    Dialogue,
    /// Scene-setting and action narration.
    Narration,
    /// Periodic plot-state summaries.
    PlotSummary,
    /// Character sheets and dossiers.
    CharacterSheet,
    /// Everything else.
    General,
}

impl MessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dialogue => "dialogue",
            Self::Narration => "narration",
            Self::PlotSummary => "plot_summary",
            Self::CharacterSheet => "character_sheet",
            Self::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dialogue" => Some(Self::Dialogue),
            "narration" => Some(Self::Narration),
            "plot_summary" => Some(Self::PlotSummary),
            "character_sheet" => Some(Self::CharacterSheet),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One record of the append-only conversation stream.
///
/// The engine never mutates `content`; `summary` is the only writable field
/// and acts as a tier-tagged cache for the memory builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Ascending id; together with `created_at` defines canonical order.
    pub id: i64,
    pub conversation_id: String,
    pub role: ConversationRole,
    pub content: String,
    pub category: MessageCategory,
    pub important: bool,
    /// Meta messages are excluded from some views.
    pub is_meta: bool,
    /// Tier-tagged summary cache ([CONSOLIDATED] / [BLOCK] prefixed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    /// Whether the cached summary carries the given tier tag.
    pub fn summary_with_tag(&self, tag: &str) -> Option<&str> {
        self.summary
            .as_deref()
            .filter(|s| s.starts_with(tag))
            .map(|s| s[tag.len()..].trim_start())
    }
}

/// Role of a message sent to the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    #[default]
    User,
    Assistant,
}

/// A chat message for LLM prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}
