//! Command detection and per-intent load plans.
//!
//! Different intents need structurally different memory shapes, so each
//! detected command maps to a static, auditable table of bounded history
//! slices rather than one generic sliding window.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::message::MessageCategory;

/// A detected user intent driving which history slices are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// "What should happen next" - wants plot state plus recent scene flow.
    NextBeat,
    /// Session pause/save - wants broad but shallow coverage.
    Pause,
    /// "Remind me what happened" - wants summaries over raw dialogue.
    Recap,
    /// Default conversational turn.
    General,
}

struct CommandPattern {
    command: Command,
    pattern: &'static Lazy<Regex>,
}

static NEXT_BEAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(next (beat|scene|chapter)|what (happens|should happen) next|continue the story|keep going)\b")
        .unwrap()
});

static PAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(pause|save (here|the game|the session)|stop (here|for now)|let's stop)\b").unwrap()
});

static RECAP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(recap|remind me|what happened (so far|before|last time)|summar(y|ize|ise))\b")
        .unwrap()
});

// Ordered: first match wins.
static PATTERNS: &[CommandPattern] = &[
    CommandPattern {
        command: Command::NextBeat,
        pattern: &NEXT_BEAT_RE,
    },
    CommandPattern {
        command: Command::Pause,
        pattern: &PAUSE_RE,
    },
    CommandPattern {
        command: Command::Recap,
        pattern: &RECAP_RE,
    },
];

impl Command {
    /// Detect the command for a user turn. First pattern match wins;
    /// anything unmatched is `General`.
    pub fn detect(user_text: &str) -> Self {
        for entry in PATTERNS {
            if entry.pattern.is_match(user_text) {
                return entry.command;
            }
        }
        Command::General
    }

    /// The static load plan for this command.
    pub fn load_plan(&self) -> &'static LoadPlan {
        match self {
            Command::NextBeat => &NEXT_BEAT_PLAN,
            Command::Pause => &PAUSE_PLAN,
            Command::Recap => &RECAP_PLAN,
            Command::General => &GENERAL_PLAN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::NextBeat => "next_beat",
            Command::Pause => "pause",
            Command::Recap => "recap",
            Command::General => "general",
        }
    }
}

/// One bounded query against the message store.
#[derive(Debug, Clone, Copy)]
pub struct SliceSpec {
    pub category: MessageCategory,
    /// Maximum messages pulled, newest first.
    pub limit: usize,
    /// Newest messages to skip before taking `limit`.
    pub skip: usize,
}

/// Optional extra slice of messages flagged important within a recency window.
#[derive(Debug, Clone, Copy)]
pub struct ImportantSpec {
    pub limit: usize,
    pub within_days: i64,
}

/// Declarative per-command memory shape: a list of bounded slices plus an
/// optional important-message top-up.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub slices: &'static [SliceSpec],
    pub important: Option<ImportantSpec>,
}

impl LoadPlan {
    /// Upper bound on how many messages this plan can pull.
    pub fn max_messages(&self) -> usize {
        self.slices.iter().map(|s| s.limit).sum::<usize>()
            + self.important.map(|i| i.limit).unwrap_or(0)
    }
}

static NEXT_BEAT_PLAN: LoadPlan = LoadPlan {
    slices: &[
        SliceSpec {
            category: MessageCategory::PlotSummary,
            limit: 1,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::Dialogue,
            limit: 20,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::Narration,
            limit: 15,
            skip: 0,
        },
    ],
    important: Some(ImportantSpec {
        limit: 5,
        within_days: 7,
    }),
};

static PAUSE_PLAN: LoadPlan = LoadPlan {
    slices: &[
        SliceSpec {
            category: MessageCategory::PlotSummary,
            limit: 2,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::Dialogue,
            limit: 10,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::Narration,
            limit: 10,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::CharacterSheet,
            limit: 3,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::General,
            limit: 5,
            skip: 0,
        },
    ],
    important: None,
};

static RECAP_PLAN: LoadPlan = LoadPlan {
    slices: &[
        SliceSpec {
            category: MessageCategory::PlotSummary,
            limit: 3,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::Narration,
            limit: 25,
            skip: 0,
        },
    ],
    important: Some(ImportantSpec {
        limit: 10,
        within_days: 30,
    }),
};

static GENERAL_PLAN: LoadPlan = LoadPlan {
    slices: &[
        SliceSpec {
            category: MessageCategory::Dialogue,
            limit: 30,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::Narration,
            limit: 20,
            skip: 0,
        },
        SliceSpec {
            category: MessageCategory::PlotSummary,
            limit: 1,
            skip: 0,
        },
    ],
    important: Some(ImportantSpec {
        limit: 5,
        within_days: 14,
    }),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_next_beat() {
        assert_eq!(Command::detect("What happens next?"), Command::NextBeat);
        assert_eq!(Command::detect("continue the story please"), Command::NextBeat);
    }

    #[test]
    fn test_detect_pause() {
        assert_eq!(Command::detect("let's pause here"), Command::Pause);
        assert_eq!(Command::detect("save the session"), Command::Pause);
    }

    #[test]
    fn test_detect_recap() {
        assert_eq!(Command::detect("give me a recap"), Command::Recap);
        assert_eq!(
            Command::detect("remind me what we were doing"),
            Command::Recap
        );
    }

    #[test]
    fn test_detect_default_general() {
        assert_eq!(Command::detect("Klaus draws his sword"), Command::General);
        assert_eq!(Command::detect(""), Command::General);
    }

    #[test]
    fn test_first_match_wins() {
        // Mentions both "next scene" and "recap"; NextBeat is earlier in
        // the pattern table.
        assert_eq!(
            Command::detect("before the next scene, give me a recap"),
            Command::NextBeat
        );
    }

    #[test]
    fn test_plans_are_bounded() {
        for command in [
            Command::NextBeat,
            Command::Pause,
            Command::Recap,
            Command::General,
        ] {
            let plan = command.load_plan();
            assert!(!plan.slices.is_empty());
            assert!(plan.max_messages() <= 60);
        }
    }
}
