//! Configuration system for the loreweave engine.
//!
//! Every empirically-chosen constant (matching thresholds, token ratios,
//! tier sizes) is a named, overridable field here rather than a magic number
//! in the code.

use serde::{Deserialize, Serialize};

use crate::error::{LoreError, LoreResult};

/// Entity resolver thresholds.
///
/// The partial ratio and fuzzy threshold are empirical; recalibrate against
/// a labeled dataset before relying on exact boundary behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum shorter:longer length ratio for a normalized-containment
    /// match. Guards against trivial substrings ("A" matching "Anna").
    pub partial_match_min_ratio: f64,
    /// Minimum normalized Levenshtein similarity (1 - dist/max_len) for a
    /// fuzzy match.
    pub fuzzy_match_threshold: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            partial_match_min_ratio: 0.5,
            fuzzy_match_threshold: 0.8,
        }
    }
}

/// Semantic retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Empirical average rendered size of one entity, in estimated tokens.
    /// Divides the token budget to derive the adaptive result count K.
    pub avg_tokens_per_entity: usize,
    /// Hard cap on K regardless of budget.
    pub hard_cap: usize,
    /// Minimum edge strength followed during graph expansion.
    pub expansion_min_strength: u8,
    /// Cap on entities added by graph expansion.
    pub max_expansion: usize,
    /// Minimum edge strength rendered in formatted knowledge.
    pub render_min_strength: u8,
    /// Result count for the importance+recency fallback path.
    pub fallback_top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            avg_tokens_per_entity: 60,
            hard_cap: 100,
            expansion_min_strength: 7,
            max_expansion: 20,
            render_min_strength: 6,
            fallback_top_n: 100,
        }
    }
}

/// Hierarchical memory tier sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTierConfig {
    /// Newest messages kept verbatim.
    pub immediate_window: usize,
    /// Old-message count at which the whole old set is consolidated into a
    /// single long-term entry instead of block summaries.
    pub consolidation_threshold: usize,
    /// Block size for mid-term summaries below the consolidation threshold.
    pub mid_term_block_size: usize,
    /// Estimated-token level past which the builder logs a warning. No hard
    /// truncation happens here; the caller's budget bounds retrieval.
    pub soft_token_ceiling: usize,
    /// Reserved MODEL message content marking an aborted exchange.
    pub interruption_marker: String,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            immediate_window: 10,
            consolidation_threshold: 30,
            mid_term_block_size: 10,
            soft_token_ceiling: 8000,
            interruption_marker: "[interrupted]".to_string(),
        }
    }
}

/// Cache lifetimes, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for the per-story known-entities prompt summary.
    pub known_entities_ttl_secs: u64,
    /// TTL for the content-hash embedding cache.
    pub embedding_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            known_entities_ttl_secs: 60,
            embedding_ttl_secs: 3600,
        }
    }
}

/// Deduplication/curation pass tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Delay between per-type-group LLM calls, respecting upstream rate
    /// limits.
    pub call_delay_ms: u64,
    /// Importance at or below which the irrelevance phase may archive an
    /// entity the model flags as stale.
    pub archive_max_importance: u8,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            call_delay_ms: 1500,
            archive_max_importance: 3,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub resolver: ResolverConfig,
    pub retrieval: RetrievalConfig,
    pub memory: MemoryTierConfig,
    pub cache: CacheConfig,
    pub dedup: DedupConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML or JSON file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> LoreResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| LoreError::Configuration(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| LoreError::Configuration(e.to_string()))
            }
            _ => Err(LoreError::Configuration(
                "Unsupported config file format. Use .toml or .json".to_string(),
            )),
        }
    }

    /// Load overrides from environment variables on top of defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<f64>("LOREWEAVE_FUZZY_THRESHOLD") {
            config.resolver.fuzzy_match_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("LOREWEAVE_IMMEDIATE_WINDOW") {
            config.memory.immediate_window = v;
        }
        if let Some(v) = env_parse::<usize>("LOREWEAVE_CONSOLIDATION_THRESHOLD") {
            config.memory.consolidation_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("LOREWEAVE_AVG_TOKENS_PER_ENTITY") {
            config.retrieval.avg_tokens_per_entity = v;
        }

        config
    }

    /// Build configuration using the builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Builder for EngineConfig.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn resolver(mut self, resolver: ResolverConfig) -> Self {
        self.config.resolver = resolver;
        self
    }

    pub fn retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.config.retrieval = retrieval;
        self
    }

    pub fn memory(mut self, memory: MemoryTierConfig) -> Self {
        self.config.memory = memory;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn dedup(mut self, dedup: DedupConfig) -> Self {
        self.config.dedup = dedup;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
