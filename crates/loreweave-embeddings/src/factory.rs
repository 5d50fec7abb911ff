//! Factory for creating embedding providers.

use std::sync::Arc;
use std::time::Duration;

use loreweave_core::error::LoreResult;
use loreweave_core::traits::{Embedder, EmbedderConfig};

use crate::cached::CachedEmbedder;
use crate::openai::OpenAIEmbedder;

/// Factory for creating cache-wrapped embedding providers.
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Create an OpenAI embedder from the given configuration, wrapped in a
    /// content-hash cache with the given TTL.
    pub fn create(config: EmbedderConfig, cache_ttl: Duration) -> LoreResult<Arc<dyn Embedder>> {
        let embedder = OpenAIEmbedder::new(config)?;
        Ok(Arc::new(CachedEmbedder::new(
            Arc::new(embedder),
            cache_ttl,
        )))
    }

    /// Create an OpenAI embedder with default configuration and a one-hour
    /// cache.
    pub fn openai() -> LoreResult<Arc<dyn Embedder>> {
        Self::create(EmbedderConfig::default(), Duration::from_secs(3600))
    }
}
