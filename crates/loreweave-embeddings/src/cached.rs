//! Content-hash caching layer over any embedder.
//!
//! Keys are the md5 of the model name plus the input text, so a model change
//! invalidates naturally. Entries expire on a TTL; a concurrent duplicate
//! miss just embeds twice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use loreweave_core::cache::TtlCache;
use loreweave_core::error::LoreResult;
use loreweave_core::traits::Embedder;

/// Wraps an embedder with a content-hash TTL cache.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: TtlCache<String, Vec<f32>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    fn cache_key(&self, text: &str) -> String {
        format!("{:x}", md5::compute(format!("{}:{}", self.inner.model_name(), text)))
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        let key = self.cache_key(text);
        if let Some(cached) = self.cache.get(&key) {
            tracing::trace!("embedding cache hit");
            return Ok(cached);
        }
        let embedding = self.inner.embed(text).await?;
        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> LoreResult<Vec<Vec<f32>>> {
        // Serve hits from cache; embed only the misses, in one upstream call.
        let keys: Vec<String> = texts.iter().map(|t| self.cache_key(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> =
            keys.iter().map(|k| self.cache.get(k)).collect();

        let misses: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let embeddings = self.inner.embed_batch(&miss_texts).await?;
            for (&i, embedding) in misses.iter().zip(embeddings) {
                self.cache.insert(keys[i].clone(), embedding.clone());
                results[i] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }
        fn dimension(&self) -> usize {
            1
        }
        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_repeat_embed_hits_cache() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), Duration::from_secs(60));

        assert_eq!(cached.embed("Klaus: a general").await.unwrap(), vec![16.0]);
        assert_eq!(cached.embed("Klaus: a general").await.unwrap(), vec![16.0]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        // Different content misses
        cached.embed("Anna: a spy").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_reembeds() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), Duration::from_millis(0));

        cached.embed("text").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cached.embed("text").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_embeds_only_misses() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), Duration::from_secs(60));

        cached.embed("aa").await.unwrap();
        let batch = cached
            .embed_batch(&["aa".to_string(), "bbb".to_string()])
            .await
            .unwrap();
        assert_eq!(batch, vec![vec![2.0], vec![3.0]]);
        // One direct call, then one batch call for the single miss
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
