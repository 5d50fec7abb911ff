//! loreweave-embeddings - Embedding provider implementations for loreweave.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`, default) - text-embedding models
//!
//! [`CachedEmbedder`] wraps any provider with a content-hash TTL cache so
//! unchanged descriptions are never re-embedded.
//!
//! # Example
//!
//! ```ignore
//! use loreweave_embeddings::EmbedderFactory;
//!
//! let embedder = EmbedderFactory::openai()?;
//! ```

mod cached;
mod factory;
mod openai;

pub use cached::CachedEmbedder;
pub use factory::EmbedderFactory;
pub use openai::OpenAIEmbedder;

// Re-export core types for convenience
pub use loreweave_core::traits::{Embedder, EmbedderConfig};
