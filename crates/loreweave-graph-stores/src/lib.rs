//! Store implementations for the loreweave knowledge graph and conversation
//! stream.
//!
//! Currently one backend: an embedded SQLite store with inline embeddings,
//! suitable for single-process deployments and tests.

pub mod embedded;

pub use embedded::{EmbeddedGraphStore, EmbeddedMessageStore};
