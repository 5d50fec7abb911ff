//! Core traits for loreweave providers.

mod embedder;
mod graph_store;
mod llm;
mod message_store;

pub use embedder::*;
pub use graph_store::*;
pub use llm::*;
pub use message_store::*;
