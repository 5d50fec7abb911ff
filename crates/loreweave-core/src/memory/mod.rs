//! Conversation memory: per-command selective loading and hierarchical
//! tiering of history into verbatim, block-summary, and consolidated layers.

mod builder;
mod loader;

pub use builder::{estimate_tokens, ContextEntry, MemoryBuilder};
pub use loader::SelectiveLoader;
