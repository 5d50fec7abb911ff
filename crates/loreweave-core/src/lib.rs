//! # loreweave-core
//!
//! Core abstractions and the composed engine for loreweave, a context-memory
//! layer for LLM-driven narrative applications.
//!
//! This crate provides:
//! - Core types ([`types`]): entities, relationships, messages, commands
//! - Provider traits ([`traits`]): LLM, embedder, graph store, message store
//! - Entity resolution ([`resolver`]): the three-tier matching cascade
//! - Extraction ([`extraction`]): prompts and lenient response parsing
//! - Retrieval ([`retrieval`]): budget-adaptive semantic graph retrieval
//! - Memory ([`memory`]): selective loading and hierarchical tiering
//! - The engine ([`engine`]): composed operations over all of the above
//!
//! Provider implementations live in the companion crates
//! (`loreweave-llm`, `loreweave-embeddings`, `loreweave-graph-stores`).

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod memory;
pub mod resolver;
pub mod retrieval;
pub mod traits;
pub mod types;

pub use config::{
    CacheConfig, DedupConfig, EngineConfig, MemoryTierConfig, ResolverConfig, RetrievalConfig,
};
pub use engine::{AssembledContext, DedupReport, Engine, KnowledgeGraph, PersistStats};
pub use error::{ErrorCode, LoreError, LoreResult};
pub use extraction::{ExtractionResult, Extractor};
pub use memory::{ContextEntry, MemoryBuilder, SelectiveLoader};
pub use resolver::Resolver;
pub use retrieval::{RetrievalOutcome, RetrievedKnowledge, SemanticRetriever};
pub use traits::{
    Embedder, EmbedderConfig, GenerationOptions, GraphStore, GraphStoreConfig, Llm, LlmConfig,
    LlmResponse, MessageStore, ResponseFormat, SimilarEntity, TokenUsage,
};
pub use types::{
    Command, ConversationMessage, ConversationRole, Entity, EntityStatus, EntityType,
    EntityVersion, Message, MessageCategory, MessageRole, NewRelationship, Relationship,
    RelationshipType, UpsertOutcome,
};
