//! loreweave-llm - LLM provider implementations for loreweave.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`, default) - chat-completion models
//!
//! Providers created through [`LlmFactory`] come wrapped in a retry layer
//! that retries transient upstream failures and never retries parse-class
//! errors.
//!
//! # Example
//!
//! ```ignore
//! use loreweave_llm::LlmFactory;
//!
//! let llm = LlmFactory::openai()?;
//! let llm = LlmFactory::openai_with_model("gpt-4.1-mini")?;
//! ```

mod factory;
mod openai;
mod retry;

pub use factory::LlmFactory;
pub use openai::OpenAIProvider;
pub use retry::RetryingLlm;

// Re-export core types for convenience
pub use loreweave_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
