//! Factory for creating LLM providers.

use std::sync::Arc;

use loreweave_core::error::LoreResult;
use loreweave_core::traits::{Llm, LlmConfig};

use crate::openai::OpenAIProvider;
use crate::retry::RetryingLlm;

/// Factory for creating retry-wrapped LLM providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an OpenAI provider from the given configuration.
    pub fn create(config: LlmConfig) -> LoreResult<Arc<dyn Llm>> {
        let max_retries = config.max_retries;
        let provider = OpenAIProvider::new(config)?;
        Ok(Arc::new(RetryingLlm::new(provider, max_retries)))
    }

    /// Create an OpenAI provider with default configuration.
    pub fn openai() -> LoreResult<Arc<dyn Llm>> {
        Self::create(LlmConfig::default())
    }

    /// Create an OpenAI provider with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> LoreResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(config)
    }
}
