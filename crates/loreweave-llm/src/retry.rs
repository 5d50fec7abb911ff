//! Retry layer for LLM providers.
//!
//! Only errors classified retryable by [`LoreError::is_retryable`] are
//! retried: rate limits, timeouts, and upstream 5xx responses. Parse-class
//! failures go straight through, since the same prompt tends to fail the
//! same way.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};

use loreweave_core::error::{LoreError, LoreResult};
use loreweave_core::traits::{GenerationOptions, Llm, LlmResponse};
use loreweave_core::types::Message;

/// Wraps any [`Llm`] with exponential-backoff retry on transient failures.
pub struct RetryingLlm<L> {
    inner: L,
    max_retries: u32,
}

impl<L: Llm> RetryingLlm<L> {
    pub fn new(inner: L, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl<L: Llm> Llm for RetryingLlm<L> {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> LoreResult<LlmResponse> {
        let backoff = ExponentialBuilder::default().with_max_times(self.max_retries as usize);

        (|| async { self.inner.generate(messages, options.clone()).await })
            .retry(backoff)
            .when(LoreError::is_retryable)
            .notify(|err, dur| {
                tracing::warn!(error = %err, backoff = ?dur, "transient LLM failure, retrying");
            })
            .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn supports_json_mode(&self) -> bool {
        self.inner.supports_json_mode()
    }
}
