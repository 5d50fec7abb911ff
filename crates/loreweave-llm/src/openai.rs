//! OpenAI LLM provider implementation.

use async_trait::async_trait;

use loreweave_core::error::{ErrorCode, LoreError, LoreResult};
use loreweave_core::traits::{
    GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage,
};
use loreweave_core::types::{Message, MessageRole};

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest,
    },
    Client,
};

/// OpenAI LLM provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI LLM provider.
    pub fn new(config: LlmConfig) -> LoreResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                LoreError::Configuration("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        #[cfg(feature = "openai")]
        let openai_config = if let Some(ref base_url) = config.base_url {
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(base_url)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        #[cfg(feature = "openai")]
        let client = Client::with_config(openai_config);

        let mut config = config;
        if config.model.is_empty() {
            config.model = "gpt-4.1-mini".to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    #[cfg(feature = "openai")]
    fn message_to_openai(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                        msg.content.clone(),
                    ),
                    name: None,
                })
            }
            MessageRole::User => {
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                        msg.content.clone(),
                    ),
                    name: None,
                })
            }
            MessageRole::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(
                        async_openai::types::ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        ),
                    ),
                    name: None,
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(feature = "openai")]
fn map_openai_error(e: async_openai::error::OpenAIError) -> LoreError {
    use async_openai::error::OpenAIError;
    match e {
        OpenAIError::Reqwest(e) => LoreError::Network {
            message: e.to_string(),
            code: ErrorCode::NetConnectionFailed,
            source: Some(Box::new(e)),
        },
        OpenAIError::ApiError(api) if api.message.to_lowercase().contains("rate limit") => {
            LoreError::rate_limit(api.message)
        }
        other => LoreError::Llm {
            message: format!("OpenAI API error: {}", other),
            code: ErrorCode::LlmGenerationFailed,
            source: Some(Box::new(other)),
        },
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> LoreResult<LlmResponse> {
        let chat_messages: Vec<ChatCompletionRequestMessage> =
            messages.iter().map(Self::message_to_openai).collect();

        let options = options.unwrap_or_default();

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: chat_messages,
            ..Default::default()
        };
        request.temperature = Some(options.temperature.unwrap_or(self.config.temperature));
        request.max_tokens = Some(options.max_tokens.unwrap_or(self.config.max_tokens));
        if let Some(ResponseFormat::Json) = options.response_format {
            request.response_format = Some(async_openai::types::ResponseFormat::JsonObject);
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LoreError::llm("No response choices returned"))?;

        let content = choice.message.content.clone();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse { content, usage })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> LoreResult<LlmResponse> {
        Err(LoreError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}
