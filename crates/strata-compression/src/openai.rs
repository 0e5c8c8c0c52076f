//! OpenAI compression provider implementation.

use async_trait::async_trait;

use strata_core::error::{StrataError, StrataResult};
use strata_core::traits::{Compressor, CompressorConfig};

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    Client,
};

#[cfg(feature = "openai")]
use crate::prompts::{clean_summary, compression_prompt, COMPRESSION_SYSTEM_PROMPT};

/// OpenAI chat-model compressor.
pub struct OpenAICompressor {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: CompressorConfig,
}

impl OpenAICompressor {
    /// Create a new OpenAI compressor.
    pub fn new(config: CompressorConfig) -> StrataResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                StrataError::Configuration("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        #[cfg(feature = "openai")]
        let openai_config = if let Some(ref base_url) = config.base_url {
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(base_url)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        let mut config = config;
        if config.model.is_empty() {
            config.model = CompressorConfig::default().model;
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client: Client::with_config(openai_config),
            config,
        })
    }

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(&self) -> bool {
        let model_lower = self.config.model.to_lowercase();
        ["o1", "o3", "gpt-5"].iter().any(|m| model_lower.contains(m))
    }
}

#[async_trait]
impl Compressor for OpenAICompressor {
    #[cfg(feature = "openai")]
    async fn compress(&self, content: &str, target_tokens: u32) -> StrataResult<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(
                    COMPRESSION_SYSTEM_PROMPT.to_string(),
                ),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(compression_prompt(
                    content,
                    target_tokens,
                )),
                name: None,
            }),
        ];

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            ..Default::default()
        };
        if !self.is_reasoning_model() {
            request.temperature = Some(self.config.temperature);
            request.max_tokens = Some(target_tokens.max(1));
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| StrataError::compression(format!("OpenAI API error: {}", e)))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| clean_summary(&c))
            .unwrap_or_default();

        if text.is_empty() {
            return Err(StrataError::compression("OpenAI returned an empty summary"));
        }
        tracing::debug!(model = %self.config.model, target_tokens, "Compressed memory");
        Ok(text)
    }

    #[cfg(not(feature = "openai"))]
    async fn compress(&self, _content: &str, _target_tokens: u32) -> StrataResult<String> {
        Err(StrataError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_model_detection() {
        let compressor = OpenAICompressor::new(CompressorConfig {
            model: "o3-mini".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(compressor.is_reasoning_model());
        assert_eq!(compressor.name(), "o3-mini");
    }

    #[test]
    fn test_empty_model_falls_back_to_default() {
        let compressor = OpenAICompressor::new(CompressorConfig {
            model: String::new(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(compressor.name(), CompressorConfig::default().model);
        assert!(!compressor.is_reasoning_model());
    }
}
