//! Ollama compression provider implementation.

use async_trait::async_trait;

use strata_core::error::{StrataError, StrataResult};
use strata_core::traits::{Compressor, CompressorConfig};

#[cfg(feature = "ollama")]
use ollama_rs::{generation::completion::request::GenerationRequest, Ollama};

#[cfg(feature = "ollama")]
use crate::prompts::{clean_summary, compression_prompt, COMPRESSION_SYSTEM_PROMPT};

/// Ollama compressor for local models.
pub struct OllamaCompressor {
    #[cfg(feature = "ollama")]
    client: Ollama,
    config: CompressorConfig,
}

impl OllamaCompressor {
    /// Create a new Ollama compressor.
    pub fn new(config: CompressorConfig) -> StrataResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let url = url::Url::parse(&base_url)
            .map_err(|e| StrataError::Configuration(format!("Invalid Ollama URL: {}", e)))?;

        let host = url.host_str().unwrap_or("localhost").to_string();
        let port = url.port().unwrap_or(11434);

        let mut config = config;
        if config.model.is_empty() || config.model == CompressorConfig::default().model {
            config.model = "llama3.2".to_string();
        }
        tracing::debug!(host = %host, port, model = %config.model, "Configured Ollama compressor");

        Ok(Self {
            #[cfg(feature = "ollama")]
            client: Ollama::new(format!("{}://{}", url.scheme(), host), port),
            config,
        })
    }
}

#[async_trait]
impl Compressor for OllamaCompressor {
    #[cfg(feature = "ollama")]
    async fn compress(&self, content: &str, target_tokens: u32) -> StrataResult<String> {
        let prompt = format!(
            "{}\n\n{}",
            COMPRESSION_SYSTEM_PROMPT,
            compression_prompt(content, target_tokens)
        );
        let request = GenerationRequest::new(self.config.model.clone(), prompt);

        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| StrataError::compression(format!("Ollama API error: {}", e)))?;

        let text = clean_summary(&response.response);
        if text.is_empty() {
            return Err(StrataError::compression("Ollama returned an empty summary"));
        }
        Ok(text)
    }

    #[cfg(not(feature = "ollama"))]
    async fn compress(&self, _content: &str, _target_tokens: u32) -> StrataResult<String> {
        Err(StrataError::Configuration(
            "Ollama feature not enabled. Enable the 'ollama' feature.".to_string(),
        ))
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
