//! Factory for creating compression providers.

use std::sync::Arc;

use strata_core::error::StrataResult;
use strata_core::traits::{
    Compressor, CompressorConfig, CompressorProvider, CompressorProviderConfig, TruncatingCompressor,
};

use crate::ollama::OllamaCompressor;
use crate::openai::OpenAICompressor;

/// Factory for creating compression providers.
pub struct CompressorFactory;

impl CompressorFactory {
    /// Create a compressor from the given configuration.
    pub fn create(provider: CompressorProvider, config: CompressorConfig) -> StrataResult<Arc<dyn Compressor>> {
        tracing::debug!(provider = ?provider, model = %config.model, "Creating compressor");
        match provider {
            CompressorProvider::Truncate => Ok(Arc::new(TruncatingCompressor::new())),
            CompressorProvider::OpenAI => Ok(Arc::new(OpenAICompressor::new(config)?)),
            CompressorProvider::Ollama => Ok(Arc::new(OllamaCompressor::new(config)?)),
        }
    }

    /// Create a compressor from the `compressor` section of an engine config.
    pub fn from_provider_config(config: &CompressorProviderConfig) -> StrataResult<Arc<dyn Compressor>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Deterministic truncation, no external service.
    pub fn truncate() -> Arc<dyn Compressor> {
        Arc::new(TruncatingCompressor::new())
    }

    /// Create an OpenAI compressor with default configuration.
    pub fn openai() -> StrataResult<Arc<dyn Compressor>> {
        Self::create(CompressorProvider::OpenAI, CompressorConfig::default())
    }

    /// Create an OpenAI compressor with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> StrataResult<Arc<dyn Compressor>> {
        let config = CompressorConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(CompressorProvider::OpenAI, config)
    }

    /// Create an Ollama compressor with default configuration.
    pub fn ollama() -> StrataResult<Arc<dyn Compressor>> {
        Self::create(CompressorProvider::Ollama, CompressorConfig::default())
    }

    /// Create an Ollama compressor with a specific model.
    pub fn ollama_with_model(model: impl Into<String>) -> StrataResult<Arc<dyn Compressor>> {
        let config = CompressorConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(CompressorProvider::Ollama, config)
    }
}
