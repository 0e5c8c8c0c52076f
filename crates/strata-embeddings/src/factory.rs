//! Factory for creating embedding providers.

use std::sync::Arc;

use strata_core::error::StrataResult;
use strata_core::traits::{Embedder, EmbedderConfig, EmbedderProvider, EmbedderProviderConfig};

use crate::ollama::OllamaEmbedder;
use crate::openai::OpenAIEmbedder;

/// Factory for creating embedding providers.
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Create an embedder from the given configuration.
    pub fn create(provider: EmbedderProvider, config: EmbedderConfig) -> StrataResult<Arc<dyn Embedder>> {
        tracing::debug!(provider = ?provider, model = %config.model, "Creating embedder");
        match provider {
            EmbedderProvider::OpenAI => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
            EmbedderProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        }
    }

    /// Create an embedder from the `embedder` section of an engine config.
    pub fn from_provider_config(config: &EmbedderProviderConfig) -> StrataResult<Arc<dyn Embedder>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Create an OpenAI embedder with default configuration.
    pub fn openai() -> StrataResult<Arc<dyn Embedder>> {
        Self::create(EmbedderProvider::OpenAI, EmbedderConfig::default())
    }

    /// Create an OpenAI embedder with a specific model.
    pub fn openai_with_model(model: impl Into<String>, dims: usize) -> StrataResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        };
        Self::create(EmbedderProvider::OpenAI, config)
    }

    /// Create an Ollama embedder with default configuration.
    pub fn ollama() -> StrataResult<Arc<dyn Embedder>> {
        Self::ollama_with_model("nomic-embed-text", 768)
    }

    /// Create an Ollama embedder with a specific model.
    pub fn ollama_with_model(model: impl Into<String>, dims: usize) -> StrataResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        };
        Self::create(EmbedderProvider::Ollama, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_needs_no_key() {
        let embedder = EmbedderFactory::ollama().unwrap();
        assert_eq!(embedder.model_name(), "nomic-embed-text");
        assert_eq!(embedder.dimension(), 768);
    }

    #[test]
    fn test_openai_with_explicit_key() {
        let config = EmbedderProviderConfig {
            provider: EmbedderProvider::OpenAI,
            config: EmbedderConfig {
                api_key: Some("sk-test".to_string()),
                ..Default::default()
            },
        };
        let embedder = EmbedderFactory::from_provider_config(&config).unwrap();
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
        assert_eq!(embedder.dimension(), 1536);
    }

    #[test]
    fn test_ollama_rejects_bad_url() {
        let config = EmbedderConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(EmbedderFactory::create(EmbedderProvider::Ollama, config).is_err());
    }
}
