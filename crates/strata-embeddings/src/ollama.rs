//! Embeddings served by a local Ollama instance.

use async_trait::async_trait;
use url::Url;

use strata_core::error::{StrataError, StrataResult};
use strata_core::traits::{Embedder, EmbedderConfig};

#[cfg(feature = "ollama")]
use ollama_rs::{generation::embeddings::request::GenerateEmbeddingsRequest, Ollama};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_PORT: u16 = 11434;

/// Server address split into the origin and port `ollama-rs` takes separately.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    origin: String,
    port: u16,
}

impl Endpoint {
    fn parse(raw: &str) -> StrataResult<Self> {
        let url = Url::parse(raw).map_err(|e| {
            StrataError::Configuration(format!("invalid Ollama endpoint '{}': {}", raw, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StrataError::Configuration(format!(
                "Ollama endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }
        let host = url.host_str().ok_or_else(|| {
            StrataError::Configuration(format!("Ollama endpoint '{}' has no host", raw))
        })?;
        Ok(Self {
            origin: format!("{}://{}", url.scheme(), host),
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }
}

/// Embedder backed by a local Ollama model.
///
/// Vectors whose length disagrees with the configured dimension are rejected,
/// so switching models cannot mix dimensions in one store.
pub struct OllamaEmbedder {
    #[cfg(feature = "ollama")]
    client: Ollama,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: EmbedderConfig) -> StrataResult<Self> {
        let endpoint = Endpoint::parse(config.base_url.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;
        tracing::debug!(
            origin = %endpoint.origin,
            port = endpoint.port,
            model = %config.model,
            dims = config.embedding_dims,
            "Configured Ollama embedder"
        );

        Ok(Self {
            #[cfg(feature = "ollama")]
            client: Ollama::new(endpoint.origin, endpoint.port),
            model: config.model,
            dims: config.embedding_dims,
        })
    }

    #[cfg_attr(not(feature = "ollama"), allow(dead_code))]
    fn checked(&self, vector: Vec<f32>) -> StrataResult<Vec<f32>> {
        if vector.len() != self.dims {
            return Err(StrataError::embedding(format!(
                "{} returned a {}-dimensional vector, expected {}",
                self.model,
                vector.len(),
                self.dims
            )));
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[cfg(feature = "ollama")]
    async fn embed(&self, text: &str) -> StrataResult<Vec<f32>> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.into());
        let mut response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| StrataError::embedding(format!("Ollama request for {} failed: {}", self.model, e)))?;

        let vector = response
            .embeddings
            .pop()
            .ok_or_else(|| StrataError::embedding(format!("{} returned no vector", self.model)))?;
        self.checked(vector)
    }

    #[cfg(not(feature = "ollama"))]
    async fn embed(&self, _text: &str) -> StrataResult<Vec<f32>> {
        Err(StrataError::Configuration(
            "strata-embeddings was built without the 'ollama' feature".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(dims: usize) -> OllamaEmbedder {
        OllamaEmbedder::new(EmbedderConfig {
            model: "nomic-embed-text".to_string(),
            embedding_dims: dims,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_defaults_port() {
        let endpoint = Endpoint::parse("http://gpu-box").unwrap();
        assert_eq!(endpoint.origin, "http://gpu-box");
        assert_eq!(endpoint.port, DEFAULT_PORT);

        let endpoint = Endpoint::parse("https://embed.internal:8443/").unwrap();
        assert_eq!(endpoint.origin, "https://embed.internal");
        assert_eq!(endpoint.port, 8443);
    }

    #[test]
    fn test_endpoint_rejects_other_schemes() {
        assert!(Endpoint::parse("ftp://localhost:11434").is_err());
        assert!(Endpoint::parse("localhost").is_err());
    }

    #[test]
    fn test_vector_dimension_is_checked() {
        let embedder = embedder(3);
        assert_eq!(embedder.checked(vec![0.1, 0.2, 0.3]).unwrap().len(), 3);
        assert!(embedder.checked(vec![0.1, 0.2]).is_err());
    }
}
