//! Factory for creating a MemoryRouter from configuration.

use std::sync::Arc;

use strata_core::config::EngineConfig;
use strata_core::error::StrataResult;
use strata_core::router::MemoryRouter;
use strata_core::traits::{Compressor, Embedder};

use strata_compression::CompressorFactory;
use strata_embeddings::EmbedderFactory;

/// Create a MemoryRouter with the providers named in `config`.
pub fn create_router(config: EngineConfig) -> StrataResult<MemoryRouter> {
    let embedder = create_embedder(&config)?;
    let compressor = create_compressor(&config)?;
    MemoryRouter::new(config, embedder, compressor)
}

fn create_embedder(config: &EngineConfig) -> StrataResult<Option<Arc<dyn Embedder>>> {
    config
        .embedder
        .as_ref()
        .map(EmbedderFactory::from_provider_config)
        .transpose()
}

fn create_compressor(config: &EngineConfig) -> StrataResult<Option<Arc<dyn Compressor>>> {
    config
        .compressor
        .as_ref()
        .map(CompressorFactory::from_provider_config)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::traits::{CompressorProviderConfig, EmbedderConfig, EmbedderProvider, EmbedderProviderConfig};

    #[test]
    fn test_defaults_have_no_embedder() {
        let router = create_router(EngineConfig::default()).unwrap();
        assert_eq!(router.status().unwrap().tiers.durable(), 0);
    }

    #[test]
    fn test_configured_providers() {
        let config = EngineConfig::builder()
            .embedder(EmbedderProviderConfig {
                provider: EmbedderProvider::Ollama,
                config: EmbedderConfig {
                    model: "nomic-embed-text".to_string(),
                    ..Default::default()
                },
            })
            .compressor(CompressorProviderConfig::default())
            .build();
        assert!(create_router(config).is_ok());
    }
}
