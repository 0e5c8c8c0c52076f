//! strata-embeddings - Embedding service providers for strata.
//!
//! Embeddings are optional in strata: the router stores items without one
//! when the service fails, and blends cosine similarity into search when
//! they are available.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - text-embedding-3-small, text-embedding-3-large, etc.
//! - **Ollama** (feature: `ollama`) - Local embedding models via Ollama
//!
//! # Example
//!
//! ```ignore
//! use strata_embeddings::EmbedderFactory;
//!
//! let embedder = EmbedderFactory::openai()?;
//! let router = MemoryRouter::new(config, Some(embedder), None)?;
//! ```

mod factory;
mod ollama;
mod openai;

pub use factory::EmbedderFactory;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

// Re-export core types for convenience
pub use strata_core::traits::{Embedder, EmbedderConfig, EmbedderProvider, EmbedderProviderConfig};
