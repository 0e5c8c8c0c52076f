//! strata-compression - Summarization providers used by strata's decay scheduler.
//!
//! When a decaying memory crosses into a tighter phase, its content is
//! rewritten to fit the phase's token budget. These providers ask a chat
//! model for that rewrite; the scheduler enforces the budget on whatever
//! comes back.
//!
//! # Supported Providers
//!
//! - **Truncate** (always available) - deterministic word truncation, no service
//! - **OpenAI** (feature: `openai`) - GPT-4.1, GPT-4o-mini, etc.
//! - **Ollama** (feature: `ollama`) - Local models via Ollama
//!
//! # Example
//!
//! ```ignore
//! use strata_compression::CompressorFactory;
//!
//! let compressor = CompressorFactory::openai_with_model("gpt-4o-mini")?;
//! let router = MemoryRouter::new(config, None, Some(compressor))?;
//! ```

mod factory;
mod ollama;
mod openai;
mod prompts;

pub use factory::CompressorFactory;
pub use ollama::OllamaCompressor;
pub use openai::OpenAICompressor;
pub use prompts::{clean_summary, compression_prompt, COMPRESSION_SYSTEM_PROMPT};

// Re-export core types for convenience
pub use strata_core::traits::{
    Compressor, CompressorConfig, CompressorProvider, CompressorProviderConfig, TruncatingCompressor,
};
