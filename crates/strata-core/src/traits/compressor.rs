//! Compressor trait and the built-in truncating fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StrataResult;
use crate::types::estimate_tokens;

/// Summarization service used when a decaying item advances phase.
///
/// The returned text should fit `target_tokens`; the scheduler enforces the
/// budget afterwards regardless.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress `content` to fit roughly `target_tokens` tokens.
    async fn compress(&self, content: &str, target_tokens: u32) -> StrataResult<String>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Compressor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// Model name/identifier.
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// API key (if not using environment variable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL for API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-nano-2025-04-14".to_string(),
            temperature: default_temperature(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Compressor provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressorProvider {
    /// Deterministic word truncation, no external service.
    #[default]
    Truncate,
    OpenAI,
    Ollama,
}

/// Compressor provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompressorProviderConfig {
    /// Provider type.
    pub provider: CompressorProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: CompressorConfig,
}

/// Keeps leading words until the token budget is reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncatingCompressor;

impl TruncatingCompressor {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous form, also used to enforce budgets on service output.
    pub fn truncate(content: &str, target_tokens: u32) -> String {
        if estimate_tokens(content) <= target_tokens {
            return content.to_string();
        }

        let mut out = String::new();
        for word in content.split_whitespace() {
            let candidate_len = if out.is_empty() {
                word.chars().count()
            } else {
                out.chars().count() + 1 + word.chars().count()
            };
            if estimate_tokens_for_len(candidate_len) > target_tokens {
                break;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
        out
    }
}

fn estimate_tokens_for_len(chars: usize) -> u32 {
    chars.div_ceil(crate::types::CHARS_PER_TOKEN) as u32
}

#[async_trait]
impl Compressor for TruncatingCompressor {
    async fn compress(&self, content: &str, target_tokens: u32) -> StrataResult<String> {
        Ok(Self::truncate(content, target_tokens))
    }

    fn name(&self) -> &str {
        "truncate"
    }
}
