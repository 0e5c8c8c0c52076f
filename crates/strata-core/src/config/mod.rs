//! Configuration system for strata.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::decay::DecayConfig;
use crate::error::{StrataError, StrataResult};
use crate::external::ExternalCallConfig;
use crate::ingest::IngestConfig;
use crate::patterns::PatternConfig;
use crate::routing::RoutingConfig;
use crate::traits::{CompressorProviderConfig, EmbedderProviderConfig};
use crate::working_set::WorkingSetConfig;

/// Minimum interval for the background jobs, in hours.
pub const MIN_INTERVAL_HOURS: u64 = 1;

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ingest stage ("Fresh").
    pub ingest: IngestConfig,
    /// Working set ("Focus").
    pub working_set: WorkingSetConfig,
    /// Routing classifier weights and thresholds.
    pub routing: RoutingConfig,
    /// Decay scheduler.
    pub decay: DecayConfig,
    /// Pattern aggregator.
    pub patterns: PatternConfig,
    /// Timeouts and retries for embedding/compression calls.
    pub external: ExternalCallConfig,
    /// Embedding service (optional; items are stored without embeddings when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedder: Option<EmbedderProviderConfig>,
    /// Compression service (optional; falls back to truncation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressor: Option<CompressorProviderConfig>,
    /// Path to the tier database (`None` = in-memory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            working_set: WorkingSetConfig::default(),
            routing: RoutingConfig::default(),
            decay: DecayConfig::default(),
            patterns: PatternConfig::default(),
            external: ExternalCallConfig::default(),
            embedder: None,
            compressor: None,
            db_path: None,
        }
    }
}

/// Default on-disk database location, `~/.strata/strata.db`.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".strata"))
        .unwrap_or_else(|| PathBuf::from(".strata"))
        .join("strata.db")
}

impl EngineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| StrataError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| StrataError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| StrataError::Configuration(e.to_string()))?,
            _ => {
                return Err(StrataError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `STRATA_DB_PATH` (`:memory:` for an in-memory store, `default` for `~/.strata/strata.db`)
    /// - `STRATA_FRESH_TTL_SECS`, `STRATA_FRESH_CAPACITY`
    /// - `STRATA_FOCUS_CAPACITY`
    /// - `STRATA_DECAY_HALF_LIFE_DAYS`, `STRATA_DECAY_BATCH_SIZE`, `STRATA_ARCHIVE_RETENTION_DAYS`
    /// - `STRATA_PATTERN_MIN_SAMPLE`, `STRATA_PATTERN_MIN_CONFIDENCE`
    /// - `STRATA_EXTERNAL_TIMEOUT_MS`, `STRATA_EXTERNAL_MAX_RETRIES`
    /// - `OPENAI_API_KEY` (applied to configured OpenAI providers)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        if let Ok(path) = std::env::var("STRATA_DB_PATH") {
            config.db_path = match path.as_str() {
                ":memory:" => None,
                "default" => Some(default_db_path()),
                _ => Some(PathBuf::from(path)),
            };
        }
        if let Some(v) = parsed("STRATA_FRESH_TTL_SECS") {
            config.ingest.ttl_secs = v;
        }
        if let Some(v) = parsed("STRATA_FRESH_CAPACITY") {
            config.ingest.capacity = v;
        }
        if let Some(v) = parsed("STRATA_FOCUS_CAPACITY") {
            config.working_set.capacity = v;
        }
        if let Some(v) = parsed("STRATA_DECAY_HALF_LIFE_DAYS") {
            config.decay.half_life_days = v;
        }
        if let Some(v) = parsed("STRATA_DECAY_BATCH_SIZE") {
            config.decay.batch_size = v;
        }
        if let Some(v) = parsed("STRATA_ARCHIVE_RETENTION_DAYS") {
            config.decay.archive_retention_days = v;
        }
        if let Some(v) = parsed("STRATA_PATTERN_MIN_SAMPLE") {
            config.patterns.min_sample_size = v;
        }
        if let Some(v) = parsed("STRATA_PATTERN_MIN_CONFIDENCE") {
            config.patterns.min_confidence = v;
        }
        if let Some(v) = parsed("STRATA_EXTERNAL_TIMEOUT_MS") {
            config.external.timeout_ms = v;
        }
        if let Some(v) = parsed("STRATA_EXTERNAL_MAX_RETRIES") {
            config.external.retry.max_retries = v;
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if let Some(ref mut embedder) = config.embedder {
                embedder.config.api_key.get_or_insert(api_key.clone());
            }
            if let Some(ref mut compressor) = config.compressor {
                compressor.config.api_key.get_or_insert(api_key);
            }
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Check every section.
    pub fn validate(&self) -> StrataResult<()> {
        self.routing.validate()?;
        self.decay.validate()?;
        self.patterns.validate()?;
        if self.ingest.capacity == 0 {
            return Err(StrataError::Configuration(
                "ingest.capacity must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.working_set.admission_score)
            || !(0.0..=1.0).contains(&self.working_set.attention_decay)
        {
            return Err(StrataError::Configuration(
                "working_set.admission_score and attention_decay must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Decay interval with its floor applied.
    pub fn decay_interval_hours(&self) -> u64 {
        self.decay.interval_hours.max(MIN_INTERVAL_HOURS)
    }

    /// Pattern interval with its floor applied.
    pub fn pattern_interval_hours(&self) -> u64 {
        self.patterns.interval_hours.max(MIN_INTERVAL_HOURS)
    }
}

/// Builder for EngineConfig.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn ingest(mut self, config: IngestConfig) -> Self {
        self.config.ingest = config;
        self
    }

    pub fn working_set(mut self, config: WorkingSetConfig) -> Self {
        self.config.working_set = config;
        self
    }

    pub fn routing(mut self, config: RoutingConfig) -> Self {
        self.config.routing = config;
        self
    }

    pub fn decay(mut self, config: DecayConfig) -> Self {
        self.config.decay = config;
        self
    }

    pub fn patterns(mut self, config: PatternConfig) -> Self {
        self.config.patterns = config;
        self
    }

    pub fn external(mut self, config: ExternalCallConfig) -> Self {
        self.config.external = config;
        self
    }

    pub fn embedder(mut self, config: EmbedderProviderConfig) -> Self {
        self.config.embedder = Some(config);
        self
    }

    pub fn compressor(mut self, config: CompressorProviderConfig) -> Self {
        self.config.compressor = Some(config);
        self
    }

    /// Set the database path.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = Some(path.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.ingest.ttl_secs, 600);
        assert_eq!(config.ingest.capacity, 1000);
        assert_eq!(config.working_set.capacity, 7);
        assert_eq!(config.decay.interval_hours, 6);
        assert_eq!(config.decay.half_life_days, 30.0);
        assert_eq!(config.patterns.min_sample_size, 5);
        assert!(config.db_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[working_set]
capacity = 9

[decay]
half_life_days = 14.0

[compressor]
provider = "ollama"
model = "llama3.2"
"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.working_set.capacity, 9);
        assert_eq!(config.decay.half_life_days, 14.0);
        assert_eq!(config.decay.batch_size, 100);
        let compressor = config.compressor.unwrap();
        assert_eq!(compressor.config.model, "llama3.2");
    }

    #[test]
    fn test_from_json_file_validates() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, r#"{{"routing": {{"retain_score": 2.0}}}}"#).unwrap();
        assert!(EngineConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".ini").unwrap();
        assert!(EngineConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .working_set(WorkingSetConfig {
                capacity: 5,
                ..Default::default()
            })
            .db_path("/tmp/strata-test.db")
            .build();
        assert_eq!(config.working_set.capacity, 5);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/strata-test.db")));
    }

    #[test]
    fn test_interval_floor() {
        let mut config = EngineConfig::default();
        config.decay.interval_hours = 0;
        assert_eq!(config.decay_interval_hours(), 1);
    }

    #[test]
    fn test_default_db_path() {
        assert!(default_db_path().ends_with(".strata/strata.db"));
    }
}
