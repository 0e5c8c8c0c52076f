//! strata-core - Core library for strata.
//!
//! This crate provides the tiered memory engine: the ingest stage, the
//! working set, the routing classifier, durable tier storage, the decay
//! scheduler and the pattern aggregator, all behind [`MemoryRouter`].
//!
//! # Example
//!
//! ```ignore
//! use strata_core::{EngineConfig, IntuitionContext, MemoryRouter, SearchFilters, Signals};
//!
//! let router = MemoryRouter::new(EngineConfig::default(), None, None)?;
//!
//! // Capture a memory
//! let decision = router
//!     .add("Nailed the demo", Signals::new().with_success(true).with_emotional_intensity(0.8))
//!     .await?;
//!
//! // Search across tiers
//! let hits = router.search("demo", &SearchFilters::default()).await?;
//!
//! // Ask for an intuition
//! let hunch = router.gut_feeling(&IntuitionContext::for_topic("demo"));
//! ```

pub mod config;
pub mod decay;
pub mod error;
pub mod events;
pub mod external;
pub mod ingest;
pub mod patterns;
pub mod router;
pub mod routing;
pub mod runtime;
pub mod storage;
pub mod text;
pub mod traits;
pub mod types;
pub mod working_set;

// Re-export commonly used types
pub use config::{EngineConfig, EngineConfigBuilder};
pub use decay::{DecayConfig, DecayPhase, DecayReport, DecayScheduler, ResumeToken};
pub use error::{ErrorCode, StrataError, StrataResult};
pub use events::{EngineEvent, EventBus, EventSubscriber};
pub use external::{ExternalCallConfig, RetryPolicy};
pub use ingest::{FreshStage, IngestConfig, StagedItem};
pub use patterns::{AggregationReport, PatternAggregator, PatternConfig};
pub use router::{MemoryRouter, RouterStatus, TierCounts};
pub use routing::{RoutingClassifier, RoutingConfig, RoutingWeights};
pub use runtime::{BackgroundRuntime, RuntimeConfig};
pub use storage::TierStore;
pub use traits::{
    Compressor, CompressorConfig, CompressorProvider, CompressorProviderConfig, Embedder,
    EmbedderConfig, EmbedderProvider, EmbedderProviderConfig, TruncatingCompressor,
};
pub use types::{
    Intuition, IntuitionContext, MemoryItem, Pattern, PatternType, RoutingDecision, RoutingRule,
    SearchFilters, Signals, Tier,
};
pub use working_set::{WorkingSet, WorkingSetConfig};
