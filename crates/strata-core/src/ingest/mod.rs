//! Ingest stage ("Fresh"): bounded, time-limited holding area for new captures.

mod fresh;

pub use fresh::{FreshStage, IngestConfig, StagedItem};
