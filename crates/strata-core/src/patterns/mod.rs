//! Pattern aggregation and intuition lookup.

mod aggregator;

pub use aggregator::{emotional_band, AggregationReport, PatternAggregator, PatternConfig};
