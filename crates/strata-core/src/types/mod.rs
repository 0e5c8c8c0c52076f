//! Core types for strata.

mod decision;
mod filter;
mod memory_item;
mod pattern;
mod signals;

pub use decision::{RoutingDecision, RoutingRule};
pub use filter::SearchFilters;
pub use memory_item::{days_between, estimate_tokens, MemoryItem, Tier, CHARS_PER_TOKEN};
pub use pattern::{confidence, Intuition, IntuitionContext, Pattern, PatternType};
pub use signals::{Signals, MAX_EXTENSIONS, NEUTRAL_SIGNAL};
