//! Search filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::memory_item::{MemoryItem, Tier};

fn default_limit() -> usize {
    10
}

fn default_record_access() -> bool {
    true
}

/// Filters applied to a cross-tier search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Restrict to these tiers (empty = all tiers including Fresh and Focus).
    #[serde(default)]
    pub tiers: Vec<Tier>,
    /// Only decaying items at or above this strength (non-decaying items pass).
    #[serde(default)]
    pub min_strength: Option<f64>,
    /// Only items created at or after this instant.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Only items with this topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Whether returned durable items count as accessed.
    #[serde(default = "default_record_access")]
    pub record_access: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            min_strength: None,
            since: None,
            topic: None,
            limit: default_limit(),
            record_access: default_record_access(),
        }
    }
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_strength(mut self, min_strength: f64) -> Self {
        self.min_strength = Some(min_strength);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn without_access_recording(mut self) -> Self {
        self.record_access = false;
        self
    }

    /// Whether a tier is in scope.
    pub fn includes_tier(&self, tier: Tier) -> bool {
        self.tiers.is_empty() || self.tiers.contains(&tier)
    }

    /// Whether an item passes every non-tier filter.
    pub fn matches(&self, item: &MemoryItem) -> bool {
        if let Some(since) = self.since {
            if item.created_at < since {
                return false;
            }
        }
        if let Some(ref topic) = self.topic {
            match item.topic {
                Some(ref t) if t.eq_ignore_ascii_case(topic) => {}
                _ => return false,
            }
        }
        if let (Some(min), Some(strength)) = (self.min_strength, item.strength) {
            if strength < min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signals;

    #[test]
    fn test_default_filters() {
        let f = SearchFilters::default();
        assert_eq!(f.limit, 10);
        assert!(f.record_access);
        assert!(f.includes_tier(Tier::Fresh));
    }

    #[test]
    fn test_matches_strength_and_topic() {
        let mut item = MemoryItem::new("x", Signals::new()).with_topic("gym");
        item.assign_tier(Tier::Decaying, 0.4);
        item.strength = Some(0.3);

        assert!(SearchFilters::new().with_min_strength(0.2).matches(&item));
        assert!(!SearchFilters::new().with_min_strength(0.5).matches(&item));
        assert!(SearchFilters::new().with_topic("GYM").matches(&item));
        assert!(!SearchFilters::new().with_topic("work").matches(&item));
    }
}
