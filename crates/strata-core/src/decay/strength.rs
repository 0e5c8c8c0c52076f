//! Retention strength formula.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};
use crate::types::MemoryItem;

/// Decay scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Hours between scheduled passes.
    pub interval_hours: u64,
    /// Days for the base strength to halve.
    pub half_life_days: f64,
    /// Days for the recency bonus to halve after the last access.
    pub recency_half_life_days: f64,
    /// Access count at which the repetition bonus saturates.
    pub repetition_cap: u32,
    /// Items processed per batch.
    pub batch_size: usize,
    /// Days an Archive item is kept before it is purged.
    pub archive_retention_days: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            interval_hours: 6,
            half_life_days: 30.0,
            recency_half_life_days: 7.0,
            repetition_cap: 10,
            batch_size: 100,
            archive_retention_days: 7,
        }
    }
}

impl DecayConfig {
    pub fn validate(&self) -> StrataResult<()> {
        if !(self.half_life_days > 0.0) || !(self.recency_half_life_days > 0.0) {
            return Err(StrataError::Configuration(
                "decay half-lives must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 || self.repetition_cap == 0 {
            return Err(StrataError::Configuration(
                "decay.batch_size and decay.repetition_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `0.5 ^ (days_since_created / half_life_days)`.
pub fn base_strength(days_since_created: f64, half_life_days: f64) -> f64 {
    0.5f64.powf(days_since_created.max(0.0) / half_life_days)
}

/// Every factor of a strength computation, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthBreakdown {
    pub base: f64,
    /// 1.0 or 1.2.
    pub success_mult: f64,
    /// 1.0 to 1.3, highest right after an access.
    pub recency_mult: f64,
    /// 1.0 to 1.5 with access count.
    pub repetition_mult: f64,
    /// 1.2 to 1.5 with criticality.
    pub criticality_mult: f64,
    /// Product of the above, clamped to [0, 1].
    pub strength: f64,
}

/// Computes retention strength for decaying items.
#[derive(Debug, Clone, Default)]
pub struct StrengthModel {
    config: DecayConfig,
}

impl StrengthModel {
    pub fn new(config: DecayConfig) -> Self {
        Self { config }
    }

    pub fn success_mult(success: bool) -> f64 {
        if success {
            1.2
        } else {
            1.0
        }
    }

    pub fn recency_mult(&self, days_since_access: f64) -> f64 {
        1.0 + 0.3 * 0.5f64.powf(days_since_access.max(0.0) / self.config.recency_half_life_days)
    }

    pub fn repetition_mult(&self, access_count: u32) -> f64 {
        let cap = self.config.repetition_cap.max(1);
        1.0 + 0.5 * access_count.min(cap) as f64 / cap as f64
    }

    pub fn criticality_mult(criticality: f64) -> f64 {
        1.2 + 0.3 * criticality.clamp(0.0, 1.0)
    }

    /// Strength of `item` as of `now`.
    pub fn compute(&self, item: &MemoryItem, now: DateTime<Utc>) -> StrengthBreakdown {
        let base = base_strength(item.age_days(now), self.config.half_life_days);
        let success_mult = Self::success_mult(item.signals.success);
        let recency_mult = self.recency_mult(item.days_since_access(now));
        let repetition_mult = self.repetition_mult(item.access_count);
        let criticality_mult = Self::criticality_mult(item.signals.criticality);
        let strength =
            (base * success_mult * recency_mult * repetition_mult * criticality_mult).clamp(0.0, 1.0);

        StrengthBreakdown {
            base,
            success_mult,
            recency_mult,
            repetition_mult,
            criticality_mult,
            strength,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signals;
    use chrono::Duration;

    #[test]
    fn test_base_is_exactly_half_at_half_life() {
        assert_eq!(base_strength(30.0, 30.0), 0.5);
        assert_eq!(base_strength(0.0, 30.0), 1.0);
        assert_eq!(base_strength(60.0, 30.0), 0.25);
    }

    #[test]
    fn test_multiplier_ranges() {
        let model = StrengthModel::default();
        assert_eq!(StrengthModel::success_mult(false), 1.0);
        assert_eq!(StrengthModel::success_mult(true), 1.2);

        assert!((model.recency_mult(0.0) - 1.3).abs() < 1e-12);
        assert!(model.recency_mult(365.0) < 1.0001);

        assert_eq!(model.repetition_mult(0), 1.0);
        assert_eq!(model.repetition_mult(10), 1.5);
        assert_eq!(model.repetition_mult(50), 1.5);

        assert_eq!(StrengthModel::criticality_mult(0.0), 1.2);
        assert!((StrengthModel::criticality_mult(1.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_compute_at_half_life() {
        let now = Utc::now();
        let created = now - Duration::days(30);
        let item = MemoryItem::new_at("x", Signals::new(), created);
        let b = StrengthModel::default().compute(&item, now);
        assert_eq!(b.base, 0.5);
        // Last access was at creation, 30 days ago.
        let expected = 0.5 * 1.0 * (1.0 + 0.3 * 0.5f64.powf(30.0 / 7.0)) * 1.0 * 1.2;
        assert!((b.strength - expected).abs() < 1e-9);
    }

    #[test]
    fn test_strength_is_clamped() {
        let item = MemoryItem::new("x", Signals::new().with_success(true).with_criticality(1.0));
        let b = StrengthModel::default().compute(&item, Utc::now());
        assert_eq!(b.strength, 1.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(DecayConfig::default().validate().is_ok());
        let bad = DecayConfig {
            half_life_days: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
