//! Weighted multi-signal classifier.
//!
//! The score is a weighted sum of the item's signals, scaled by an emotional
//! multiplier and clamped to `[0, 1]`. Rules are evaluated in a fixed order
//! and the first match wins:
//!
//! 1. urgency -> Permanent
//! 2. high score, success and strong emotion -> Permanent
//! 3. high repetition above the pattern floor -> Pattern
//! 4. score above the retention floor -> Decaying
//! 5. otherwise -> Archive
//!
//! Classification reads nothing but the signal snapshot and static
//! configuration, so the same snapshot always yields the same decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};
use crate::types::{MemoryItem, RoutingDecision, RoutingRule, Signals};

/// Weights of the five scored signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingWeights {
    pub success: f64,
    pub repetition: f64,
    pub criticality: f64,
    pub novelty: f64,
    pub context_richness: f64,
}

impl Default for RoutingWeights {
    fn default() -> Self {
        Self {
            success: 0.35,
            repetition: 0.25,
            criticality: 0.20,
            novelty: 0.15,
            context_richness: 0.05,
        }
    }
}

impl RoutingWeights {
    fn as_array(&self) -> [(&'static str, f64); 5] {
        [
            ("success", self.success),
            ("repetition", self.repetition),
            ("criticality", self.criticality),
            ("novelty", self.novelty),
            ("context_richness", self.context_richness),
        ]
    }
}

/// Classifier thresholds and modifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub weights: RoutingWeights,
    /// Extra multiplier at full emotional intensity (1.0 + boost * intensity).
    pub emotional_boost: f64,
    /// Rule 2 score threshold.
    pub permanent_score: f64,
    /// Rule 2 emotional intensity threshold.
    pub permanent_emotion: f64,
    /// Rule 3 repetition threshold.
    pub pattern_repetition: f64,
    /// Rule 3 score floor.
    pub pattern_min_score: f64,
    /// Rule 4 score threshold.
    pub retain_score: f64,
    /// Threshold distance that maps to full confidence.
    pub confidence_scale: f64,
    /// Confidence ceiling when two specific rules matched.
    pub ambiguous_confidence_cap: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            weights: RoutingWeights::default(),
            emotional_boost: 0.3,
            permanent_score: 0.85,
            permanent_emotion: 0.7,
            pattern_repetition: 0.6,
            pattern_min_score: 0.35,
            retain_score: 0.35,
            confidence_scale: 0.15,
            ambiguous_confidence_cap: 0.25,
        }
    }
}

impl RoutingConfig {
    /// Check that weights and thresholds are usable.
    pub fn validate(&self) -> StrataResult<()> {
        let unit = [
            ("permanent_score", self.permanent_score),
            ("permanent_emotion", self.permanent_emotion),
            ("pattern_repetition", self.pattern_repetition),
            ("pattern_min_score", self.pattern_min_score),
            ("retain_score", self.retain_score),
            ("emotional_boost", self.emotional_boost),
            ("ambiguous_confidence_cap", self.ambiguous_confidence_cap),
        ];
        for (name, value) in self.weights.as_array().into_iter().chain(unit) {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(StrataError::Configuration(format!(
                    "routing.{} = {} must lie in [0, 1]",
                    name, value
                )));
            }
        }
        if self.confidence_scale <= 0.0 {
            return Err(StrataError::Configuration(
                "routing.confidence_scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deterministic tier classifier.
#[derive(Debug, Clone, Default)]
pub struct RoutingClassifier {
    config: RoutingConfig,
}

impl RoutingClassifier {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Weighted sum before modifiers.
    pub fn weighted_sum(&self, signals: &Signals) -> f64 {
        let w = &self.config.weights;
        let success = if signals.success { 1.0 } else { 0.0 };
        w.success * success
            + w.repetition * signals.repetition
            + w.criticality * signals.criticality
            + w.novelty * signals.novelty_or_neutral()
            + w.context_richness * signals.context_richness_or_neutral()
    }

    /// Emotional multiplier, 1.0 at intensity 0 up to `1 + emotional_boost` at 1.0.
    pub fn emotional_multiplier(&self, signals: &Signals) -> f64 {
        1.0 + self.config.emotional_boost * signals.emotional_intensity.clamp(0.0, 1.0)
    }

    /// Final score in `[0, 1]`.
    pub fn score(&self, signals: &Signals) -> f64 {
        (self.weighted_sum(signals) * self.emotional_multiplier(signals)).clamp(0.0, 1.0)
    }

    /// Every rule the snapshot satisfies, in evaluation order.
    pub fn matching_rules(&self, signals: &Signals, score: f64) -> Vec<RoutingRule> {
        let c = &self.config;
        let mut rules = Vec::with_capacity(5);
        if signals.urgency {
            rules.push(RoutingRule::Urgency);
        }
        if score >= c.permanent_score
            && signals.success
            && signals.emotional_intensity >= c.permanent_emotion
        {
            rules.push(RoutingRule::HighValue);
        }
        if signals.repetition >= c.pattern_repetition && score >= c.pattern_min_score {
            rules.push(RoutingRule::Recurring);
        }
        if score >= c.retain_score {
            rules.push(RoutingRule::Standard);
        }
        rules.push(RoutingRule::LowValue);
        rules
    }

    /// Classify an item's signal snapshot.
    pub fn classify(&self, item: &MemoryItem, now: DateTime<Utc>) -> RoutingDecision {
        self.classify_signals(&item.id, &item.signals, now)
    }

    /// Classify a signal snapshot on behalf of `item_id`.
    pub fn classify_signals(
        &self,
        item_id: &str,
        signals: &Signals,
        now: DateTime<Utc>,
    ) -> RoutingDecision {
        let score = self.score(signals);
        let rules = self.matching_rules(signals, score);
        let rule = rules.first().copied().unwrap_or(RoutingRule::LowValue);

        // Rules 4 and 5 are fallbacks; a conflict means both specific rules matched.
        let ambiguous = rule != RoutingRule::Urgency
            && rules.contains(&RoutingRule::HighValue)
            && rules.contains(&RoutingRule::Recurring);

        let confidence = self.confidence(rule, score, ambiguous);

        tracing::debug!(
            item_id,
            score,
            rule = %rule,
            tier = %rule.tier(),
            confidence,
            ambiguous,
            "Classified item"
        );

        RoutingDecision {
            item_id: item_id.to_string(),
            signals: signals.clone(),
            score,
            tier: rule.tier(),
            rule,
            confidence,
            ambiguous,
            forced: false,
            decided_at: now,
            merged_into: None,
        }
    }

    fn confidence(&self, rule: RoutingRule, score: f64, ambiguous: bool) -> f64 {
        if rule == RoutingRule::Urgency {
            return 1.0;
        }
        let c = &self.config;
        // Only thresholds the score has not reached count; clearing them all is full confidence.
        let nearest = [c.retain_score, c.pattern_min_score, c.permanent_score]
            .iter()
            .filter(|t| score < **t)
            .map(|t| t - score)
            .fold(f64::INFINITY, f64::min);
        let confidence = (nearest / c.confidence_scale).clamp(0.0, 1.0);
        if ambiguous {
            confidence.min(c.ambiguous_confidence_cap)
        } else {
            confidence
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tier;

    fn classify(signals: Signals) -> RoutingDecision {
        RoutingClassifier::default().classify_signals("item", &signals, Utc::now())
    }

    #[test]
    fn test_high_value_scenario_is_permanent() {
        let d = classify(
            Signals::new()
                .with_success(true)
                .with_repetition(0.1)
                .with_criticality(1.0)
                .with_emotional_intensity(0.9),
        );
        assert_eq!(d.tier, Tier::Permanent);
        assert_eq!(d.rule, RoutingRule::HighValue);
        assert!(d.score >= 0.85);
    }

    #[test]
    fn test_recurring_scenario_is_pattern() {
        let d = classify(
            Signals::new()
                .with_repetition(0.8)
                .with_criticality(0.3)
                .with_emotional_intensity(0.1),
        );
        assert_eq!(d.tier, Tier::Pattern);
        assert_eq!(d.rule, RoutingRule::Recurring);
    }

    #[test]
    fn test_all_zero_is_archive() {
        let d = classify(Signals::low_signal());
        assert_eq!(d.tier, Tier::Archive);
        assert_eq!(d.score, 0.0);
    }

    #[test]
    fn test_urgency_overrides_everything() {
        let d = classify(Signals::low_signal().with_urgency(true));
        assert_eq!(d.tier, Tier::Permanent);
        assert_eq!(d.rule, RoutingRule::Urgency);
        assert_eq!(d.confidence, 1.0);
        assert!(!d.ambiguous);
    }

    #[test]
    fn test_standard_retention() {
        let d = classify(Signals::new().with_success(true));
        // 0.35 + 0.075 + 0.025
        assert!((d.score - 0.45).abs() < 1e-9);
        assert_eq!(d.tier, Tier::Decaying);
    }

    #[test]
    fn test_confidence_measures_distance_to_next_unmet_threshold() {
        // 0.16 + 0.075 + 0.025: 0.09 short of the retain threshold.
        let near_miss = classify(Signals::new().with_criticality(0.8));
        assert_eq!(near_miss.tier, Tier::Archive);
        assert!((near_miss.confidence - 0.6).abs() < 1e-9);

        // 0.45 already clears the retain threshold; only 0.85 is still ahead.
        let retained = classify(Signals::new().with_success(true));
        assert_eq!(retained.tier, Tier::Decaying);
        assert_eq!(retained.confidence, 1.0);

        let almost_permanent = classify(
            Signals::new()
                .with_success(true)
                .with_criticality(1.0)
                .with_emotional_intensity(0.8),
        );
        assert!(almost_permanent.score < 0.85);
        assert!(almost_permanent.confidence < 0.5);
    }

    #[test]
    fn test_emotional_multiplier_range() {
        let c = RoutingClassifier::default();
        assert_eq!(c.emotional_multiplier(&Signals::new()), 1.0);
        let full = Signals::new().with_emotional_intensity(1.0);
        assert!((c.emotional_multiplier(&full) - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = RoutingClassifier::default();
        let signals = Signals::new()
            .with_success(true)
            .with_repetition(0.7)
            .with_criticality(0.4)
            .with_novelty(0.2)
            .with_emotional_intensity(0.5);
        let now = Utc::now();
        let first = c.classify_signals("x", &signals, now);
        for _ in 0..100 {
            let again = c.classify_signals("x", &signals, now);
            assert_eq!(again.tier, first.tier);
            assert_eq!(again.confidence, first.confidence);
            assert_eq!(again.score, first.score);
        }
    }

    #[test]
    fn test_permanent_and_pattern_overlap_is_ambiguous() {
        let d = classify(
            Signals::new()
                .with_success(true)
                .with_repetition(0.9)
                .with_criticality(1.0)
                .with_emotional_intensity(1.0),
        );
        assert_eq!(d.tier, Tier::Permanent);
        assert!(d.ambiguous);
        assert!(d.confidence <= 0.25);
    }

    #[test]
    fn test_config_validation() {
        assert!(RoutingConfig::default().validate().is_ok());
        let bad = RoutingConfig {
            retain_score: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
