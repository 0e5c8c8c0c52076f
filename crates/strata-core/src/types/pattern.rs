//! Pattern and intuition types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Axis along which a recurring cluster was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatternType {
    /// Time-of-day / day-of-week clustering.
    Temporal,
    /// Repeated action -> outcome correlation.
    Behavioral,
    /// Topic -> emotion co-occurrence.
    Emotional,
    /// Event -> following event sequences.
    Causal,
}

impl PatternType {
    pub const ALL: [PatternType; 4] = [
        PatternType::Temporal,
        PatternType::Behavioral,
        PatternType::Emotional,
        PatternType::Causal,
    ];
}

/// A recurring signal cluster derived from several memory items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Deterministic id derived from type, antecedent and consequent.
    pub id: String,
    pub pattern_type: PatternType,
    /// What the cluster is conditioned on (a topic).
    pub antecedent: String,
    /// What tends to accompany the antecedent.
    pub consequent: String,
    pub description: String,
    /// Observations showing antecedent and consequent together.
    pub support_count: u32,
    /// Observations considered for this antecedent.
    pub total_observations: u32,
    /// Always `support_count / total_observations` as of `updated_at`.
    pub confidence: f64,
    /// Representative memory item ids (referenced, not copied).
    pub representative_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Pattern {
    /// Build a pattern; confidence is derived from the counts.
    pub fn new(
        pattern_type: PatternType,
        antecedent: impl Into<String>,
        consequent: impl Into<String>,
        support_count: u32,
        total_observations: u32,
        representative_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let antecedent = antecedent.into();
        let consequent = consequent.into();
        let id = Self::derive_id(pattern_type, &antecedent, &consequent);
        let description = describe(pattern_type, &antecedent, &consequent);
        Self {
            id,
            pattern_type,
            antecedent,
            consequent,
            description,
            support_count,
            total_observations,
            confidence: confidence(support_count, total_observations),
            representative_ids,
            updated_at: now,
        }
    }

    /// Stable id so re-aggregation updates the same record.
    pub fn derive_id(pattern_type: PatternType, antecedent: &str, consequent: &str) -> String {
        let key = format!("{}:{}:{}", pattern_type, antecedent, consequent);
        format!("{:x}", md5::compute(key.as_bytes()))
    }

    /// Whether `topic` names either side of this pattern.
    pub fn mentions(&self, topic: &str) -> bool {
        self.antecedent.eq_ignore_ascii_case(topic) || self.consequent.eq_ignore_ascii_case(topic)
    }
}

/// `support / total`, zero when nothing was observed.
pub fn confidence(support_count: u32, total_observations: u32) -> f64 {
    if total_observations == 0 {
        0.0
    } else {
        support_count as f64 / total_observations as f64
    }
}

fn describe(pattern_type: PatternType, antecedent: &str, consequent: &str) -> String {
    match pattern_type {
        PatternType::Temporal => format!("'{}' tends to come up in the {}", antecedent, consequent),
        PatternType::Behavioral => format!("'{}' usually {}", antecedent, consequent),
        PatternType::Emotional => format!("'{}' is usually {} emotionally", antecedent, consequent),
        PatternType::Causal => format!("'{}' is often followed by '{}'", antecedent, consequent),
    }
}

/// Partial context for an intuition lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntuitionContext {
    /// Topic the caller is currently dealing with.
    #[serde(default)]
    pub topic: Option<String>,
    /// Current emotional signal, 0-1.
    #[serde(default)]
    pub emotional_intensity: Option<f64>,
    /// Restrict to one axis.
    #[serde(default)]
    pub pattern_type: Option<PatternType>,
}

impl IntuitionContext {
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Default::default()
        }
    }

    pub fn with_emotional_intensity(mut self, intensity: f64) -> Self {
        self.emotional_intensity = Some(intensity);
        self
    }

    pub fn with_pattern_type(mut self, pattern_type: PatternType) -> Self {
        self.pattern_type = Some(pattern_type);
        self
    }
}

/// The pattern returned for a context query: a derived "likely association".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intuition {
    pub pattern: Pattern,
    pub confidence: f64,
    pub suggestion: String,
}

impl From<Pattern> for Intuition {
    fn from(pattern: Pattern) -> Self {
        Self {
            confidence: pattern.confidence,
            suggestion: pattern.description.clone(),
            pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_law() {
        let p = Pattern::new(PatternType::Behavioral, "deploys", "succeeds", 6, 8, vec![], Utc::now());
        assert_eq!(p.confidence, 6.0 / 8.0);
        assert_eq!(confidence(0, 0), 0.0);
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = Pattern::derive_id(PatternType::Causal, "standup", "coffee");
        let b = Pattern::derive_id(PatternType::Causal, "standup", "coffee");
        let c = Pattern::derive_id(PatternType::Temporal, "standup", "coffee");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_mentions() {
        let p = Pattern::new(PatternType::Causal, "standup", "coffee", 5, 5, vec![], Utc::now());
        assert!(p.mentions("Standup"));
        assert!(p.mentions("coffee"));
        assert!(!p.mentions("lunch"));
    }
}
