//! Routing signals attached to every captured item.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ErrorCode, StrataError, StrataResult};

/// Maximum number of forward-compatible extension entries per item.
pub const MAX_EXTENSIONS: usize = 16;

/// Value used for optional signals the caller did not supply.
pub const NEUTRAL_SIGNAL: f64 = 0.5;

/// The named inputs the routing classifier scores.
///
/// Numeric signals are normalized to `[0.0, 1.0]`. `novelty` and
/// `context_richness` are optional; when absent they contribute
/// [`NEUTRAL_SIGNAL`] to the weighted sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    /// Whether the captured action/turn succeeded.
    #[serde(default)]
    pub success: bool,
    /// Normalized recurrence score (0 = never seen, 1 = constantly recurring).
    #[serde(default)]
    pub repetition: f64,
    /// How critical the item is.
    #[serde(default)]
    pub criticality: f64,
    /// How new the information is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novelty: Option<f64>,
    /// How much surrounding context the item carries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_richness: Option<f64>,
    /// Strength of the detected emotional event.
    #[serde(default)]
    pub emotional_intensity: f64,
    /// Critical events that must never be lost.
    #[serde(default)]
    pub urgency: bool,
    /// Bounded bag of additional named values, carried but not scored.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Default for Signals {
    fn default() -> Self {
        Self {
            success: false,
            repetition: 0.0,
            criticality: 0.0,
            novelty: None,
            context_richness: None,
            emotional_intensity: 0.0,
            urgency: false,
            extensions: BTreeMap::new(),
        }
    }
}

impl Signals {
    /// Create an empty signal set (optional signals left neutral).
    pub fn new() -> Self {
        Self::default()
    }

    /// The profile used when an item must be classified without its own signals,
    /// e.g. when it outlived its time in the ingest stage.
    pub fn low_signal() -> Self {
        Self {
            novelty: Some(0.0),
            context_richness: Some(0.0),
            ..Self::default()
        }
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_repetition(mut self, repetition: f64) -> Self {
        self.repetition = repetition;
        self
    }

    pub fn with_criticality(mut self, criticality: f64) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn with_novelty(mut self, novelty: f64) -> Self {
        self.novelty = Some(novelty);
        self
    }

    pub fn with_context_richness(mut self, context_richness: f64) -> Self {
        self.context_richness = Some(context_richness);
        self
    }

    pub fn with_emotional_intensity(mut self, intensity: f64) -> Self {
        self.emotional_intensity = intensity;
        self
    }

    pub fn with_urgency(mut self, urgency: bool) -> Self {
        self.urgency = urgency;
        self
    }

    /// Attach an extension value.
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Novelty as scored (neutral when absent).
    pub fn novelty_or_neutral(&self) -> f64 {
        self.novelty.unwrap_or(NEUTRAL_SIGNAL)
    }

    /// Context richness as scored (neutral when absent).
    pub fn context_richness_or_neutral(&self) -> f64 {
        self.context_richness.unwrap_or(NEUTRAL_SIGNAL)
    }

    /// Check ranges and the extension bound.
    pub fn validate(&self) -> StrataResult<()> {
        let mut ranged = vec![
            ("repetition", self.repetition),
            ("criticality", self.criticality),
            ("emotional_intensity", self.emotional_intensity),
        ];
        if let Some(v) = self.novelty {
            ranged.push(("novelty", v));
        }
        if let Some(v) = self.context_richness {
            ranged.push(("context_richness", v));
        }

        for (name, value) in ranged {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(StrataError::signal_out_of_range(name, value));
            }
        }

        if self.extensions.len() > MAX_EXTENSIONS {
            return Err(StrataError::Validation {
                message: format!(
                    "{} signal extensions supplied, at most {} allowed",
                    self.extensions.len(),
                    MAX_EXTENSIONS
                ),
                code: ErrorCode::ValTooManyExtensions,
                suggestion: None,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_signals_default_to_neutral() {
        let signals = Signals::new();
        assert_eq!(signals.novelty_or_neutral(), NEUTRAL_SIGNAL);
        assert_eq!(signals.context_richness_or_neutral(), NEUTRAL_SIGNAL);

        let low = Signals::low_signal();
        assert_eq!(low.novelty_or_neutral(), 0.0);
        assert_eq!(low.context_richness_or_neutral(), 0.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = Signals::new().with_criticality(1.5).validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValSignalOutOfRange);

        let err = Signals::new().with_novelty(f64::NAN).validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValSignalOutOfRange);
    }

    #[test]
    fn test_validate_bounds_extensions() {
        let mut signals = Signals::new();
        for i in 0..=MAX_EXTENSIONS {
            signals = signals.with_extension(format!("k{}", i), serde_json::json!(i));
        }
        let err = signals.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValTooManyExtensions);
    }

    #[test]
    fn test_deserialize_partial_payload() {
        let signals: Signals =
            serde_json::from_str(r#"{"success": true, "criticality": 0.4}"#).unwrap();
        assert!(signals.success);
        assert_eq!(signals.criticality, 0.4);
        assert!(signals.novelty.is_none());
        assert!(signals.validate().is_ok());
    }
}
