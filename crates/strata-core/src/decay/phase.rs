//! Compression phases representing how far a decaying memory has shrunk.
//!
//! A decaying memory moves through seven phases, highest fidelity first:
//! - Episodic: full detail
//! - Condensed / Summarized: progressively shorter renditions
//! - Semantic: the gist without episode detail
//! - PatternDescription: a one-line description of the behavior
//! - Intuitive: a few words of association
//! - Forgotten: nothing left, the item is deleted

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Strength floors for phases 0 through 5; anything below the last is forgotten.
pub const PHASE_FLOORS: [f64; 6] = [0.70, 0.50, 0.35, 0.20, 0.10, 0.05];

/// Token budgets for phases 0 through 6.
pub const PHASE_TOKEN_BUDGETS: [u32; 7] = [500, 350, 250, 150, 75, 50, 0];

/// Compression phase of a decaying memory.
///
/// Phases are ordered: comparing two phases compares their ordinal,
/// and a memory's phase only ever moves to a higher ordinal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecayPhase {
    /// Phase 0 (strength >= 0.70): full episodic detail, 500 tokens.
    Episodic,
    /// Phase 1 (0.50-0.70): 350 tokens.
    Condensed,
    /// Phase 2 (0.35-0.50): 250 tokens.
    Summarized,
    /// Phase 3 (0.20-0.35): semantic gist, 150 tokens.
    Semantic,
    /// Phase 4 (0.10-0.20): pattern description, 75 tokens.
    PatternDescription,
    /// Phase 5 (0.05-0.10): intuitive association, 50 tokens.
    Intuitive,
    /// Phase 6 (< 0.05): deleted.
    Forgotten,
}

impl DecayPhase {
    /// All phases in ordinal order.
    pub const ALL: [DecayPhase; 7] = [
        DecayPhase::Episodic,
        DecayPhase::Condensed,
        DecayPhase::Summarized,
        DecayPhase::Semantic,
        DecayPhase::PatternDescription,
        DecayPhase::Intuitive,
        DecayPhase::Forgotten,
    ];

    /// Map a strength to the phase whose range contains it.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_core::decay::DecayPhase;
    ///
    /// assert_eq!(DecayPhase::from_strength(0.9), DecayPhase::Episodic);
    /// assert_eq!(DecayPhase::from_strength(0.25), DecayPhase::Semantic);
    /// assert_eq!(DecayPhase::from_strength(0.01), DecayPhase::Forgotten);
    /// ```
    pub fn from_strength(strength: f64) -> Self {
        PHASE_FLOORS
            .iter()
            .position(|floor| strength >= *floor)
            .map(|idx| Self::ALL[idx])
            .unwrap_or(DecayPhase::Forgotten)
    }

    /// Ordinal index, 0 through 6.
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Phase for an ordinal index, if in range.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Representation size cap for this phase.
    pub fn token_budget(&self) -> u32 {
        PHASE_TOKEN_BUDGETS[self.index() as usize]
    }

    /// Get the next phase in the sequence.
    ///
    /// Returns None if already forgotten.
    pub fn next(&self) -> Option<DecayPhase> {
        Self::from_index(self.index() + 1)
    }

    /// Whether an item in this phase should be deleted.
    pub fn is_forgotten(&self) -> bool {
        matches!(self, DecayPhase::Forgotten)
    }

    /// Get a human-readable description of this phase.
    pub fn description(&self) -> &'static str {
        match self {
            DecayPhase::Episodic => "Episodic: full detail of the original capture.",
            DecayPhase::Condensed => "Condensed: minor detail trimmed.",
            DecayPhase::Summarized => "Summarized: the key points of the episode.",
            DecayPhase::Semantic => "Semantic: the meaning without episode detail.",
            DecayPhase::PatternDescription => "Pattern description: one line describing the behavior.",
            DecayPhase::Intuitive => "Intuitive: a faint association.",
            DecayPhase::Forgotten => "Forgotten: scheduled for deletion.",
        }
    }
}

impl Default for DecayPhase {
    fn default() -> Self {
        DecayPhase::Episodic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(DecayPhase::from_strength(1.0), DecayPhase::Episodic);
        assert_eq!(DecayPhase::from_strength(0.70), DecayPhase::Episodic);
        assert_eq!(DecayPhase::from_strength(0.6999), DecayPhase::Condensed);
        assert_eq!(DecayPhase::from_strength(0.50), DecayPhase::Condensed);
        assert_eq!(DecayPhase::from_strength(0.35), DecayPhase::Summarized);
        assert_eq!(DecayPhase::from_strength(0.20), DecayPhase::Semantic);
        assert_eq!(DecayPhase::from_strength(0.10), DecayPhase::PatternDescription);
        assert_eq!(DecayPhase::from_strength(0.05), DecayPhase::Intuitive);
        assert_eq!(DecayPhase::from_strength(0.0499), DecayPhase::Forgotten);
        assert_eq!(DecayPhase::from_strength(0.0), DecayPhase::Forgotten);
    }

    #[test]
    fn test_token_budgets_are_monotonic() {
        let budgets: Vec<u32> = DecayPhase::ALL.iter().map(|p| p.token_budget()).collect();
        assert_eq!(budgets, vec![500, 350, 250, 150, 75, 50, 0]);
        assert!(budgets.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_phase_ordering_and_index() {
        assert!(DecayPhase::Episodic < DecayPhase::Forgotten);
        for (i, phase) in DecayPhase::ALL.iter().enumerate() {
            assert_eq!(phase.index() as usize, i);
            assert_eq!(DecayPhase::from_index(i as u8), Some(*phase));
        }
        assert_eq!(DecayPhase::from_index(7), None);
    }

    #[test]
    fn test_next() {
        assert_eq!(DecayPhase::Episodic.next(), Some(DecayPhase::Condensed));
        assert_eq!(DecayPhase::Intuitive.next(), Some(DecayPhase::Forgotten));
        assert_eq!(DecayPhase::Forgotten.next(), None);
    }

    #[test]
    fn test_string_round_trip() {
        assert_eq!(DecayPhase::PatternDescription.to_string(), "pattern_description");
        assert_eq!(
            DecayPhase::from_str("semantic").unwrap(),
            DecayPhase::Semantic
        );
    }
}
