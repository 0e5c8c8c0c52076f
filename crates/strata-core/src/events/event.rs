//! Engine lifecycle event payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decay::DecayPhase;
use crate::types::{PatternType, RoutingRule, Tier};

/// Events emitted by the router, decay scheduler and pattern aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An item was classified and stored.
    Routed(RoutedEvent),
    /// A decaying item moved to a tighter compression phase.
    PhaseAdvanced(PhaseAdvancedEvent),
    /// A decaying item reached the forgotten phase and was deleted.
    Forgotten {
        item_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Archive items were removed after their retention period.
    Purged {
        item_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    /// A pattern was created or refreshed.
    PatternDetected(PatternDetectedEvent),
}

impl EngineEvent {
    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Routed(_) => "memory.routed",
            Self::PhaseAdvanced(_) => "memory.phase_advanced",
            Self::Forgotten { .. } => "memory.forgotten",
            Self::Purged { .. } => "memory.purged",
            Self::PatternDetected(_) => "pattern.detected",
        }
    }

    /// The single item this event concerns, if any.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Routed(e) => Some(&e.item_id),
            Self::PhaseAdvanced(e) => Some(&e.item_id),
            Self::Forgotten { item_id, .. } => Some(item_id),
            Self::Purged { .. } | Self::PatternDetected(_) => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Routed(e) => e.timestamp,
            Self::PhaseAdvanced(e) => e.timestamp,
            Self::Forgotten { timestamp, .. } | Self::Purged { timestamp, .. } => *timestamp,
            Self::PatternDetected(e) => e.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedEvent {
    pub item_id: String,
    pub tier: Tier,
    pub rule: RoutingRule,
    pub score: f64,
    /// Classified with the low-signal profile after expiring in the ingest stage.
    pub forced: bool,
    /// Also admitted to the working set.
    pub focused: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseAdvancedEvent {
    pub item_id: String,
    pub from: DecayPhase,
    pub to: DecayPhase,
    pub strength: f64,
    pub token_budget: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetectedEvent {
    pub pattern_id: String,
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub support_count: u32,
    pub timestamp: DateTime<Utc>,
}
