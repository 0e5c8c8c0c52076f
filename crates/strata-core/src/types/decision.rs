//! Routing decision audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::memory_item::Tier;
use super::signals::Signals;

/// Which classification rule produced a decision, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoutingRule {
    /// Rule 1: urgency override.
    Urgency,
    /// Rule 2: high score, success and strong emotion.
    HighValue,
    /// Rule 3: recurring behavior.
    Recurring,
    /// Rule 4: standard retained memory.
    Standard,
    /// Rule 5: nothing else matched.
    LowValue,
}

impl RoutingRule {
    /// The tier this rule routes to.
    pub fn tier(&self) -> Tier {
        match self {
            RoutingRule::Urgency | RoutingRule::HighValue => Tier::Permanent,
            RoutingRule::Recurring => Tier::Pattern,
            RoutingRule::Standard => Tier::Decaying,
            RoutingRule::LowValue => Tier::Archive,
        }
    }
}

/// Immutable audit record of a single classification.
///
/// Exactly one is written per arrival event, in the same transaction as the
/// item it describes, so routing can be replayed from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The classified item.
    pub item_id: String,
    /// Signals as they were when the item was classified.
    pub signals: Signals,
    /// Weighted score after the emotional multiplier.
    pub score: f64,
    /// Tier the item was routed to.
    pub tier: Tier,
    /// Rule that fired.
    pub rule: RoutingRule,
    /// Distance from the nearest threshold, normalized to [0, 1]. Audit only.
    pub confidence: f64,
    /// Both the high-value and the recurring rule matched; rule order decided.
    pub ambiguous: bool,
    /// The item was classified with the low-signal profile after expiring in Fresh.
    #[serde(default)]
    pub forced: bool,
    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
    /// Pattern-tier item this arrival repeated and was folded into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_into: Option<String>,
}
