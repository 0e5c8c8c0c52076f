//! Memory item types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::signals::Signals;
use crate::decay::DecayPhase;

/// Rough characters-per-token ratio used for token estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Where a memory item currently lives.
///
/// Fresh and Focus are staging areas; the remaining four are durable stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tier {
    /// Ingest holding area, not yet classified.
    Fresh,
    /// Working set of currently relevant items.
    Focus,
    /// Never decays.
    Permanent,
    /// Subject to compression.
    Decaying,
    /// Recurring, learnable behavior.
    Pattern,
    /// Low value, purged after a retention period.
    Archive,
}

impl Tier {
    /// The four durable tiers, in display order.
    pub const DURABLE: [Tier; 4] = [Tier::Permanent, Tier::Decaying, Tier::Pattern, Tier::Archive];

    /// Whether items in this tier are persisted in the tier store.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Tier::Fresh | Tier::Focus)
    }
}

/// Estimate the token count of a piece of text.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_TOKEN) as u32
}

/// A captured piece of information stored in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier for the item.
    pub id: String,
    /// The current representation (shrinks as the item decays).
    pub content: String,
    /// Optional embedding vector, opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Current tier.
    pub tier: Tier,
    /// Topic key used by pattern mining and intuition lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last retrieval timestamp.
    pub last_accessed_at: DateTime<Utc>,
    /// Number of retrievals since creation.
    pub access_count: u32,
    /// Signal snapshot captured at ingestion.
    pub signals: Signals,
    /// Weighted score computed when the item was routed.
    #[serde(default)]
    pub routing_score: f64,
    /// Retention strength (decaying items only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    /// Compression phase (decaying items only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<DecayPhase>,
    /// Representation size cap implied by the phase.
    pub token_budget: u32,
    /// Token estimate of the content as originally captured.
    pub original_tokens: u32,
    /// When the decay scheduler last recomputed this item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_decay_at: Option<DateTime<Utc>>,
    /// Relevance score (from search).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl MemoryItem {
    /// Create a new item in the Fresh tier.
    pub fn new(content: impl Into<String>, signals: Signals) -> Self {
        Self::new_at(content, signals, Utc::now())
    }

    /// Create a new item in the Fresh tier with an explicit creation time.
    pub fn new_at(content: impl Into<String>, signals: Signals, now: DateTime<Utc>) -> Self {
        let content = content.into();
        let original_tokens = estimate_tokens(&content);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            embedding: None,
            tier: Tier::Fresh,
            topic: None,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            signals,
            routing_score: 0.0,
            strength: None,
            phase: None,
            token_budget: original_tokens,
            original_tokens,
            last_decay_at: None,
            score: None,
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set the score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Place the item into its routed tier, initializing decay state if needed.
    pub fn assign_tier(&mut self, tier: Tier, routing_score: f64) {
        self.tier = tier;
        self.routing_score = routing_score;
        if tier == Tier::Decaying {
            self.strength = Some(1.0);
            self.phase = Some(DecayPhase::Episodic);
            self.token_budget = DecayPhase::Episodic.token_budget();
        } else {
            self.strength = None;
            self.phase = None;
        }
    }

    /// Record a retrieval.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Whether a decaying item's content is larger than its phase budget.
    pub fn over_budget(&self) -> bool {
        self.tier == Tier::Decaying && estimate_tokens(&self.content) > self.token_budget
    }

    /// Tokens saved relative to the original capture, measured on the stored content.
    pub fn token_savings(&self) -> u64 {
        if self.tier != Tier::Decaying {
            return 0;
        }
        self.original_tokens
            .saturating_sub(estimate_tokens(&self.content)) as u64
    }

    /// Age in fractional days at `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        days_between(self.created_at, now)
    }

    /// Fractional days since last retrieval at `now`.
    pub fn days_since_access(&self, now: DateTime<Utc>) -> f64 {
        days_between(self.last_accessed_at, now)
    }
}

/// Fractional days from `earlier` to `later`, floored at zero.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let secs = later.signed_duration_since(earlier).num_milliseconds() as f64 / 1000.0;
    (secs / 86_400.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    #[test]
    fn test_new_item_is_fresh() {
        let item = MemoryItem::new("Had coffee with Sam", Signals::new());
        assert_eq!(item.tier, Tier::Fresh);
        assert_eq!(item.access_count, 0);
        assert!(item.strength.is_none());
        assert_eq!(item.original_tokens, 5);
    }

    #[test]
    fn test_assign_decaying_initializes_state() {
        let mut item = MemoryItem::new("content", Signals::new());
        item.assign_tier(Tier::Decaying, 0.4);
        assert_eq!(item.strength, Some(1.0));
        assert_eq!(item.phase, Some(DecayPhase::Episodic));
        assert_eq!(item.token_budget, 500);

        item.assign_tier(Tier::Permanent, 0.9);
        assert!(item.strength.is_none());
        assert!(item.phase.is_none());
    }

    #[test]
    fn test_over_budget_and_savings_follow_stored_content() {
        let mut item = MemoryItem::new("word ".repeat(800), Signals::new());
        item.assign_tier(Tier::Decaying, 0.4);
        assert_eq!(item.original_tokens, 1000);
        assert!(item.over_budget());
        assert_eq!(item.token_savings(), 0);

        item.content = "word ".repeat(400);
        assert!(!item.over_budget());
        assert_eq!(item.token_savings(), 500);

        item.assign_tier(Tier::Permanent, 0.9);
        assert!(!item.over_budget());
        assert_eq!(item.token_savings(), 0);
    }

    #[test]
    fn test_touch_and_days() {
        let now = Utc::now();
        let mut item = MemoryItem::new_at("x", Signals::new(), now - Duration::days(3));
        assert!((item.age_days(now) - 3.0).abs() < 1e-9);
        item.touch(now);
        assert_eq!(item.access_count, 1);
        assert_eq!(item.days_since_access(now), 0.0);
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_tier_strings() {
        assert_eq!(Tier::Decaying.to_string(), "decaying");
        assert_eq!(Tier::from_str("archive").unwrap(), Tier::Archive);
        assert!(Tier::Permanent.is_durable());
        assert!(!Tier::Focus.is_durable());
    }
}
