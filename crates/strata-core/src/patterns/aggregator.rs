//! Mines recurring clusters from stored items.
//!
//! Observations are topic-tagged items in the Decaying, Permanent and
//! Pattern tiers. For each topic (the antecedent) and each axis, the most
//! common consequent forms a cluster:
//!
//! - temporal: the part of day, or the weekday when that clusters tighter
//! - behavioral: whether the captured action succeeded
//! - emotional: the emotional intensity band
//! - causal: the topic of the next observation within the causal window
//!
//! A cluster is kept as a [`Pattern`] once its support and confidence clear
//! the configured floors. Queries are served from an in-memory snapshot so
//! they never wait on an aggregation run or on ingestion.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::error::{StrataError, StrataResult};
use crate::events::{EngineEvent, EventBus, PatternDetectedEvent};
use crate::storage::TierStore;
use crate::types::{Intuition, IntuitionContext, MemoryItem, Pattern, PatternType, Tier};

/// Pattern aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Hours between scheduled aggregation runs.
    pub interval_hours: u64,
    /// Minimum supporting observations for a pattern.
    pub min_sample_size: u32,
    /// Minimum `support / total` for a pattern.
    pub min_confidence: f64,
    /// Window for the causal axis.
    pub causal_window_hours: u64,
    /// Representative item ids kept per pattern.
    pub max_representatives: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            interval_hours: 6,
            min_sample_size: 5,
            min_confidence: 0.6,
            causal_window_hours: 24,
            max_representatives: 5,
        }
    }
}

impl PatternConfig {
    pub fn validate(&self) -> StrataResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(StrataError::Configuration(format!(
                "patterns.min_confidence = {} must lie in [0, 1]",
                self.min_confidence
            )));
        }
        if self.min_sample_size == 0 {
            return Err(StrataError::Configuration(
                "patterns.min_sample_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of an aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationReport {
    /// Topic-tagged items considered.
    pub observations: usize,
    /// Patterns created or refreshed.
    pub detected: usize,
    /// Stored patterns that no longer clear the floors.
    pub removed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Intensity band used by the emotional axis.
pub fn emotional_band(intensity: f64) -> &'static str {
    if intensity >= 0.7 {
        "intense"
    } else if intensity >= 0.3 {
        "moderate"
    } else {
        "calm"
    }
}

fn daypart(at: DateTime<Utc>) -> &'static str {
    match at.hour() {
        0..=5 => "night",
        6..=11 => "morning",
        12..=17 => "afternoon",
        _ => "evening",
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Consequent -> supporting item ids, for one antecedent on one axis.
type Tally = BTreeMap<String, Vec<String>>;

/// The most supported consequent; ties go to the alphabetically first.
fn modal(tally: &Tally) -> Option<(&String, &Vec<String>)> {
    tally
        .iter()
        .fold(None, |best: Option<(&String, &Vec<String>)>, (k, ids)| match best {
            Some((_, best_ids)) if best_ids.len() >= ids.len() => best,
            _ => Some((k, ids)),
        })
}

/// Detects patterns and answers intuition queries.
pub struct PatternAggregator {
    store: TierStore,
    config: PatternConfig,
    events: EventBus,
    snapshot: RwLock<Arc<Vec<Pattern>>>,
}

impl PatternAggregator {
    /// Create an aggregator, loading previously stored patterns.
    pub fn new(store: TierStore, config: PatternConfig, events: EventBus) -> StrataResult<Self> {
        let existing = store.list_patterns()?;
        Ok(Self {
            store,
            config,
            events,
            snapshot: RwLock::new(Arc::new(existing)),
        })
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Current patterns, highest confidence first.
    pub fn patterns(&self) -> Arc<Vec<Pattern>> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Scan the tiers and rewrite the pattern store.
    pub fn aggregate(&self) -> StrataResult<AggregationReport> {
        self.aggregate_at(Utc::now())
    }

    pub fn aggregate_at(&self, now: DateTime<Utc>) -> StrataResult<AggregationReport> {
        let mut observations: Vec<MemoryItem> = self
            .store
            .list_tiers(&[Tier::Decaying, Tier::Permanent, Tier::Pattern], None)?
            .into_iter()
            .filter(|item| item.topic.is_some())
            .collect();
        observations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut report = AggregationReport {
            observations: observations.len(),
            detected: 0,
            removed: 0,
            started_at: now,
            completed_at: None,
        };

        let detected = self.detect(&observations, now);
        let keep: HashSet<&str> = detected.iter().map(|p| p.id.as_str()).collect();

        for pattern in &detected {
            self.store.upsert_pattern(pattern)?;
            self.events.emit(EngineEvent::PatternDetected(PatternDetectedEvent {
                pattern_id: pattern.id.clone(),
                pattern_type: pattern.pattern_type,
                confidence: pattern.confidence,
                support_count: pattern.support_count,
                timestamp: now,
            }));
        }
        for stale in self.store.list_patterns()? {
            if !keep.contains(stale.id.as_str()) && self.store.delete_pattern(&stale.id)? {
                debug!(pattern_id = %stale.id, "Removed pattern below threshold");
                report.removed += 1;
            }
        }
        report.detected = detected.len();

        let refreshed = self.store.list_patterns()?;
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Arc::new(refreshed),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(refreshed),
        }

        report.completed_at = Some(Utc::now());
        info!(
            observations = report.observations,
            detected = report.detected,
            removed = report.removed,
            "Pattern aggregation complete"
        );
        Ok(report)
    }

    /// Clusters that clear the floors, from observations sorted by creation time.
    pub fn detect(&self, observations: &[MemoryItem], now: DateTime<Utc>) -> Vec<Pattern> {
        let mut by_topic: BTreeMap<String, Vec<&MemoryItem>> = BTreeMap::new();
        for item in observations {
            if let Some(topic) = item.topic.as_deref() {
                by_topic.entry(topic.to_lowercase()).or_default().push(item);
            }
        }

        let mut patterns = Vec::new();
        for (topic, items) in &by_topic {
            let total = items.len() as u32;

            let mut dayparts = Tally::new();
            let mut weekdays = Tally::new();
            let mut outcomes = Tally::new();
            let mut bands = Tally::new();
            for item in items {
                let id = item.id.clone();
                dayparts.entry(daypart(item.created_at).to_string()).or_default().push(id.clone());
                weekdays
                    .entry(weekday_name(item.created_at.weekday()).to_string())
                    .or_default()
                    .push(id.clone());
                let outcome = if item.signals.success { "succeeds" } else { "fails" };
                outcomes.entry(outcome.to_string()).or_default().push(id.clone());
                bands
                    .entry(emotional_band(item.signals.emotional_intensity).to_string())
                    .or_default()
                    .push(id);
            }

            // Weekday only wins when strictly tighter than part of day.
            let temporal = match (modal(&dayparts), modal(&weekdays)) {
                (Some(d), Some(w)) if w.1.len() > d.1.len() => Some(w),
                (d, _) => d,
            };
            let candidates = [
                (PatternType::Temporal, temporal, total),
                (PatternType::Behavioral, modal(&outcomes), total),
                (PatternType::Emotional, modal(&bands), total),
            ];
            for (pattern_type, cluster, total) in candidates {
                if let Some((consequent, ids)) = cluster {
                    if let Some(p) = self.cluster(pattern_type, topic, consequent, ids, total, now) {
                        patterns.push(p);
                    }
                }
            }
        }

        patterns.extend(self.causal(observations, now));
        patterns
    }

    fn causal(&self, observations: &[MemoryItem], now: DateTime<Utc>) -> Vec<Pattern> {
        let window = Duration::hours(self.config.causal_window_hours as i64);
        let mut tallies: BTreeMap<String, (Tally, u32)> = BTreeMap::new();

        for (idx, item) in observations.iter().enumerate() {
            let Some(topic) = item.topic.as_deref().map(str::to_lowercase) else {
                continue;
            };
            let successor = observations[idx + 1..]
                .iter()
                .take_while(|next| next.created_at - item.created_at <= window)
                .find_map(|next| {
                    next.topic
                        .as_deref()
                        .map(str::to_lowercase)
                        .filter(|t| *t != topic)
                });
            if let Some(next_topic) = successor {
                let (tally, total) = tallies.entry(topic).or_default();
                tally.entry(next_topic).or_default().push(item.id.clone());
                *total += 1;
            }
        }

        tallies
            .iter()
            .filter_map(|(topic, (tally, total))| {
                let (consequent, ids) = modal(tally)?;
                self.cluster(PatternType::Causal, topic, consequent, ids, *total, now)
            })
            .collect()
    }

    fn cluster(
        &self,
        pattern_type: PatternType,
        antecedent: &str,
        consequent: &str,
        ids: &[String],
        total: u32,
        now: DateTime<Utc>,
    ) -> Option<Pattern> {
        let support = ids.len() as u32;
        if support < self.config.min_sample_size {
            return None;
        }
        let representatives = ids.iter().take(self.config.max_representatives).cloned().collect();
        let pattern = Pattern::new(pattern_type, antecedent, consequent, support, total, representatives, now);
        (pattern.confidence >= self.config.min_confidence).then_some(pattern)
    }

    /// The highest-confidence pattern matching `context`, if any clears the floor.
    pub fn query(&self, context: &IntuitionContext) -> Option<Intuition> {
        let band = context.emotional_intensity.map(emotional_band);
        let snapshot = self.patterns();

        snapshot
            .iter()
            .filter(|p| p.confidence >= self.config.min_confidence)
            .filter(|p| context.pattern_type.map_or(true, |t| p.pattern_type == t))
            .filter(|p| context.topic.as_deref().map_or(true, |t| p.mentions(t)))
            .filter(|p| match (p.pattern_type, band) {
                (PatternType::Emotional, Some(band)) => p.consequent == band,
                _ => true,
            })
            .max_by(|a, b| {
                a.confidence
                    .total_cmp(&b.confidence)
                    .then_with(|| a.support_count.cmp(&b.support_count))
                    .then_with(|| b.id.cmp(&a.id))
            })
            .cloned()
            .map(Intuition::from)
    }
}
