//! Router facade: the single surface through which items enter and leave the tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::decay::{DecayReport, DecayScheduler};
use crate::error::{StrataError, StrataResult};
use crate::events::{EngineEvent, EventBus, EventSubscriber, RoutedEvent};
use crate::external::call_external;
use crate::ingest::FreshStage;
use crate::patterns::{AggregationReport, PatternAggregator};
use crate::routing::RoutingClassifier;
use crate::storage::TierStore;
use crate::text::{dominant_keyword, keyword_relevance};
use crate::traits::{Compressor, Embedder, TruncatingCompressor};
use crate::types::{
    Intuition, IntuitionContext, MemoryItem, Pattern, RoutingDecision, RoutingRule, SearchFilters,
    Signals, Tier,
};
use crate::working_set::{FocusEntry, WorkingSet};

/// Weight of keyword relevance when blended with embedding similarity.
const KEYWORD_WEIGHT: f64 = 0.5;

/// Item counts for every tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub fresh: usize,
    pub focus: usize,
    pub permanent: usize,
    pub decaying: usize,
    pub pattern: usize,
    pub archive: usize,
}

impl TierCounts {
    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Fresh => self.fresh,
            Tier::Focus => self.focus,
            Tier::Permanent => self.permanent,
            Tier::Decaying => self.decaying,
            Tier::Pattern => self.pattern,
            Tier::Archive => self.archive,
        }
    }

    /// Items held in durable storage.
    pub fn durable(&self) -> usize {
        self.permanent + self.decaying + self.pattern + self.archive
    }
}

/// Snapshot returned by [`MemoryRouter::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterStatus {
    pub tiers: TierCounts,
    /// Fraction of the ingest stage in use.
    pub fresh_utilization: f64,
    /// Fraction of the working set in use.
    pub focus_utilization: f64,
    pub focus_capacity: usize,
    pub pattern_count: usize,
    /// Tokens saved by compression plus tokens reclaimed by forgetting.
    pub token_savings: u64,
    pub forgotten_items: u64,
    pub purged_items: u64,
    pub decisions_recorded: usize,
    pub decay_running: bool,
}

/// The engine's public surface.
///
/// Constructed once per process and shared by reference (or `Arc`). Every
/// write into a tier store goes through here.
pub struct MemoryRouter {
    config: EngineConfig,
    store: TierStore,
    classifier: RoutingClassifier,
    fresh: Mutex<FreshStage>,
    focus: Mutex<WorkingSet>,
    decay: DecayScheduler,
    patterns: PatternAggregator,
    embedder: Option<Arc<dyn Embedder>>,
    events: EventBus,
    cancel: CancellationToken,
}

impl MemoryRouter {
    /// Create a router, opening the store at `config.db_path` (in-memory when unset).
    ///
    /// Without a compressor, phase advancement falls back to truncation.
    pub fn new(
        config: EngineConfig,
        embedder: Option<Arc<dyn Embedder>>,
        compressor: Option<Arc<dyn Compressor>>,
    ) -> StrataResult<Self> {
        let store = match config.db_path {
            Some(ref path) => TierStore::new(path)?,
            None => TierStore::in_memory()?,
        };
        Self::with_store(config, store, embedder, compressor)
    }

    /// Create a router over an existing store.
    pub fn with_store(
        config: EngineConfig,
        store: TierStore,
        embedder: Option<Arc<dyn Embedder>>,
        compressor: Option<Arc<dyn Compressor>>,
    ) -> StrataResult<Self> {
        config.validate()?;

        let events = EventBus::new();
        let compressor: Arc<dyn Compressor> =
            compressor.unwrap_or_else(|| Arc::new(TruncatingCompressor::new()));
        let decay = DecayScheduler::new(
            store.clone(),
            compressor,
            config.decay.clone(),
            config.external.clone(),
            events.clone(),
        );
        let patterns = PatternAggregator::new(store.clone(), config.patterns.clone(), events.clone())?;

        info!(
            focus_capacity = config.working_set.effective_capacity(),
            fresh_capacity = config.ingest.capacity,
            embedder = embedder.as_ref().map(|e| e.model_name()).unwrap_or("none"),
            "Memory router ready"
        );

        Ok(Self {
            classifier: RoutingClassifier::new(config.routing.clone()),
            fresh: Mutex::new(FreshStage::new(config.ingest.clone())),
            focus: Mutex::new(WorkingSet::new(&config.working_set)),
            config,
            store,
            decay,
            patterns,
            embedder,
            events,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn fresh(&self) -> StrataResult<MutexGuard<'_, FreshStage>> {
        self.fresh
            .lock()
            .map_err(|e| StrataError::internal(format!("ingest stage lock poisoned: {}", e)))
    }

    fn focus(&self) -> StrataResult<MutexGuard<'_, WorkingSet>> {
        self.focus
            .lock()
            .map_err(|e| StrataError::internal(format!("working set lock poisoned: {}", e)))
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Capture and route a new item.
    pub async fn add(&self, content: impl Into<String>, signals: Signals) -> StrataResult<RoutingDecision> {
        self.add_item(MemoryItem::new(content, signals)).await
    }

    /// Capture and route a new item under an explicit topic.
    pub async fn add_with_topic(
        &self,
        content: impl Into<String>,
        signals: Signals,
        topic: impl Into<String>,
    ) -> StrataResult<RoutingDecision> {
        self.add_item(MemoryItem::new(content, signals).with_topic(topic))
            .await
    }

    /// Route a prepared item.
    pub async fn add_item(&self, item: MemoryItem) -> StrataResult<RoutingDecision> {
        self.add_item_at(item, Utc::now()).await
    }

    /// Route a prepared item as of `now`.
    ///
    /// The item passes through the ingest stage, is classified, persisted
    /// with its routing decision in one transaction, and is only then
    /// released from the stage. On failure it leaves the stage and the
    /// error is returned; no partial state remains.
    pub async fn add_item_at(&self, item: MemoryItem, now: DateTime<Utc>) -> StrataResult<RoutingDecision> {
        let item = self.prepare(item)?;
        self.sweep_expired(now)?;
        self.admit_to_fresh(item.clone(), now)?;
        self.route(item, now).await
    }

    /// Place an item in the ingest stage without classifying it yet.
    ///
    /// It is routed by [`classify_staged`](Self::classify_staged), or
    /// force-classified by a later sweep once its TTL elapses.
    pub fn stage(&self, content: impl Into<String>, signals: Signals) -> StrataResult<String> {
        self.stage_item_at(MemoryItem::new(content, signals), Utc::now())
    }

    /// Stage a prepared item as of `now`.
    pub fn stage_item_at(&self, item: MemoryItem, now: DateTime<Utc>) -> StrataResult<String> {
        let item = self.prepare(item)?;
        let id = item.id.clone();
        self.admit_to_fresh(item, now)?;
        debug!(item_id = %id, "Staged item");
        Ok(id)
    }

    /// Place an item in the ingest stage, force-classifying whatever it evicts.
    ///
    /// If the evicted item cannot be recorded it goes back into the stage and
    /// the new item is withdrawn, so the stage is left as it was.
    fn admit_to_fresh(&self, item: MemoryItem, now: DateTime<Utc>) -> StrataResult<()> {
        let id = item.id.clone();
        let Some(evicted) = self.fresh()?.accept(item, now)? else {
            return Ok(());
        };
        let retry = evicted.clone();
        if let Err(e) = self.force_classify(evicted.item, now) {
            warn!(
                item_id = %id,
                evicted = %retry.item.id,
                error = %e,
                "Failed to record evicted item, rejecting arrival"
            );
            let mut fresh = self.fresh()?;
            fresh.remove(&id);
            fresh.requeue(retry);
            return Err(e);
        }
        Ok(())
    }

    /// Route a staged item now.
    pub async fn classify_staged(&self, id: &str) -> StrataResult<RoutingDecision> {
        let item = self
            .fresh()?
            .get(id)
            .cloned()
            .ok_or_else(|| StrataError::not_found(id))?;
        self.route(item, Utc::now()).await
    }

    fn prepare(&self, mut item: MemoryItem) -> StrataResult<MemoryItem> {
        if item.content.trim().is_empty() {
            return Err(StrataError::validation("content must not be empty"));
        }
        item.signals.validate()?;
        if item.topic.is_none() {
            item.topic = dominant_keyword(&item.content);
        }
        Ok(item)
    }

    /// Classify, persist and release an item currently held in the ingest stage.
    async fn route(&self, mut item: MemoryItem, now: DateTime<Utc>) -> StrataResult<RoutingDecision> {
        if item.embedding.is_none() {
            item.embedding = self.embed(&item.content).await;
        }

        let decision = self.classifier.classify(&item, now);
        item.assign_tier(decision.tier, decision.score);

        if item.over_budget() {
            match self.decay.fit(&item.content, item.token_budget).await {
                Ok(text) => item.content = text,
                Err(e) => warn!(
                    item_id = %item.id,
                    budget = item.token_budget,
                    error = %e,
                    "Compression at ingest failed, leaving it to the next decay pass"
                ),
            }
        }

        let persisted = match decision.tier {
            Tier::Pattern => self.store.insert_or_fold_pattern(&item, &decision, now),
            _ => self
                .store
                .insert_routed(&item, &decision)
                .map(|()| (item.clone(), decision.clone())),
        };
        let id = item.id.clone();
        self.fresh()?.remove(&id);
        let (stored, decision) = match persisted {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(item_id = %id, error = %e, "Failed to persist routed item");
                return Err(e);
            }
        };

        let focused = self.admits_to_focus(&decision);
        if focused {
            let attention = if decision.rule == RoutingRule::Urgency {
                1.0
            } else {
                decision.score
            };
            self.focus()?.admit(stored.clone(), attention);
        }

        debug!(
            item_id = %id,
            stored_as = %stored.id,
            tier = %decision.tier,
            rule = %decision.rule,
            score = decision.score,
            focused,
            "Routed item"
        );

        self.events.emit(EngineEvent::Routed(RoutedEvent {
            item_id: id,
            tier: decision.tier,
            rule: decision.rule,
            score: decision.score,
            forced: false,
            focused,
            timestamp: now,
        }));

        Ok(decision)
    }

    fn admits_to_focus(&self, decision: &RoutingDecision) -> bool {
        decision.rule == RoutingRule::Urgency
            || decision.score >= self.config.working_set.admission_score
    }

    fn force_classify(&self, item: MemoryItem, now: DateTime<Utc>) -> StrataResult<RoutingDecision> {
        let mut decision = self
            .classifier
            .classify_signals(&item.id, &Signals::low_signal(), now);
        decision.forced = true;

        let mut stored = item;
        stored.assign_tier(decision.tier, decision.score);
        self.store.insert_routed(&stored, &decision)?;

        debug!(item_id = %stored.id, tier = %decision.tier, "Force-classified expired item");
        self.events.emit(EngineEvent::Routed(RoutedEvent {
            item_id: stored.id,
            tier: decision.tier,
            rule: decision.rule,
            score: decision.score,
            forced: true,
            focused: false,
            timestamp: now,
        }));
        Ok(decision)
    }

    /// Force-classify every ingest item past its TTL. Returns how many were swept.
    fn sweep_expired(&self, now: DateTime<Utc>) -> StrataResult<usize> {
        let expired = self.fresh()?.take_expired(now);
        if expired.is_empty() {
            return Ok(0);
        }

        let mut swept = 0;
        let mut pending = expired.into_iter();
        while let Some(staged) = pending.next() {
            let retry = staged.clone();
            if let Err(e) = self.force_classify(staged.item, now) {
                // Put the unrecorded items back so a later sweep retries them.
                let mut fresh = self.fresh()?;
                for staged in pending.rev() {
                    fresh.requeue(staged);
                }
                fresh.requeue(retry);
                return Err(e);
            }
            swept += 1;
        }
        info!(swept, "Swept expired ingest items");
        Ok(swept)
    }

    async fn embed(&self, content: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match call_external("embedding", &self.config.external, || embedder.embed(content)).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(model = embedder.model_name(), error = %e, "Embedding failed, storing without embedding");
                None
            }
        }
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Cross-tier search ordered by relevance, then recency.
    pub async fn search(&self, query: &str, filters: &SearchFilters) -> StrataResult<Vec<MemoryItem>> {
        let now = Utc::now();
        let mut candidates: Vec<MemoryItem> = Vec::new();

        if filters.includes_tier(Tier::Fresh) {
            candidates.extend(self.fresh()?.search(query, now));
        }
        if filters.includes_tier(Tier::Focus) {
            candidates.extend(self.focus()?.search(query));
        }

        let durable: Vec<Tier> = Tier::DURABLE
            .iter()
            .copied()
            .filter(|t| filters.includes_tier(*t))
            .collect();
        if !durable.is_empty() {
            let semantic = self.semantic_scores(query, &durable, filters.limit).await?;
            for item in self.store.list_tiers(&durable, filters.since)? {
                let keyword = keyword_relevance(query, &item.content);
                let relevance = match semantic.get(&item.id) {
                    Some(sim) => KEYWORD_WEIGHT * keyword + (1.0 - KEYWORD_WEIGHT) * sim.max(0.0),
                    None => keyword,
                };
                if relevance > 0.0 {
                    candidates.push(item.with_score(relevance));
                }
            }
        }

        candidates.retain(|item| filters.matches(item));
        candidates.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut seen = HashSet::new();
        candidates.retain(|item| seen.insert(item.id.clone()));
        candidates.truncate(filters.limit);

        if filters.record_access {
            self.record_hits(&mut candidates, now)?;
        }

        debug!(query, results = candidates.len(), "Search complete");
        Ok(candidates)
    }

    async fn semantic_scores(
        &self,
        query: &str,
        tiers: &[Tier],
        limit: usize,
    ) -> StrataResult<HashMap<String, f64>> {
        let Some(vector) = self.embed(query).await else {
            return Ok(HashMap::new());
        };
        let k = limit.saturating_mul(4).max(limit);
        Ok(self
            .store
            .nearest(&vector, k, tiers)?
            .into_iter()
            .map(|(item, sim)| (item.id, sim))
            .collect())
    }

    fn record_hits(&self, hits: &mut [MemoryItem], now: DateTime<Utc>) -> StrataResult<()> {
        let mut focus = self.focus()?;
        for hit in hits.iter_mut() {
            focus.touch(&hit.id, now);
            // Working-set copies share their id with the durable row.
            let Some(updated) = self.store.record_access(&hit.id, now)? else {
                continue;
            };
            if hit.tier.is_durable() {
                let score = hit.score;
                *hit = updated;
                hit.score = score;
            } else {
                hit.access_count = updated.access_count;
                hit.last_accessed_at = updated.last_accessed_at;
            }
        }
        Ok(())
    }

    /// Fetch an item by id, recording the access.
    ///
    /// A repeat that was folded into an existing pattern item resolves to
    /// that item.
    pub fn get(&self, id: &str) -> StrataResult<MemoryItem> {
        let now = Utc::now();
        let stored_id = self
            .store
            .get_decision(id)?
            .and_then(|d| d.merged_into)
            .unwrap_or_else(|| id.to_string());
        if let Some(item) = self.store.record_access(&stored_id, now)? {
            self.focus()?.touch(&stored_id, now);
            return Ok(item);
        }
        self.fresh()?
            .get(id)
            .cloned()
            .ok_or_else(|| StrataError::not_found(id))
    }

    /// The routing decision recorded for an item.
    pub fn decision_for(&self, item_id: &str) -> StrataResult<Option<RoutingDecision>> {
        self.store.get_decision(item_id)
    }

    /// Working set members, highest attention first.
    pub fn focus_entries(&self) -> StrataResult<Vec<FocusEntry>> {
        Ok(self.focus()?.entries())
    }

    // =========================================================================
    // Background operations
    // =========================================================================

    /// Run a decay pass outside the schedule.
    pub async fn trigger_decay(&self) -> StrataResult<DecayReport> {
        self.trigger_decay_at(Utc::now()).await
    }

    /// Run a decay pass evaluated as of `now`.
    pub async fn trigger_decay_at(&self, now: DateTime<Utc>) -> StrataResult<DecayReport> {
        if self.decay.is_running() {
            return Err(StrataError::decay_in_progress());
        }
        let swept = self.sweep_expired(now)?;
        let mut report = self.decay.run_pass_at(now, &self.cancel).await?;
        report.swept = swept;

        if !report.forgotten_ids.is_empty() {
            let mut focus = self.focus()?;
            for id in &report.forgotten_ids {
                focus.remove(id);
            }
        }
        Ok(report)
    }

    /// Re-run pattern aggregation outside the schedule.
    pub fn refresh_patterns(&self) -> StrataResult<AggregationReport> {
        self.patterns.aggregate()
    }

    /// Re-run pattern aggregation as of `now`.
    pub fn refresh_patterns_at(&self, now: DateTime<Utc>) -> StrataResult<AggregationReport> {
        self.patterns.aggregate_at(now)
    }

    /// Current pattern snapshot.
    pub fn patterns(&self) -> Arc<Vec<Pattern>> {
        self.patterns.patterns()
    }

    /// The strongest learned association for a context, if any clears the floor.
    pub fn gut_feeling(&self, context: &IntuitionContext) -> Option<Intuition> {
        self.patterns.query(context)
    }

    /// Per-tier counts, utilization and token savings.
    pub fn status(&self) -> StrataResult<RouterStatus> {
        let durable = self.store.count_by_tier()?;
        let counters = self.store.counters()?;
        let (fresh_len, fresh_utilization) = {
            let fresh = self.fresh()?;
            (fresh.len(), fresh.utilization())
        };
        let (focus_len, focus_utilization, focus_capacity) = {
            let focus = self.focus()?;
            (focus.len(), focus.utilization(), focus.capacity())
        };
        let count = |tier: Tier| durable.get(&tier).copied().unwrap_or(0);

        Ok(RouterStatus {
            tiers: TierCounts {
                fresh: fresh_len,
                focus: focus_len,
                permanent: count(Tier::Permanent),
                decaying: count(Tier::Decaying),
                pattern: count(Tier::Pattern),
                archive: count(Tier::Archive),
            },
            fresh_utilization,
            focus_utilization,
            focus_capacity,
            pattern_count: self.patterns.patterns().len(),
            token_savings: self.store.compressed_token_savings()? + counters.reclaimed_tokens,
            forgotten_items: counters.forgotten_items,
            purged_items: counters.purged_items,
            decisions_recorded: self.store.count_decisions()?,
            decay_running: self.decay.is_running(),
        })
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stop any running decay pass at the next item boundary; later passes stop immediately.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn router() -> MemoryRouter {
        MemoryRouter::new(EngineConfig::default(), None, None).unwrap()
    }

    struct OfflineCompressor;

    #[async_trait::async_trait]
    impl Compressor for OfflineCompressor {
        async fn compress(&self, _content: &str, _target_tokens: u32) -> StrataResult<String> {
            Err(StrataError::compression("service unavailable"))
        }

        fn name(&self) -> &str {
            "offline"
        }
    }

    fn breakfast() -> Signals {
        Signals::new()
            .with_repetition(0.8)
            .with_criticality(0.3)
            .with_emotional_intensity(0.1)
    }

    #[tokio::test]
    async fn test_add_records_decision_and_empties_fresh() {
        let router = router();
        let decision = router
            .add("Shipped the release", Signals::new().with_success(true).with_criticality(0.5))
            .await
            .unwrap();

        assert_eq!(decision.tier, Tier::Decaying);
        let stored = router.decision_for(&decision.item_id).unwrap().unwrap();
        assert_eq!(stored.tier, decision.tier);
        assert_eq!(stored.rule, decision.rule);
        assert_eq!(stored.score, decision.score);

        let status = router.status().unwrap();
        assert_eq!(status.tiers.fresh, 0);
        assert_eq!(status.tiers.decaying, 1);
        assert_eq!(status.decisions_recorded, 1);
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let router = router();
        assert!(router.add("   ", Signals::new()).await.is_err());
        assert_eq!(router.status().unwrap().decisions_recorded, 0);
    }

    #[tokio::test]
    async fn test_topic_is_derived_from_content() {
        let router = router();
        let decision = router
            .add("gym session, gym was packed", Signals::new())
            .await
            .unwrap();
        let item = router.get(&decision.item_id).unwrap();
        assert_eq!(item.topic.as_deref(), Some("gym"));
    }

    #[tokio::test]
    async fn test_urgent_item_enters_focus() {
        let router = router();
        let decision = router
            .add("Server is down", Signals::low_signal().with_urgency(true))
            .await
            .unwrap();
        assert_eq!(decision.tier, Tier::Permanent);
        let entries = router.focus_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attention, 1.0);
    }

    #[tokio::test]
    async fn test_stage_then_classify() {
        let router = router();
        let id = router.stage("draft note", Signals::new()).unwrap();
        assert_eq!(router.status().unwrap().tiers.fresh, 1);
        assert_eq!(router.get(&id).unwrap().tier, Tier::Fresh);

        let decision = router.classify_staged(&id).await.unwrap();
        assert_eq!(decision.item_id, id);
        assert!(!decision.forced);
        assert_eq!(router.status().unwrap().tiers.fresh, 0);
    }

    #[tokio::test]
    async fn test_expired_staged_item_is_force_classified_on_decay() {
        let router = router();
        let past = Utc::now() - Duration::minutes(30);
        let item = MemoryItem::new_at("forgotten draft", Signals::new().with_success(true), past);
        let id = router.stage_item_at(item, past).unwrap();

        let report = router.trigger_decay().await.unwrap();
        assert_eq!(report.swept, 1);
        let decision = router.decision_for(&id).unwrap().unwrap();
        assert!(decision.forced);
        assert_eq!(decision.tier, Tier::Archive);
    }

    #[tokio::test]
    async fn test_search_records_access_for_working_set_hits() {
        let router = router();
        let decision = router
            .add(
                "Booked flights to Lisbon",
                Signals::new().with_success(true).with_criticality(1.0),
            )
            .await
            .unwrap();
        assert_eq!(decision.tier, Tier::Decaying);
        assert_eq!(router.focus_entries().unwrap().len(), 1);

        let hits = router.search("Lisbon", &SearchFilters::new()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].access_count, 1);

        let durable_only = SearchFilters::new()
            .with_tiers(vec![Tier::Decaying])
            .without_access_recording();
        let hits = router.search("Lisbon", &durable_only).await.unwrap();
        assert_eq!(hits[0].access_count, 1);
    }

    #[tokio::test]
    async fn test_recurring_item_is_stored_once() {
        let router = router();
        let mut decisions = Vec::new();
        for _ in 0..10 {
            decisions.push(router.add("Skipped breakfast again", breakfast()).await.unwrap());
        }
        let first = decisions[0].item_id.clone();
        assert!(decisions.iter().all(|d| d.tier == Tier::Pattern));
        assert!(decisions[0].merged_into.is_none());
        assert!(decisions[1..]
            .iter()
            .all(|d| d.merged_into.as_deref() == Some(first.as_str())));

        let status = router.status().unwrap();
        assert_eq!(status.tiers.pattern, 1);
        assert_eq!(status.decisions_recorded, 10);
        assert_eq!(router.store.get(&first).unwrap().unwrap().access_count, 9);

        // A later arrival's id resolves to the row it was folded into.
        let resolved = router.get(&decisions[9].item_id).unwrap();
        assert_eq!(resolved.id, first);
    }

    #[tokio::test]
    async fn test_long_decaying_capture_is_fitted_at_ingest() {
        let router = router();
        let decision = router
            .add("word ".repeat(800), Signals::new().with_success(true))
            .await
            .unwrap();
        assert_eq!(decision.tier, Tier::Decaying);

        let item = router.store.get(&decision.item_id).unwrap().unwrap();
        assert_eq!(item.original_tokens, 1000);
        assert_eq!(item.token_budget, 500);
        assert!(crate::types::estimate_tokens(&item.content) <= 500);
        assert!(router.status().unwrap().token_savings >= 500);
    }

    #[tokio::test]
    async fn test_ingest_fit_failure_is_left_for_decay() {
        let mut config = EngineConfig::default();
        config.external.timeout_ms = 100;
        config.external.retry.max_retries = 1;
        config.external.retry.initial_delay_ms = 1;
        config.external.retry.max_delay_ms = 1;
        let router = MemoryRouter::new(config, None, Some(Arc::new(OfflineCompressor))).unwrap();

        let content = "word ".repeat(800);
        let decision = router
            .add(content.clone(), Signals::new().with_success(true))
            .await
            .unwrap();
        let item = router.store.get(&decision.item_id).unwrap().unwrap();
        assert_eq!(item.content, content);
        assert!(item.over_budget());

        let report = router.trigger_decay().await.unwrap();
        assert_eq!(report.deferred, 1);
    }

    #[tokio::test]
    async fn test_failed_eviction_leaves_stage_unchanged() {
        let mut config = EngineConfig::default();
        config.ingest.capacity = 1;
        let router = MemoryRouter::new(config, None, None).unwrap();
        let now = Utc::now();
        router
            .add_item_at(MemoryItem::new_at("first copy", Signals::new(), now).with_id("dup"), now)
            .await
            .unwrap();

        // Same id as a stored item, so recording it on eviction fails.
        let past = now - Duration::minutes(30);
        router
            .stage_item_at(MemoryItem::new_at("second copy", Signals::new(), past).with_id("dup"), past)
            .unwrap();

        let newcomer = MemoryItem::new_at("newcomer", Signals::new(), now);
        let newcomer_id = newcomer.id.clone();
        assert!(router.stage_item_at(newcomer, now).is_err());

        assert_eq!(router.status().unwrap().tiers.fresh, 1);
        let staged = router.fresh().unwrap().get("dup").map(|i| i.content.clone());
        assert_eq!(staged.as_deref(), Some("second copy"));
        assert!(router.classify_staged(&newcomer_id).await.is_err());
        assert_eq!(router.status().unwrap().decisions_recorded, 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_passes() {
        let router = router();
        router
            .add("standard note", Signals::new().with_success(true))
            .await
            .unwrap();
        router.shutdown();
        let report = router.trigger_decay().await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
    }
}
