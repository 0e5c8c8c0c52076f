//! Bounded FIFO with a per-item time-to-live.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{StrataError, StrataResult};
use crate::text::keyword_relevance;
use crate::types::MemoryItem;

/// Ingest stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Time-to-live of an unclassified item, in seconds.
    pub ttl_secs: u64,
    /// Maximum number of items held at once.
    pub capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            capacity: 1000,
        }
    }
}

/// An item waiting in the stage, stamped with when it arrived.
#[derive(Debug, Clone)]
pub struct StagedItem {
    pub item: MemoryItem,
    pub arrived_at: DateTime<Utc>,
}

/// Holds items between capture and classification.
///
/// The TTL runs from arrival in the stage, not from the item's capture time.
/// Requeued items keep their original arrival stamp, so expiry checks scan
/// the whole queue instead of trusting its order.
#[derive(Debug)]
pub struct FreshStage {
    config: IngestConfig,
    items: VecDeque<StagedItem>,
}

impl FreshStage {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            items: VecDeque::with_capacity(config.capacity.min(1024)),
            config,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::seconds(self.config.ttl_secs as i64)
    }

    fn is_expired(&self, staged: &StagedItem, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(staged.arrived_at) > self.ttl()
    }

    /// Admit an item arriving at `now`.
    ///
    /// At capacity, the longest-waiting expired item is evicted first and
    /// handed back so the caller can force-classify it. Rejects with
    /// `CapacityExceeded` only when nothing has expired.
    pub fn accept(&mut self, item: MemoryItem, now: DateTime<Utc>) -> StrataResult<Option<StagedItem>> {
        let mut evicted = None;
        if self.items.len() >= self.config.capacity {
            let oldest_expired = self
                .items
                .iter()
                .enumerate()
                .filter(|(_, staged)| self.is_expired(staged, now))
                .min_by_key(|(_, staged)| staged.arrived_at)
                .map(|(idx, _)| idx);
            let Some(idx) = oldest_expired else {
                return Err(StrataError::capacity_exceeded("fresh", self.config.capacity));
            };
            evicted = self.items.remove(idx);
            tracing::debug!(
                id = evicted.as_ref().map(|s| s.item.id.as_str()).unwrap_or_default(),
                "Evicted expired item from fresh stage"
            );
        }
        self.items.push_back(StagedItem {
            item,
            arrived_at: now,
        });
        Ok(evicted)
    }

    /// Remove an item once it has been classified.
    pub fn remove(&mut self, id: &str) -> Option<MemoryItem> {
        let idx = self.items.iter().position(|s| s.item.id == id)?;
        self.items.remove(idx).map(|s| s.item)
    }

    /// Put an item back after a failed classification, keeping its arrival stamp.
    pub fn requeue(&mut self, staged: StagedItem) {
        self.items.push_front(staged);
    }

    /// Look up a staged item.
    pub fn get(&self, id: &str) -> Option<&MemoryItem> {
        self.items.iter().find(|s| s.item.id == id).map(|s| &s.item)
    }

    /// Drain every item past its TTL, longest-waiting first.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<StagedItem> {
        let (mut expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|staged| self.is_expired(staged, now));
        self.items = kept.into();
        expired.sort_by_key(|staged| staged.arrived_at);
        expired
    }

    /// Keyword search over unexpired items; relevance is set on the returned copies.
    pub fn search(&self, query: &str, now: DateTime<Utc>) -> Vec<MemoryItem> {
        self.items
            .iter()
            .filter(|staged| !self.is_expired(staged, now))
            .filter_map(|staged| {
                let relevance = keyword_relevance(query, &staged.item.content);
                (relevance > 0.0).then(|| staged.item.clone().with_score(relevance))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Fraction of capacity in use.
    pub fn utilization(&self) -> f64 {
        if self.config.capacity == 0 {
            return 1.0;
        }
        self.items.len() as f64 / self.config.capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::Signals;

    fn stage(capacity: usize) -> FreshStage {
        FreshStage::new(IngestConfig {
            ttl_secs: 600,
            capacity,
        })
    }

    #[test]
    fn test_accept_until_full_then_reject() {
        let now = Utc::now();
        let mut fresh = stage(2);
        fresh.accept(MemoryItem::new_at("a", Signals::new(), now), now).unwrap();
        fresh.accept(MemoryItem::new_at("b", Signals::new(), now), now).unwrap();

        let err = fresh
            .accept(MemoryItem::new_at("c", Signals::new(), now), now)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CapFreshFull);
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn test_full_stage_evicts_oldest_expired_first() {
        let now = Utc::now();
        let old = now - Duration::minutes(11);
        let mut fresh = stage(2);
        let stale = MemoryItem::new_at("stale", Signals::new(), old);
        let stale_id = stale.id.clone();
        fresh.accept(stale, old).unwrap();
        fresh.accept(MemoryItem::new_at("b", Signals::new(), now), now).unwrap();

        let evicted = fresh
            .accept(MemoryItem::new_at("c", Signals::new(), now), now)
            .unwrap();
        assert_eq!(evicted.map(|s| s.item.id), Some(stale_id));
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn test_take_expired_and_search() {
        let now = Utc::now();
        let old = now - Duration::minutes(20);
        let mut fresh = stage(10);
        fresh
            .accept(MemoryItem::new_at("old gym note", Signals::new(), old), old)
            .unwrap();
        fresh
            .accept(MemoryItem::new_at("new gym note", Signals::new(), now), now)
            .unwrap();

        let hits = fresh.search("gym", now);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "new gym note");

        let expired = fresh.take_expired(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].item.content, "old gym note");
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_ttl_runs_from_arrival_not_capture() {
        let now = Utc::now();
        let mut fresh = stage(10);
        let backfilled = MemoryItem::new_at("captured an hour ago", Signals::new(), now - Duration::hours(1));
        fresh.accept(backfilled, now).unwrap();

        assert!(fresh.take_expired(now).is_empty());
        assert_eq!(fresh.search("captured", now).len(), 1);
        assert_eq!(fresh.take_expired(now + Duration::minutes(11)).len(), 1);
    }

    #[test]
    fn test_expired_item_behind_unexpired_one_is_found() {
        let now = Utc::now();
        let mut fresh = stage(2);
        fresh.accept(MemoryItem::new_at("recent", Signals::new(), now), now).unwrap();
        let waiting = MemoryItem::new_at("waiting", Signals::new(), now);
        let waiting_id = waiting.id.clone();
        fresh.items.push_back(StagedItem {
            item: waiting,
            arrived_at: now - Duration::minutes(30),
        });

        let evicted = fresh
            .accept(MemoryItem::new_at("newest", Signals::new(), now), now)
            .unwrap();
        assert_eq!(evicted.map(|s| s.item.id), Some(waiting_id));
        assert_eq!(fresh.len(), 2);
        assert!(fresh.take_expired(now).is_empty());
    }

    #[test]
    fn test_requeue_keeps_arrival_stamp() {
        let now = Utc::now();
        let old = now - Duration::minutes(20);
        let mut fresh = stage(10);
        fresh.accept(MemoryItem::new_at("late note", Signals::new(), old), old).unwrap();

        let mut expired = fresh.take_expired(now);
        assert_eq!(expired.len(), 1);
        fresh.requeue(expired.remove(0));
        assert_eq!(fresh.take_expired(now).len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut fresh = stage(10);
        let item = MemoryItem::new("x", Signals::new());
        let id = item.id.clone();
        fresh.accept(item, Utc::now()).unwrap();
        assert!(fresh.remove(&id).is_some());
        assert!(fresh.remove(&id).is_none());
        assert!(fresh.is_empty());
    }
}
