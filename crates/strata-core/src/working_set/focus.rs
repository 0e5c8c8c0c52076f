//! Capacity-bounded working set with attention-weighted eviction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::keyword_relevance;
use crate::types::{MemoryItem, Tier};

/// Smallest allowed working-set capacity.
pub const MIN_CAPACITY: usize = 5;
/// Largest allowed working-set capacity.
pub const MAX_CAPACITY: usize = 9;

/// Working set configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingSetConfig {
    /// Number of slots; clamped to 5..=9.
    pub capacity: usize,
    /// Attention lost by every existing member on each admission.
    pub attention_decay: f64,
    /// Minimum routing score for admission (urgent items are always admitted).
    pub admission_score: f64,
}

impl Default for WorkingSetConfig {
    fn default() -> Self {
        Self {
            capacity: 7,
            attention_decay: 0.1,
            admission_score: 0.5,
        }
    }
}

impl WorkingSetConfig {
    /// Capacity after clamping to the supported range.
    pub fn effective_capacity(&self) -> usize {
        self.capacity.clamp(MIN_CAPACITY, MAX_CAPACITY)
    }
}

/// A member of the working set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusEntry {
    /// Mirror of the durable item; `tier` is the durable tier it was routed to.
    pub item: MemoryItem,
    /// Current attention weight.
    pub attention: f64,
}

/// The working set. Callers serialize access (the router holds it behind a
/// mutex), so check-capacity, evict and insert happen as one step.
#[derive(Debug)]
pub struct WorkingSet {
    capacity: usize,
    attention_decay: f64,
    entries: Vec<FocusEntry>,
}

impl WorkingSet {
    pub fn new(config: &WorkingSetConfig) -> Self {
        let capacity = config.effective_capacity();
        Self {
            capacity,
            attention_decay: config.attention_decay.max(0.0),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Admit an item with an initial attention weight, returning the evicted member if any.
    ///
    /// Re-admitting a present item refreshes its copy and weight without evicting.
    pub fn admit(&mut self, item: MemoryItem, attention: f64) -> Option<MemoryItem> {
        for entry in self.entries.iter_mut() {
            entry.attention = (entry.attention - self.attention_decay).max(0.0);
        }

        if let Some(existing) = self.entries.iter_mut().find(|e| e.item.id == item.id) {
            existing.item = item;
            existing.attention = attention;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.eviction_candidate().map(|idx| self.entries.swap_remove(idx).item)
        } else {
            None
        };

        if let Some(ref e) = evicted {
            tracing::debug!(id = %e.id, "Evicted item from working set");
        }

        self.entries.push(FocusEntry { item, attention });
        evicted
    }

    /// Lowest attention; ties go to the least recently accessed.
    fn eviction_candidate(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.attention
                    .total_cmp(&b.attention)
                    .then_with(|| a.item.last_accessed_at.cmp(&b.item.last_accessed_at))
            })
            .map(|(idx, _)| idx)
    }

    /// Record an access to a member.
    pub fn touch(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.entries.iter_mut().find(|e| e.item.id == id) {
            Some(entry) => {
                entry.item.touch(now);
                true
            }
            None => false,
        }
    }

    /// Drop a member (e.g. its durable copy was deleted).
    pub fn remove(&mut self, id: &str) -> Option<MemoryItem> {
        let idx = self.entries.iter().position(|e| e.item.id == id)?;
        Some(self.entries.swap_remove(idx).item)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.item.id == id)
    }

    pub fn attention_of(&self, id: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.item.id == id).map(|e| e.attention)
    }

    /// Members ordered by attention, highest first.
    pub fn entries(&self) -> Vec<FocusEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| b.attention.total_cmp(&a.attention));
        entries
    }

    /// Keyword search over members; relevance is set on the returned copies.
    pub fn search(&self, query: &str) -> Vec<MemoryItem> {
        self.entries
            .iter()
            .filter_map(|e| {
                let relevance = keyword_relevance(query, &e.item.content);
                (relevance > 0.0).then(|| {
                    let mut item = e.item.clone().with_score(relevance);
                    item.tier = Tier::Focus;
                    item
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fraction of capacity in use.
    pub fn utilization(&self) -> f64 {
        self.entries.len() as f64 / self.capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signals;
    use chrono::Duration;

    fn item(content: &str, accessed: DateTime<Utc>) -> MemoryItem {
        let mut item = MemoryItem::new_at(content, Signals::new(), accessed);
        item.last_accessed_at = accessed;
        item
    }

    #[test]
    fn test_capacity_is_clamped() {
        let small = WorkingSet::new(&WorkingSetConfig {
            capacity: 2,
            ..Default::default()
        });
        assert_eq!(small.capacity(), 5);
        let large = WorkingSet::new(&WorkingSetConfig {
            capacity: 20,
            ..Default::default()
        });
        assert_eq!(large.capacity(), 9);
    }

    #[test]
    fn test_capacity_bound_holds() {
        let mut ws = WorkingSet::new(&WorkingSetConfig::default());
        let now = Utc::now();
        for i in 0..50 {
            ws.admit(item(&format!("item {}", i), now), 0.5 + (i % 5) as f64 * 0.1);
            assert!(ws.len() <= ws.capacity());
        }
        assert_eq!(ws.len(), 7);
    }

    #[test]
    fn test_evicts_lowest_attention() {
        let mut ws = WorkingSet::new(&WorkingSetConfig::default());
        let now = Utc::now();
        let weak = item("weak", now);
        let weak_id = weak.id.clone();
        ws.admit(weak, 0.1);
        for i in 0..6 {
            ws.admit(item(&format!("strong {}", i), now), 0.9);
        }
        assert_eq!(ws.len(), 7);
        let evicted = ws.admit(item("newcomer", now), 0.9).unwrap();
        assert_eq!(evicted.id, weak_id);
        assert!(!ws.contains(&weak_id));
    }

    #[test]
    fn test_tie_broken_by_oldest_access() {
        let mut ws = WorkingSet::new(&WorkingSetConfig {
            attention_decay: 0.0,
            ..Default::default()
        });
        let now = Utc::now();
        let oldest = item("oldest", now - Duration::hours(3));
        let oldest_id = oldest.id.clone();
        ws.admit(item("a", now - Duration::hours(1)), 0.5);
        ws.admit(oldest, 0.5);
        for i in 0..5 {
            ws.admit(item(&format!("b{}", i), now), 0.5);
        }
        let evicted = ws.admit(item("c", now), 0.5).unwrap();
        assert_eq!(evicted.id, oldest_id);
    }

    #[test]
    fn test_attention_decays_on_admission() {
        let mut ws = WorkingSet::new(&WorkingSetConfig::default());
        let first = item("first", Utc::now());
        let id = first.id.clone();
        ws.admit(first, 0.8);
        ws.admit(item("second", Utc::now()), 0.8);
        ws.admit(item("third", Utc::now()), 0.8);
        let attention = ws.attention_of(&id).unwrap();
        assert!((attention - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_touch_and_search() {
        let mut ws = WorkingSet::new(&WorkingSetConfig::default());
        let now = Utc::now();
        let gym = item("gym with Sam", now - Duration::hours(1));
        let id = gym.id.clone();
        ws.admit(gym, 0.7);
        assert!(ws.touch(&id, now));
        let hits = ws.search("gym");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tier, Tier::Focus);
        assert_eq!(hits[0].access_count, 1);
    }
}
