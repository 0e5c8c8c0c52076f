//! SQLite-backed tier store.
//!
//! Owns the schema for memory items, routing decisions, patterns and
//! lifetime counters. Every write that must be atomic (an item together with
//! its routing decision, a deletion together with its counters) runs in a
//! single transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::decay::DecayPhase;
use crate::error::{StrataError, StrataResult};
use crate::text::content_key;
use crate::traits::cosine_similarity;
use crate::types::{MemoryItem, Pattern, PatternType, RoutingDecision, RoutingRule, Tier};

const ITEM_COLUMNS: &str = "id, content, embedding, tier, topic, created_at, last_accessed_at, \
     access_count, signals, routing_score, strength, phase, token_budget, original_tokens, last_decay_at";

const COUNTER_FORGOTTEN: &str = "forgotten_items";
const COUNTER_PURGED: &str = "purged_items";
const COUNTER_RECLAIMED: &str = "reclaimed_tokens";

const DECISION_COLUMNS: &str =
    "item_id, signals, score, tier, rule, confidence, ambiguous, forced, decided_at, merged_into";

/// Lifetime counters kept alongside the tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreCounters {
    /// Decaying items deleted after reaching the forgotten phase.
    pub forgotten_items: u64,
    /// Archive items removed after their retention period.
    pub purged_items: u64,
    /// Tokens freed by deleting forgotten items.
    pub reclaimed_tokens: u64,
}

/// SQLite-backed store for the four durable tiers.
#[derive(Clone)]
pub struct TierStore {
    conn: Arc<Mutex<Connection>>,
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion<E>(idx: usize) -> impl FnOnce(E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<MemoryItem> {
    let embedding: Option<String> = row.get(2)?;
    let embedding = embedding
        .map(|s| serde_json::from_str::<Vec<f32>>(&s).map_err(conversion(2)))
        .transpose()?;
    let tier: String = row.get(3)?;
    let created_at: String = row.get(5)?;
    let last_accessed_at: String = row.get(6)?;
    let signals: String = row.get(8)?;
    let phase: Option<u8> = row.get(11)?;
    let last_decay_at: Option<String> = row.get(14)?;

    Ok(MemoryItem {
        id: row.get(0)?,
        content: row.get(1)?,
        embedding,
        tier: Tier::from_str(&tier).map_err(conversion(3))?,
        topic: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
        last_accessed_at: parse_ts(6, &last_accessed_at)?,
        access_count: row.get(7)?,
        signals: serde_json::from_str(&signals).map_err(conversion(8))?,
        routing_score: row.get(9)?,
        strength: row.get(10)?,
        phase: phase.and_then(DecayPhase::from_index),
        token_budget: row.get(12)?,
        original_tokens: row.get(13)?,
        last_decay_at: last_decay_at.map(|s| parse_ts(14, &s)).transpose()?,
        score: None,
    })
}

fn row_to_decision(row: &Row<'_>) -> rusqlite::Result<RoutingDecision> {
    let signals: String = row.get(1)?;
    let tier: String = row.get(3)?;
    let rule: String = row.get(4)?;
    let decided_at: String = row.get(8)?;
    Ok(RoutingDecision {
        item_id: row.get(0)?,
        signals: serde_json::from_str(&signals).map_err(conversion(1))?,
        score: row.get(2)?,
        tier: Tier::from_str(&tier).map_err(conversion(3))?,
        rule: RoutingRule::from_str(&rule).map_err(conversion(4))?,
        confidence: row.get(5)?,
        ambiguous: row.get::<_, i32>(6)? != 0,
        forced: row.get::<_, i32>(7)? != 0,
        decided_at: parse_ts(8, &decided_at)?,
        merged_into: row.get(9)?,
    })
}

fn row_to_pattern(row: &Row<'_>) -> rusqlite::Result<Pattern> {
    let pattern_type: String = row.get(1)?;
    let representative_ids: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    Ok(Pattern {
        id: row.get(0)?,
        pattern_type: PatternType::from_str(&pattern_type).map_err(conversion(1))?,
        antecedent: row.get(2)?,
        consequent: row.get(3)?,
        description: row.get(4)?,
        support_count: row.get(5)?,
        total_observations: row.get(6)?,
        confidence: row.get(7)?,
        representative_ids: serde_json::from_str(&representative_ids).map_err(conversion(8))?,
        updated_at: parse_ts(9, &updated_at)?,
    })
}

fn check_durable(item: &MemoryItem) -> StrataResult<()> {
    if item.tier.is_durable() {
        Ok(())
    } else {
        Err(StrataError::internal(format!(
            "refusing to persist item {} in staging tier {}",
            item.id, item.tier
        )))
    }
}

fn insert_item(tx: &Transaction<'_>, item: &MemoryItem) -> StrataResult<()> {
    let embedding = item.embedding.as_ref().map(serde_json::to_string).transpose()?;
    let signals = serde_json::to_string(&item.signals)?;
    tx.execute(
        &format!(
            "INSERT INTO memory_items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            ITEM_COLUMNS
        ),
        params![
            item.id,
            item.content,
            embedding,
            item.tier.to_string(),
            item.topic,
            ts(&item.created_at),
            ts(&item.last_accessed_at),
            item.access_count,
            signals,
            item.routing_score,
            item.strength,
            item.phase.map(|p| p.index()),
            item.token_budget,
            item.original_tokens,
            item.last_decay_at.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

fn insert_decision(tx: &Transaction<'_>, decision: &RoutingDecision) -> StrataResult<()> {
    let signals = serde_json::to_string(&decision.signals)?;
    tx.execute(
        &format!(
            "INSERT INTO routing_decisions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            DECISION_COLUMNS
        ),
        params![
            decision.item_id,
            signals,
            decision.score,
            decision.tier.to_string(),
            decision.rule.to_string(),
            decision.confidence,
            decision.ambiguous as i32,
            decision.forced as i32,
            ts(&decision.decided_at),
            decision.merged_into,
        ],
    )?;
    Ok(())
}

impl TierStore {
    /// Open (or create) a store at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> StrataResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> StrataResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StrataResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StrataError::database(e.to_string()))
    }

    fn init_schema(&self) -> StrataResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS memory_items (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                embedding TEXT,
                tier TEXT NOT NULL,
                topic TEXT,
                created_at TEXT NOT NULL,
                last_accessed_at TEXT NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 0,
                signals TEXT NOT NULL,
                routing_score REAL NOT NULL DEFAULT 0,
                strength REAL,
                phase INTEGER,
                token_budget INTEGER NOT NULL,
                original_tokens INTEGER NOT NULL,
                last_decay_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_memory_items_tier ON memory_items(tier);
            CREATE INDEX IF NOT EXISTS idx_memory_items_created_at ON memory_items(created_at);
            CREATE INDEX IF NOT EXISTS idx_memory_items_strength ON memory_items(strength);
            CREATE INDEX IF NOT EXISTS idx_memory_items_topic ON memory_items(topic);

            -- One decision per arrival; kept after the item itself is deleted.
            CREATE TABLE IF NOT EXISTS routing_decisions (
                item_id TEXT NOT NULL UNIQUE,
                signals TEXT NOT NULL,
                score REAL NOT NULL,
                tier TEXT NOT NULL,
                rule TEXT NOT NULL,
                confidence REAL NOT NULL,
                ambiguous INTEGER NOT NULL DEFAULT 0,
                forced INTEGER NOT NULL DEFAULT 0,
                decided_at TEXT NOT NULL,
                merged_into TEXT
            );

            CREATE TABLE IF NOT EXISTS patterns (
                id TEXT PRIMARY KEY,
                pattern_type TEXT NOT NULL,
                antecedent TEXT NOT NULL,
                consequent TEXT NOT NULL,
                description TEXT NOT NULL,
                support_count INTEGER NOT NULL,
                total_observations INTEGER NOT NULL,
                confidence REAL NOT NULL,
                representative_ids TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_patterns_antecedent ON patterns(antecedent);

            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL DEFAULT 0
            );
            ",
        )?;

        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Persist a routed item together with its decision, atomically.
    pub fn insert_routed(&self, item: &MemoryItem, decision: &RoutingDecision) -> StrataResult<()> {
        check_durable(item)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        insert_item(&tx, item)?;
        insert_decision(&tx, decision)?;
        tx.commit()?;
        Ok(())
    }

    /// Persist a Pattern-tier arrival, folding repeats into the existing row.
    ///
    /// An arrival whose topic and normalized content match a stored pattern
    /// item is not stored again: the existing row gets the access bump and the
    /// decision is recorded with `merged_into` pointing at it. Returns the row
    /// that now represents the arrival and the decision as written.
    pub fn insert_or_fold_pattern(
        &self,
        item: &MemoryItem,
        decision: &RoutingDecision,
        now: DateTime<Utc>,
    ) -> StrataResult<(MemoryItem, RoutingDecision)> {
        if item.tier != Tier::Pattern {
            return Err(StrataError::internal(format!(
                "item {} is {}, not pattern",
                item.id, item.tier
            )));
        }
        let key = content_key(&item.content);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let existing = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM memory_items
                 WHERE tier = 'pattern' AND topic IS ?1
                 ORDER BY created_at ASC, id ASC",
                ITEM_COLUMNS
            ))?;
            let candidates = stmt
                .query_map(params![item.topic], row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            candidates
                .into_iter()
                .find(|candidate| content_key(&candidate.content) == key)
        };

        let Some(mut existing) = existing else {
            insert_item(&tx, item)?;
            insert_decision(&tx, decision)?;
            tx.commit()?;
            return Ok((item.clone(), decision.clone()));
        };

        tx.execute(
            "UPDATE memory_items
             SET last_accessed_at = ?1, access_count = access_count + 1
             WHERE id = ?2",
            params![ts(&now), existing.id],
        )?;
        let mut decision = decision.clone();
        decision.merged_into = Some(existing.id.clone());
        insert_decision(&tx, &decision)?;
        tx.commit()?;

        existing.touch(now);
        Ok((existing, decision))
    }

    /// Get an item by id.
    pub fn get(&self, id: &str) -> StrataResult<Option<MemoryItem>> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM memory_items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Record a retrieval and return the updated item.
    pub fn record_access(&self, id: &str, now: DateTime<Utc>) -> StrataResult<Option<MemoryItem>> {
        {
            let conn = self.lock()?;
            let updated = conn.execute(
                "UPDATE memory_items
                 SET last_accessed_at = ?1, access_count = access_count + 1
                 WHERE id = ?2",
                params![ts(&now), id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
        }
        self.get(id)
    }

    /// All items in a tier, oldest first.
    pub fn list_tier(&self, tier: Tier) -> StrataResult<Vec<MemoryItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memory_items WHERE tier = ?1 ORDER BY created_at ASC, id ASC",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![tier.to_string()], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Items in the given tiers, optionally restricted to a creation window.
    pub fn list_tiers(&self, tiers: &[Tier], since: Option<DateTime<Utc>>) -> StrataResult<Vec<MemoryItem>> {
        let mut items = Vec::new();
        for tier in tiers.iter().filter(|t| t.is_durable()) {
            items.extend(self.list_tier(*tier)?);
        }
        if let Some(since) = since {
            items.retain(|i| i.created_at >= since);
        }
        Ok(items)
    }

    /// Next batch of decaying items after `after` in id order.
    pub fn decaying_batch(&self, after: Option<&str>, limit: usize) -> StrataResult<Vec<MemoryItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memory_items
             WHERE tier = 'decaying' AND id > ?1
             ORDER BY id ASC
             LIMIT ?2",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![after.unwrap_or(""), limit as i64], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Commit a recomputed strength and phase for one decaying item.
    ///
    /// Never touches other tiers and never moves a phase backward; returns
    /// whether the row was updated.
    pub fn update_decay(
        &self,
        id: &str,
        strength: f64,
        phase: DecayPhase,
        token_budget: u32,
        content: Option<&str>,
        now: DateTime<Utc>,
    ) -> StrataResult<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE memory_items
             SET strength = ?1, phase = ?2, token_budget = ?3,
                 content = COALESCE(?4, content), last_decay_at = ?5
             WHERE id = ?6 AND tier = 'decaying' AND (phase IS NULL OR phase <= ?2)",
            params![strength, phase.index(), token_budget, content, ts(&now), id],
        )?;
        Ok(updated > 0)
    }

    /// Delete a forgotten decaying item and account for the tokens it held.
    pub fn delete_forgotten(&self, id: &str, reclaimed_tokens: u32) -> StrataResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM memory_items WHERE id = ?1 AND tier = 'decaying'",
            params![id],
        )?;
        if deleted > 0 {
            bump(&tx, COUNTER_FORGOTTEN, 1)?;
            bump(&tx, COUNTER_RECLAIMED, reclaimed_tokens as i64)?;
        }
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Remove archive items created before `cutoff`; returns their ids.
    pub fn purge_archive(&self, cutoff: DateTime<Utc>) -> StrataResult<Vec<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let ids = {
            let mut stmt = tx.prepare(
                "SELECT id FROM memory_items WHERE tier = 'archive' AND created_at < ?1 ORDER BY id",
            )?;
            let ids = stmt
                .query_map(params![ts(&cutoff)], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        if !ids.is_empty() {
            tx.execute(
                "DELETE FROM memory_items WHERE tier = 'archive' AND created_at < ?1",
                params![ts(&cutoff)],
            )?;
            bump(&tx, COUNTER_PURGED, ids.len() as i64)?;
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Brute-force cosine nearest neighbours over stored embeddings.
    pub fn nearest(&self, vector: &[f32], k: usize, tiers: &[Tier]) -> StrataResult<Vec<(MemoryItem, f64)>> {
        let mut scored: Vec<(MemoryItem, f64)> = self
            .list_tiers(tiers, None)?
            .into_iter()
            .filter_map(|item| {
                let sim = item.embedding.as_deref().map(|e| cosine_similarity(vector, e))?;
                Some((item, sim))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Item counts per durable tier (zero-filled).
    pub fn count_by_tier(&self) -> StrataResult<HashMap<Tier, usize>> {
        let conn = self.lock()?;
        let mut counts: HashMap<Tier, usize> = Tier::DURABLE.iter().map(|t| (*t, 0)).collect();
        let mut stmt = conn.prepare("SELECT tier, COUNT(*) FROM memory_items GROUP BY tier")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (tier, count) in rows {
            let tier = Tier::from_str(&tier)
                .map_err(|_| StrataError::corrupted(format!("unknown tier '{}'", tier)))?;
            counts.insert(tier, count as usize);
        }
        Ok(counts)
    }

    /// Tokens currently saved by compressed decaying items, measured on stored content.
    pub fn compressed_token_savings(&self) -> StrataResult<u64> {
        let conn = self.lock()?;
        let saved: i64 = conn.query_row(
            "SELECT COALESCE(SUM(MAX(original_tokens - (LENGTH(content) + 3) / 4, 0)), 0)
             FROM memory_items WHERE tier = 'decaying'",
            [],
            |row| row.get(0),
        )?;
        Ok(saved.max(0) as u64)
    }

    // =========================================================================
    // Routing decisions
    // =========================================================================

    /// The decision recorded when `item_id` arrived.
    pub fn get_decision(&self, item_id: &str) -> StrataResult<Option<RoutingDecision>> {
        let conn = self.lock()?;
        let decision = conn
            .query_row(
                &format!("SELECT {} FROM routing_decisions WHERE item_id = ?1", DECISION_COLUMNS),
                params![item_id],
                row_to_decision,
            )
            .optional()?;
        Ok(decision)
    }

    pub fn count_decisions(&self) -> StrataResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM routing_decisions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // =========================================================================
    // Patterns
    // =========================================================================

    /// Insert or refresh a pattern.
    pub fn upsert_pattern(&self, pattern: &Pattern) -> StrataResult<()> {
        let representative_ids = serde_json::to_string(&pattern.representative_ids)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO patterns
             (id, pattern_type, antecedent, consequent, description, support_count,
              total_observations, confidence, representative_ids, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                pattern.id,
                pattern.pattern_type.to_string(),
                pattern.antecedent,
                pattern.consequent,
                pattern.description,
                pattern.support_count,
                pattern.total_observations,
                pattern.confidence,
                representative_ids,
                ts(&pattern.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Delete a pattern; returns whether it existed.
    pub fn delete_pattern(&self, id: &str) -> StrataResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM patterns WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Every stored pattern, highest confidence first.
    pub fn list_patterns(&self) -> StrataResult<Vec<Pattern>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, pattern_type, antecedent, consequent, description, support_count,
                    total_observations, confidence, representative_ids, updated_at
             FROM patterns
             ORDER BY confidence DESC, support_count DESC, id ASC",
        )?;
        let patterns = stmt
            .query_map([], row_to_pattern)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patterns)
    }

    // =========================================================================
    // Counters
    // =========================================================================

    pub fn counters(&self) -> StrataResult<StoreCounters> {
        let conn = self.lock()?;
        let read = |name: &str| -> StrataResult<u64> {
            let value: Option<i64> = conn
                .query_row("SELECT value FROM counters WHERE name = ?1", params![name], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value.unwrap_or(0).max(0) as u64)
        };
        Ok(StoreCounters {
            forgotten_items: read(COUNTER_FORGOTTEN)?,
            purged_items: read(COUNTER_PURGED)?,
            reclaimed_tokens: read(COUNTER_RECLAIMED)?,
        })
    }
}

fn bump(conn: &Connection, name: &str, by: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO counters (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = value + excluded.value",
        params![name, by],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RoutingClassifier;
    use crate::types::Signals;
    use chrono::Duration;
    use tempfile::TempDir;

    fn routed(content: &str, tier: Tier, now: DateTime<Utc>) -> (MemoryItem, RoutingDecision) {
        let mut item = MemoryItem::new_at(content, Signals::new(), now);
        let mut decision = RoutingClassifier::default().classify(&item, now);
        decision.tier = tier;
        item.assign_tier(tier, decision.score);
        (item, decision)
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (item, decision) = routed("coffee with Sam", Tier::Decaying, now);
        store.insert_routed(&item, &decision).unwrap();

        let loaded = store.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.content, "coffee with Sam");
        assert_eq!(loaded.tier, Tier::Decaying);
        assert_eq!(loaded.phase, Some(DecayPhase::Episodic));
        assert_eq!(loaded.strength, Some(1.0));

        let stored = store.get_decision(&item.id).unwrap().unwrap();
        assert_eq!(stored.tier, Tier::Decaying);
        assert_eq!(stored.rule, decision.rule);
    }

    #[test]
    fn test_second_decision_for_same_item_is_rejected() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (item, decision) = routed("x", Tier::Archive, now);
        store.insert_routed(&item, &decision).unwrap();

        let mut dup = item.clone();
        dup.id = "other".to_string();
        assert!(store.insert_routed(&dup, &decision).is_err());
        // The failed transaction left nothing behind.
        assert!(store.get("other").unwrap().is_none());
        assert_eq!(store.count_decisions().unwrap(), 1);
    }

    #[test]
    fn test_repeated_pattern_arrival_folds_into_existing_row() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (first, d1) = routed("Skipped breakfast again", Tier::Pattern, now);
        let (stored, written) = store.insert_or_fold_pattern(&first, &d1, now).unwrap();
        assert_eq!(stored.id, first.id);
        assert!(written.merged_into.is_none());

        let later = now + Duration::hours(24);
        let (repeat, d2) = routed("skipped breakfast  again.", Tier::Pattern, later);
        let (stored, written) = store.insert_or_fold_pattern(&repeat, &d2, later).unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.access_count, 1);
        assert_eq!(written.merged_into.as_deref(), Some(first.id.as_str()));

        assert_eq!(store.list_tier(Tier::Pattern).unwrap().len(), 1);
        assert_eq!(store.count_decisions().unwrap(), 2);
        let loaded = store.get(&first.id).unwrap().unwrap();
        assert_eq!(loaded.access_count, 1);
        assert!(loaded.last_accessed_at > now);
        let audit = store.get_decision(&repeat.id).unwrap().unwrap();
        assert_eq!(audit.merged_into.as_deref(), Some(first.id.as_str()));
    }

    #[test]
    fn test_pattern_rows_with_other_topic_are_not_folded() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (mut a, d1) = routed("went running", Tier::Pattern, now);
        a.topic = Some("morning".to_string());
        let (mut b, d2) = routed("went running", Tier::Pattern, now);
        b.topic = Some("evening".to_string());
        store.insert_or_fold_pattern(&a, &d1, now).unwrap();
        store.insert_or_fold_pattern(&b, &d2, now).unwrap();

        assert_eq!(store.list_tier(Tier::Pattern).unwrap().len(), 2);
        let (c, d3) = routed("went running", Tier::Decaying, now);
        assert!(store.insert_or_fold_pattern(&c, &d3, now).is_err());
    }

    #[test]
    fn test_token_savings_measure_stored_content() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (item, decision) = routed(&"word ".repeat(800), Tier::Decaying, now);
        store.insert_routed(&item, &decision).unwrap();
        assert_eq!(store.compressed_token_savings().unwrap(), 0);

        let short = "word ".repeat(100);
        store
            .update_decay(&item.id, 0.8, DecayPhase::Episodic, 500, Some(&short), now)
            .unwrap();
        assert_eq!(store.compressed_token_savings().unwrap(), 875);
    }

    #[test]
    fn test_update_decay_never_moves_phase_backward() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (item, decision) = routed("x", Tier::Decaying, now);
        store.insert_routed(&item, &decision).unwrap();

        assert!(store
            .update_decay(&item.id, 0.3, DecayPhase::Semantic, 150, Some("short"), now)
            .unwrap());
        assert!(!store
            .update_decay(&item.id, 0.9, DecayPhase::Episodic, 500, None, now)
            .unwrap());

        let loaded = store.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.phase, Some(DecayPhase::Semantic));
        assert_eq!(loaded.content, "short");
    }

    #[test]
    fn test_update_decay_ignores_permanent_items() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (item, decision) = routed("never forget", Tier::Permanent, now);
        store.insert_routed(&item, &decision).unwrap();

        assert!(!store
            .update_decay(&item.id, 0.01, DecayPhase::Forgotten, 0, None, now)
            .unwrap());
        assert!(!store.delete_forgotten(&item.id, 10).unwrap());
        let loaded = store.get(&item.id).unwrap().unwrap();
        assert!(loaded.strength.is_none());
    }

    #[test]
    fn test_delete_forgotten_updates_counters() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (item, decision) = routed("x", Tier::Decaying, now);
        store.insert_routed(&item, &decision).unwrap();

        assert!(store.delete_forgotten(&item.id, 42).unwrap());
        assert!(store.get(&item.id).unwrap().is_none());
        let counters = store.counters().unwrap();
        assert_eq!(counters.forgotten_items, 1);
        assert_eq!(counters.reclaimed_tokens, 42);
        // The audit record survives the item.
        assert!(store.get_decision(&item.id).unwrap().is_some());
    }

    #[test]
    fn test_purge_archive_respects_cutoff() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (old, d1) = routed("old", Tier::Archive, now - Duration::days(10));
        let (new, d2) = routed("new", Tier::Archive, now);
        store.insert_routed(&old, &d1).unwrap();
        store.insert_routed(&new, &d2).unwrap();

        let purged = store.purge_archive(now - Duration::days(7)).unwrap();
        assert_eq!(purged, vec![old.id.clone()]);
        assert!(store.get(&new.id).unwrap().is_some());
        assert_eq!(store.counters().unwrap().purged_items, 1);
    }

    #[test]
    fn test_decaying_batch_pages_by_id() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        for i in 0..5 {
            let (item, decision) = routed(&format!("item {}", i), Tier::Decaying, now);
            store.insert_routed(&item, &decision).unwrap();
        }
        let first = store.decaying_batch(None, 3).unwrap();
        assert_eq!(first.len(), 3);
        let rest = store
            .decaying_batch(first.last().map(|i| i.id.as_str()), 3)
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest[0].id > first[2].id);
    }

    #[test]
    fn test_nearest_and_counts() {
        let store = TierStore::in_memory().unwrap();
        let now = Utc::now();
        let (a, da) = routed("a", Tier::Permanent, now);
        let (b, db) = routed("b", Tier::Decaying, now);
        store.insert_routed(&a.clone().with_embedding(vec![1.0, 0.0]), &da).unwrap();
        store.insert_routed(&b.clone().with_embedding(vec![0.0, 1.0]), &db).unwrap();

        let hits = store.nearest(&[0.9, 0.1], 1, &Tier::DURABLE).unwrap();
        assert_eq!(hits[0].0.id, a.id);

        let counts = store.count_by_tier().unwrap();
        assert_eq!(counts[&Tier::Permanent], 1);
        assert_eq!(counts[&Tier::Pattern], 0);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("strata.db");
        let now = Utc::now();
        let (item, decision) = routed("persisted", Tier::Permanent, now);
        {
            let store = TierStore::new(&path).unwrap();
            store.insert_routed(&item, &decision).unwrap();
        }
        let reopened = TierStore::new(&path).unwrap();
        assert!(reopened.get(&item.id).unwrap().is_some());
    }

    #[test]
    fn test_pattern_upsert_and_delete() {
        let store = TierStore::in_memory().unwrap();
        let p = Pattern::new(PatternType::Behavioral, "gym", "succeeds", 5, 6, vec![], Utc::now());
        store.upsert_pattern(&p).unwrap();
        store.upsert_pattern(&p).unwrap();
        assert_eq!(store.list_patterns().unwrap().len(), 1);
        assert!(store.delete_pattern(&p.id).unwrap());
        assert!(store.list_patterns().unwrap().is_empty());
    }
}
