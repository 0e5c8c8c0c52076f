//! Batched, resumable decay passes.
//!
//! A pass walks the Decaying tier in id order, one batch at a time. Each
//! item is committed on its own, so a crash or cancellation between items
//! leaves processed items updated and the rest untouched; re-running the
//! pass (or resuming from the returned token) picks up where it stopped.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::phase::DecayPhase;
use super::strength::{DecayConfig, StrengthModel};
use crate::error::{StrataError, StrataResult};
use crate::events::{EngineEvent, EventBus, PhaseAdvancedEvent};
use crate::external::{call_external, ExternalCallConfig};
use crate::storage::TierStore;
use crate::traits::{Compressor, TruncatingCompressor};
use crate::types::MemoryItem;

/// Position to resume a pass from: the last processed item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken(pub String);

impl ResumeToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What happened to a single item during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Strength recomputed, phase unchanged.
    Updated,
    /// Phase advanced and content compressed.
    Advanced { from: DecayPhase, to: DecayPhase },
    /// Compression was due (phase advancement or over-budget content) but failed; retried next pass.
    Deferred,
    /// Reached the forgotten phase and was deleted.
    Forgotten,
    /// The item left the Decaying tier before it could be written.
    Skipped,
}

/// Summary of a decay pass or batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayReport {
    /// Items whose strength was recomputed.
    pub processed: usize,
    /// Items that moved to a tighter phase.
    pub advanced: usize,
    /// Items whose advancement waits for the compressor.
    pub deferred: usize,
    /// Items deleted after reaching the forgotten phase.
    pub forgotten: usize,
    /// Items skipped (gone or failed to write).
    pub skipped: usize,
    /// Archive items purged after the retention period.
    pub purged: usize,
    /// Expired ingest items force-classified before the pass.
    pub swept: usize,
    /// Tokens saved by this pass's compressions and deletions.
    pub tokens_saved: u64,
    /// Ids of the forgotten items.
    pub forgotten_ids: Vec<String>,
    /// Per-item errors (non-fatal, processing continued).
    pub errors: Vec<String>,
    /// Set when the pass stopped before exhausting the tier.
    pub resume: Option<ResumeToken>,
    /// The pass was cancelled between items.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for DecayReport {
    fn default() -> Self {
        Self {
            processed: 0,
            advanced: 0,
            deferred: 0,
            forgotten: 0,
            skipped: 0,
            purged: 0,
            swept: 0,
            tokens_saved: 0,
            forgotten_ids: Vec::new(),
            errors: Vec::new(),
            resume: None,
            cancelled: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

impl DecayReport {
    fn started(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            ..Default::default()
        }
    }

    fn complete(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }

    /// Whether the whole tier was covered.
    pub fn is_complete(&self) -> bool {
        self.resume.is_none() && !self.cancelled
    }

    /// Duration of the run.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    fn absorb(&mut self, batch: DecayReport) {
        self.processed += batch.processed;
        self.advanced += batch.advanced;
        self.deferred += batch.deferred;
        self.forgotten += batch.forgotten;
        self.skipped += batch.skipped;
        self.tokens_saved += batch.tokens_saved;
        self.forgotten_ids.extend(batch.forgotten_ids);
        self.errors.extend(batch.errors);
        self.resume = batch.resume;
        self.cancelled = batch.cancelled;
    }
}

/// Runs decay passes over the Decaying tier.
pub struct DecayScheduler {
    store: TierStore,
    compressor: Arc<dyn Compressor>,
    model: StrengthModel,
    config: DecayConfig,
    external: ExternalCallConfig,
    events: EventBus,
    claim: Mutex<()>,
}

impl DecayScheduler {
    pub fn new(
        store: TierStore,
        compressor: Arc<dyn Compressor>,
        config: DecayConfig,
        external: ExternalCallConfig,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            compressor,
            model: StrengthModel::new(config.clone()),
            config,
            external,
            events,
            claim: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Whether a pass currently holds the claim.
    pub fn is_running(&self) -> bool {
        self.claim.try_lock().is_err()
    }

    /// Run a full pass as of now.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> StrataResult<DecayReport> {
        self.run_pass_at(Utc::now(), cancel).await
    }

    /// Run a full pass, evaluating strengths as of `now`.
    ///
    /// Fails with `DecayInProgress` if another pass holds the claim.
    pub async fn run_pass_at(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> StrataResult<DecayReport> {
        let _claim = self
            .claim
            .try_lock()
            .map_err(|_| StrataError::decay_in_progress())?;

        let mut report = DecayReport::started(now);
        let mut resume: Option<ResumeToken> = None;
        loop {
            let batch = self.batch(resume.as_ref(), now, cancel).await?;
            resume = batch.resume.clone();
            report.absorb(batch);
            if resume.is_none() || report.cancelled {
                break;
            }
        }

        if !report.cancelled {
            report.purged = self.purge_archive(now)?;
        }

        let report = report.complete();
        info!(
            processed = report.processed,
            advanced = report.advanced,
            deferred = report.deferred,
            forgotten = report.forgotten,
            purged = report.purged,
            tokens_saved = report.tokens_saved,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms().unwrap_or(0),
            "Decay pass complete"
        );
        Ok(report)
    }

    /// Process a single batch after `resume`; the report's token continues the pass.
    pub async fn run_batch(
        &self,
        resume: Option<&ResumeToken>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> StrataResult<DecayReport> {
        let _claim = self
            .claim
            .try_lock()
            .map_err(|_| StrataError::decay_in_progress())?;
        Ok(self.batch(resume, now, cancel).await?.complete())
    }

    async fn batch(
        &self,
        resume: Option<&ResumeToken>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> StrataResult<DecayReport> {
        let mut report = DecayReport::started(now);
        let items = self
            .store
            .decaying_batch(resume.map(|r| r.as_str()), self.config.batch_size)?;
        let exhausted = items.len() < self.config.batch_size;
        let mut last_id: Option<String> = resume.map(|r| r.0.clone());

        for item in items {
            if cancel.is_cancelled() {
                debug!(after = ?last_id, "Decay batch cancelled");
                report.cancelled = true;
                report.resume = last_id.map(ResumeToken);
                return Ok(report);
            }

            let id = item.id.clone();
            let before_budget = item.token_budget;
            match self.process_item(item, now).await {
                Ok(outcome) => {
                    report.processed += 1;
                    match outcome {
                        ItemOutcome::Updated => {}
                        ItemOutcome::Advanced { to, .. } => {
                            report.advanced += 1;
                            report.tokens_saved +=
                                before_budget.saturating_sub(to.token_budget()) as u64;
                        }
                        ItemOutcome::Deferred => report.deferred += 1,
                        ItemOutcome::Forgotten => {
                            report.forgotten += 1;
                            report.tokens_saved += before_budget as u64;
                            report.forgotten_ids.push(id.clone());
                        }
                        ItemOutcome::Skipped => report.skipped += 1,
                    }
                }
                Err(e) => {
                    warn!(item_id = %id, error = %e, "Skipping item in decay pass");
                    report.skipped += 1;
                    report.errors.push(format!("{}: {}", id, e));
                }
            }
            last_id = Some(id);
        }

        report.resume = if exhausted { None } else { last_id.map(ResumeToken) };
        Ok(report)
    }

    /// Recompute one item and commit the result.
    pub async fn process_item(&self, item: MemoryItem, now: DateTime<Utc>) -> StrataResult<ItemOutcome> {
        let breakdown = self.model.compute(&item, now);
        let previous = item.strength.unwrap_or(1.0);

        // Without an access since the last pass, strength may only fall.
        let reference = item.last_decay_at.unwrap_or(item.created_at);
        let accessed = item.last_accessed_at > reference;
        let strength = if accessed {
            breakdown.strength
        } else {
            breakdown.strength.min(previous)
        };

        let current = item.phase.unwrap_or_default();
        let target = current.max(DecayPhase::from_strength(strength));

        debug!(
            item_id = %item.id,
            base = breakdown.base,
            strength,
            current = %current,
            target = %target,
            "Recomputed strength"
        );

        if target.is_forgotten() {
            if !self.store.delete_forgotten(&item.id, item.token_budget)? {
                return Ok(ItemOutcome::Skipped);
            }
            self.events.emit(EngineEvent::Forgotten {
                item_id: item.id.clone(),
                timestamp: now,
            });
            return Ok(ItemOutcome::Forgotten);
        }

        if target == current && !item.over_budget() {
            let written =
                self.store
                    .update_decay(&item.id, strength, current, item.token_budget, None, now)?;
            return Ok(if written {
                ItemOutcome::Updated
            } else {
                ItemOutcome::Skipped
            });
        }

        let budget = target.token_budget();
        match self.fit(&item.content, budget).await {
            Ok(text) => {
                let written =
                    self.store
                        .update_decay(&item.id, strength, target, budget, Some(&text), now)?;
                if !written {
                    return Ok(ItemOutcome::Skipped);
                }
                if target == current {
                    return Ok(ItemOutcome::Updated);
                }
                self.events.emit(EngineEvent::PhaseAdvanced(PhaseAdvancedEvent {
                    item_id: item.id.clone(),
                    from: current,
                    to: target,
                    strength,
                    token_budget: budget,
                    timestamp: now,
                }));
                Ok(ItemOutcome::Advanced {
                    from: current,
                    to: target,
                })
            }
            Err(e) => {
                warn!(
                    item_id = %item.id,
                    compressor = self.compressor.name(),
                    error = %e,
                    "Compression failed, deferring to the next pass"
                );
                self.store
                    .update_decay(&item.id, strength, current, item.token_budget, None, now)?;
                Ok(ItemOutcome::Deferred)
            }
        }
    }

    /// Compress `content` into `budget` tokens, truncating whatever the compressor overshoots.
    pub async fn fit(&self, content: &str, budget: u32) -> StrataResult<String> {
        let compressed = call_external("compression", &self.external, || {
            self.compressor.compress(content, budget)
        })
        .await?;
        Ok(TruncatingCompressor::truncate(&compressed, budget))
    }

    fn purge_archive(&self, now: DateTime<Utc>) -> StrataResult<usize> {
        let cutoff = now - Duration::days(self.config.archive_retention_days as i64);
        let purged = self.store.purge_archive(cutoff)?;
        if !purged.is_empty() {
            debug!(count = purged.len(), "Purged archive items");
            self.events.emit(EngineEvent::Purged {
                item_ids: purged.clone(),
                timestamp: now,
            });
        }
        Ok(purged.len())
    }
}
