//! Background runtime for the decay and pattern schedulers.
//!
//! Both jobs are idempotent calls into the router, so a missed or
//! overlapping tick is harmless: an overlapping decay tick is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::config::{EngineConfig, MIN_INTERVAL_HOURS};
use crate::error::{StrataError, StrataResult};
use crate::router::MemoryRouter;

/// Configuration for the BackgroundRuntime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Hours between decay passes (default: 6).
    pub decay_interval_hours: u64,
    /// Hours between pattern aggregations (default: 6).
    pub pattern_interval_hours: u64,
    /// Run both jobs once immediately on start (default: false).
    pub run_on_start: bool,
    /// Whether to schedule decay passes (default: true).
    pub enable_decay: bool,
    /// Whether to schedule pattern aggregation (default: true).
    pub enable_patterns: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            decay_interval_hours: 6,
            pattern_interval_hours: 6,
            run_on_start: false,
            enable_decay: true,
            enable_patterns: true,
        }
    }
}

impl RuntimeConfig {
    /// Take the intervals from an engine configuration.
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            decay_interval_hours: config.decay_interval_hours(),
            pattern_interval_hours: config.pattern_interval_hours(),
            ..Self::default()
        }
    }

    pub fn with_decay_interval(mut self, hours: u64) -> Self {
        self.decay_interval_hours = hours.max(MIN_INTERVAL_HOURS);
        self
    }

    pub fn with_pattern_interval(mut self, hours: u64) -> Self {
        self.pattern_interval_hours = hours.max(MIN_INTERVAL_HOURS);
        self
    }

    /// Enable running both jobs immediately on start.
    pub fn with_run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }

    pub fn without_decay(mut self) -> Self {
        self.enable_decay = false;
        self
    }

    pub fn without_patterns(mut self) -> Self {
        self.enable_patterns = false;
        self
    }

    /// Overlay environment variables on this config.
    ///
    /// Reads:
    /// - `STRATA_DECAY_INTERVAL_HOURS`
    /// - `STRATA_PATTERN_INTERVAL_HOURS`
    /// - `STRATA_RUN_ON_START`
    /// - `STRATA_DISABLE_DECAY`
    /// - `STRATA_DISABLE_PATTERNS`
    pub fn with_env(mut self) -> Self {
        if let Some(hours) = std::env::var("STRATA_DECAY_INTERVAL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self = self.with_decay_interval(hours);
        }

        if let Some(hours) = std::env::var("STRATA_PATTERN_INTERVAL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self = self.with_pattern_interval(hours);
        }

        if std::env::var("STRATA_RUN_ON_START").is_ok() {
            self.run_on_start = true;
        }

        if std::env::var("STRATA_DISABLE_DECAY").is_ok() {
            self.enable_decay = false;
        }

        if std::env::var("STRATA_DISABLE_PATTERNS").is_ok() {
            self.enable_patterns = false;
        }

        self
    }

    /// Create config from environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }
}

async fn run_decay(router: &MemoryRouter) {
    debug!("Starting scheduled decay pass");
    match router.trigger_decay().await {
        Ok(report) => {
            info!(
                processed = report.processed,
                advanced = report.advanced,
                deferred = report.deferred,
                forgotten = report.forgotten,
                purged = report.purged,
                swept = report.swept,
                tokens_saved = report.tokens_saved,
                "Scheduled decay pass complete"
            );
        }
        Err(StrataError::DecayInProgress { .. }) => {
            debug!("Decay pass already running, skipping tick");
        }
        Err(e) => {
            error!(error = %e, "Scheduled decay pass failed");
        }
    }
}

fn run_patterns(router: &MemoryRouter) {
    debug!("Starting scheduled pattern aggregation");
    match router.refresh_patterns() {
        Ok(report) => {
            info!(
                observations = report.observations,
                detected = report.detected,
                removed = report.removed,
                "Scheduled pattern aggregation complete"
            );
        }
        Err(e) => {
            error!(error = %e, "Scheduled pattern aggregation failed");
        }
    }
}

/// Background runtime driving periodic decay and pattern aggregation.
///
/// # Example
///
/// ```ignore
/// use strata_core::{BackgroundRuntime, MemoryRouter, RuntimeConfig};
///
/// let router = Arc::new(MemoryRouter::new(config, None, None)?);
/// let mut runtime = BackgroundRuntime::new(router.clone(), RuntimeConfig::from_env()).await?;
/// runtime.start().await?;
///
/// // ... application runs ...
///
/// runtime.shutdown().await?;
/// ```
pub struct BackgroundRuntime {
    scheduler: JobScheduler,
    router: Arc<MemoryRouter>,
    config: RuntimeConfig,
}

impl BackgroundRuntime {
    /// Create the runtime. Call `start()` to begin background operations.
    pub async fn new(router: Arc<MemoryRouter>, config: RuntimeConfig) -> StrataResult<Self> {
        debug!(
            decay_enabled = config.enable_decay,
            patterns_enabled = config.enable_patterns,
            decay_interval_hours = config.decay_interval_hours,
            pattern_interval_hours = config.pattern_interval_hours,
            "Creating BackgroundRuntime"
        );

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| StrataError::internal(format!("Failed to create job scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            router,
            config,
        })
    }

    /// Register the enabled jobs and start the scheduler.
    pub async fn start(&self) -> StrataResult<()> {
        if self.config.enable_decay {
            let router = self.router.clone();
            let every = hours(self.config.decay_interval_hours);
            let job = Job::new_repeated_async(every, move |_uuid, _lock| {
                let router = router.clone();
                Box::pin(async move { run_decay(&router).await })
            })
            .map_err(|e| StrataError::internal(format!("Failed to create decay job: {}", e)))?;
            self.scheduler
                .add(job)
                .await
                .map_err(|e| StrataError::internal(format!("Failed to add decay job: {}", e)))?;
        }

        if self.config.enable_patterns {
            let router = self.router.clone();
            let every = hours(self.config.pattern_interval_hours);
            let job = Job::new_repeated_async(every, move |_uuid, _lock| {
                let router = router.clone();
                Box::pin(async move { run_patterns(&router) })
            })
            .map_err(|e| StrataError::internal(format!("Failed to create pattern job: {}", e)))?;
            self.scheduler
                .add(job)
                .await
                .map_err(|e| StrataError::internal(format!("Failed to add pattern job: {}", e)))?;
        }

        if self.config.run_on_start {
            debug!("Running initial jobs on start");
            if self.config.enable_decay {
                run_decay(&self.router).await;
            }
            if self.config.enable_patterns {
                run_patterns(&self.router);
            }
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| StrataError::internal(format!("Failed to start job scheduler: {}", e)))?;

        info!(
            decay = self.config.enable_decay,
            patterns = self.config.enable_patterns,
            "Background schedulers started"
        );
        Ok(())
    }

    /// Stop the scheduler and cancel any decay pass at its next item boundary.
    pub async fn shutdown(&mut self) -> StrataResult<()> {
        debug!("Shutting down background schedulers");
        self.router.shutdown();
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| StrataError::internal(format!("Failed to shutdown job scheduler: {}", e)))?;
        info!("Background schedulers stopped");
        Ok(())
    }

    pub fn router(&self) -> &Arc<MemoryRouter> {
        &self.router
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h.max(MIN_INTERVAL_HOURS) * 3600)
}
