//! Report engine
//!
//! Drives one report run:
//! - resolves the search pattern through the `ResourceDirectory`
//! - orders and de-duplicates the resources by id
//! - fans probe calls out through a bounded `ProbePool`
//! - streams one progress line per outcome to the `ProgressSink`
//! - applies the relevance policy and seals the `Report`
//!
//! The join loop in `generate_with_cancel` is the only place that touches
//! the report buffer or the progress sink, so neither needs to be shared
//! with probe tasks.

use crate::directory::ResourceDirectory;
use crate::error::ReportError;
use crate::pattern::SearchPattern;
use crate::probe::PermissionProbe;
use crate::probe_pool::{check_limit, PoolStats, ProbePool, DEFAULT_CONCURRENCY};
use crate::report::{Report, ReportBuilder, ReportRow};
use crate::sink::{NullProgress, ProgressSink};
use crate::types::{ProbeOutcome, RelevanceMode, ResourceRef, Subject, DEFAULT_SUMMARY_WIDTH};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Detail recorded for a resource whose probe task vanished
pub const LOST_TASK_DETAIL: &str = "probe task did not complete";

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum concurrent probe calls
    pub concurrency: usize,
    /// Per-probe deadline
    pub probe_timeout: Option<Duration>,
    /// Progress-line summary width in characters
    pub summary_width: usize,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With concurrency limit
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With per-probe deadline
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// With progress summary width
    #[inline]
    #[must_use]
    pub fn with_summary_width(mut self, width: usize) -> Self {
        self.summary_width = width;
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    /// `ReportError::InvalidConfig` for concurrency outside
    /// `1..=MAX_CONCURRENCY` or a zero timeout.
    pub fn validate(&self) -> Result<(), ReportError> {
        check_limit(self.concurrency)?;
        if self.probe_timeout == Some(Duration::ZERO) {
            return Err(ReportError::InvalidConfig(
                "probe timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: None,
            summary_width: DEFAULT_SUMMARY_WIDTH,
        }
    }
}

/// Bounded fan-out permission report engine
pub struct ReportEngine {
    directory: Arc<dyn ResourceDirectory>,
    probe: Arc<dyn PermissionProbe>,
    progress: Arc<dyn ProgressSink>,
    config: EngineConfig,
    last_pool: Mutex<PoolStats>,
}

impl std::fmt::Debug for ReportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportEngine")
            .field("config", &self.config)
            .field("last_pool", &*self.last_pool.lock())
            .finish_non_exhaustive()
    }
}

impl ReportEngine {
    /// Create engine with default configuration and no progress output
    #[must_use]
    pub fn new(directory: Arc<dyn ResourceDirectory>, probe: Arc<dyn PermissionProbe>) -> Self {
        Self {
            directory,
            probe,
            progress: Arc::new(NullProgress),
            config: EngineConfig::default(),
            last_pool: Mutex::new(PoolStats::default()),
        }
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// With progress sink
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Current configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pool statistics of the most recent run
    #[inline]
    #[must_use]
    pub fn last_pool_stats(&self) -> PoolStats {
        *self.last_pool.lock()
    }

    /// Generate a report
    ///
    /// # Errors
    /// See `generate_with_cancel`.
    pub async fn generate(
        &self,
        subject: &Subject,
        pattern: &SearchPattern,
        relevance: RelevanceMode,
    ) -> Result<Report, ReportError> {
        self.generate_with_cancel(subject, pattern, relevance, CancellationToken::new())
            .await
    }

    /// Generate a report, aborting when `cancel` fires
    ///
    /// # Workflow
    /// 1. Validate the subject and configuration
    /// 2. Resolve, sort and de-duplicate resources
    /// 3. Dispatch one probe per resource through the pool
    /// 4. Record outcomes as they complete, streaming progress
    /// 5. Seal the report in resolved order
    ///
    /// # Errors
    /// - `ReportError::InvalidConfig` for a blank subject or bad tuning
    /// - `ReportError::Directory` if resolution fails; the sink is untouched
    /// - `ReportError::Cancelled` if `cancel` fires; no report is produced
    ///
    /// Individual probe failures never fail the run.
    pub async fn generate_with_cancel(
        &self,
        subject: &Subject,
        pattern: &SearchPattern,
        relevance: RelevanceMode,
        cancel: CancellationToken,
    ) -> Result<Report, ReportError> {
        if subject.is_blank() {
            return Err(ReportError::InvalidConfig("subject is empty".to_string()));
        }
        self.config.validate()?;
        let pool = ProbePool::new(self.config.concurrency)?
            .with_timeout(self.config.probe_timeout);

        let started = Instant::now();
        tracing::info!(%subject, %pattern, %relevance, "starting permission report");

        let resolved = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ReportError::Cancelled),
            resolved = self.directory.resolve(pattern) => resolved,
        };
        let resources = match resolved {
            Ok(resources) => order_resources(resources),
            Err(e) => {
                tracing::error!(error = %e, %pattern, "resource resolution failed");
                return Err(e.into());
            }
        };
        tracing::info!(resources = resources.len(), "resolved resources");

        self.progress.begin_run(subject, resources.len());

        let mut builder = ReportBuilder::new(
            subject.clone(),
            pattern.clone(),
            relevance,
            resources.len(),
        );
        let mut tasks = JoinSet::new();
        for (index, resource) in resources.iter().enumerate() {
            pool.dispatch(
                &mut tasks,
                index,
                resource.clone(),
                subject.clone(),
                Arc::clone(&self.probe),
            );
        }

        loop {
            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    pool.close();
                    *self.last_pool.lock() = pool.stats();
                    tracing::warn!(
                        considered = builder.stats().considered,
                        resolved = resources.len(),
                        "report run cancelled"
                    );
                    return Err(ReportError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            match joined {
                Some(Ok(done)) => {
                    tracing::trace!(index = done.index, elapsed = ?done.elapsed, "probe finished");
                    self.accept(&mut builder, done.index, done.resource, done.outcome);
                }
                Some(Err(e)) => tracing::warn!(error = %e, "probe task lost"),
                None => break,
            }
        }

        for index in builder.pending() {
            let outcome = ProbeOutcome::Failed(LOST_TASK_DETAIL.to_string());
            self.accept(&mut builder, index, resources[index].clone(), outcome);
        }

        *self.last_pool.lock() = pool.stats();
        let report = builder.seal(started.elapsed());
        let stats = report.stats();
        tracing::info!(
            considered = stats.considered,
            kept = stats.kept,
            failed = stats.failed,
            elapsed_ms = stats.elapsed_ms,
            "permission report complete"
        );
        self.progress.end_run(stats);

        Ok(report)
    }

    fn accept(
        &self,
        builder: &mut ReportBuilder,
        index: usize,
        resource: ResourceRef,
        outcome: ProbeOutcome,
    ) {
        let row = ReportRow::new(resource, outcome);
        let line = row.display_summary(self.config.summary_width);
        self.progress.append_live_row(&row.resource.id, &line);

        match &row.outcome {
            ProbeOutcome::Failed(detail) => {
                tracing::warn!(resource = %row.resource, detail = %line, full_len = detail.len(), "probe failed");
            }
            outcome => {
                tracing::debug!(resource = %row.resource, labels = outcome.label_count(), "probe completed");
            }
        }

        builder.record(index, row);
    }
}

/// Sort by id and keep the first of any duplicate ids
fn order_resources(mut resources: Vec<ResourceRef>) -> Vec<ResourceRef> {
    resources.sort_by(|a, b| a.id.cmp(&b.id));
    let before = resources.len();
    resources.dedup_by(|later, first| later.id == first.id);
    if resources.len() != before {
        tracing::debug!(dropped = before - resources.len(), "dropped duplicate resource ids");
    }
    resources
}
