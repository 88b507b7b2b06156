//! Bounded probe pool
//!
//! Every resource gets its own task, but a task only calls the probe while
//! holding one of `limit` semaphore permits, so at most `limit` probe calls
//! are outstanding against the remote service at any moment.
//!
//! Each task always yields a `ProbeCompletion`: probe errors, timeouts and
//! panics are turned into `ProbeOutcome::Failed` inside the task.

use crate::error::{ProbeFailure, ReportError};
use crate::probe::PermissionProbe;
use crate::types::{ProbeOutcome, ResourceRef, Subject};
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default pool size; conservative to stay under upstream throttling
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Largest accepted pool size (the semaphore permit ceiling)
pub const MAX_CONCURRENCY: usize = Semaphore::MAX_PERMITS;

/// Check a concurrency limit against the pool bounds
///
/// # Errors
/// `ReportError::InvalidConfig` if `limit` is zero or above `MAX_CONCURRENCY`.
pub fn check_limit(limit: usize) -> Result<(), ReportError> {
    if limit == 0 {
        return Err(ReportError::InvalidConfig(
            "concurrency must be at least 1".to_string(),
        ));
    }
    if limit > MAX_CONCURRENCY {
        return Err(ReportError::InvalidConfig(format!(
            "concurrency must be at most {MAX_CONCURRENCY}"
        )));
    }
    Ok(())
}

/// Outcome of one pooled probe
#[derive(Debug, Clone)]
pub struct ProbeCompletion {
    /// Resolved position of the resource
    pub index: usize,
    /// Probed resource
    pub resource: ResourceRef,
    /// Classified result
    pub outcome: ProbeOutcome,
    /// Time spent inside the probe call
    pub elapsed: Duration,
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks handed to the pool
    pub dispatched: usize,
    /// Tasks that produced a completion
    pub completed: usize,
    /// Probe calls currently running
    pub active: usize,
    /// Highest number of simultaneous probe calls
    pub peak_active: usize,
    /// Completions with a `Failed` outcome
    pub failed: usize,
    /// Probe calls cut off by the timeout
    pub timed_out: usize,
    /// Probe calls that panicked
    pub panicked: usize,
}

/// Bounded pool for permission probes
#[derive(Debug, Clone)]
pub struct ProbePool {
    limit: usize,
    timeout: Option<Duration>,
    permits: Arc<Semaphore>,
    stats: Arc<Mutex<PoolStats>>,
}

impl ProbePool {
    /// Create a pool allowing `limit` concurrent probe calls
    ///
    /// # Errors
    /// `ReportError::InvalidConfig` if `limit` is zero or above
    /// [`MAX_CONCURRENCY`].
    pub fn new(limit: usize) -> Result<Self, ReportError> {
        check_limit(limit)?;
        Ok(Self {
            limit,
            timeout: None,
            permits: Arc::new(Semaphore::new(limit)),
            stats: Arc::new(Mutex::new(PoolStats::default())),
        })
    }

    /// With per-probe deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Concurrency limit
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    /// Spawn a probe task into `tasks`
    pub fn dispatch(
        &self,
        tasks: &mut JoinSet<ProbeCompletion>,
        index: usize,
        resource: ResourceRef,
        subject: Subject,
        probe: Arc<dyn PermissionProbe>,
    ) {
        self.stats.lock().dispatched += 1;

        let permits = Arc::clone(&self.permits);
        let stats = Arc::clone(&self.stats);
        let timeout = self.timeout;

        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                let outcome = ProbeOutcome::Failed("probe pool closed".to_string());
                return finish(&stats, index, resource, outcome, Duration::ZERO);
            };

            let active = ActiveGuard::enter(&stats);
            let started = Instant::now();
            let result = run_probe(probe.as_ref(), &resource, &subject, timeout).await;
            let elapsed = started.elapsed();
            drop(active);

            {
                let mut s = stats.lock();
                match &result {
                    Err(ProbeFailure::Timeout { .. }) => s.timed_out += 1,
                    Err(ProbeFailure::Panicked(_)) => s.panicked += 1,
                    _ => {}
                }
            }

            finish(&stats, index, resource, ProbeOutcome::from_result(result), elapsed)
        });
    }

    /// Close the pool; queued tasks complete with a failure
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for ProbePool {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CONCURRENCY,
            timeout: None,
            permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            stats: Arc::new(Mutex::new(PoolStats::default())),
        }
    }
}

/// Counts one running probe call; released on drop so aborted tasks
/// leave `active` accurate
struct ActiveGuard<'a> {
    stats: &'a Mutex<PoolStats>,
}

impl<'a> ActiveGuard<'a> {
    fn enter(stats: &'a Mutex<PoolStats>) -> Self {
        let mut s = stats.lock();
        s.active += 1;
        s.peak_active = s.peak_active.max(s.active);
        drop(s);
        Self { stats }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.stats.lock().active -= 1;
    }
}

async fn run_probe(
    probe: &dyn PermissionProbe,
    resource: &ResourceRef,
    subject: &Subject,
    timeout: Option<Duration>,
) -> Result<crate::permission::PermissionSet, ProbeFailure> {
    let call = AssertUnwindSafe(probe.check(resource, subject)).catch_unwind();

    let caught = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(caught) => caught,
            Err(_) => {
                return Err(ProbeFailure::Timeout {
                    after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }
        },
        None => call.await,
    };

    caught.unwrap_or_else(|payload| Err(ProbeFailure::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn finish(
    stats: &Mutex<PoolStats>,
    index: usize,
    resource: ResourceRef,
    outcome: ProbeOutcome,
    elapsed: Duration,
) -> ProbeCompletion {
    let mut s = stats.lock();
    s.completed += 1;
    if outcome.is_failed() {
        s.failed += 1;
    }
    drop(s);

    ProbeCompletion {
        index,
        resource,
        outcome,
        elapsed,
    }
}
