//! Testing utilities for the permscan workspace
//!
//! Scripted collaborators for engine tests: a directory with a fixed answer,
//! a probe with per-resource results and a concurrency gauge, and a sink
//! that records every call.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use permscan_core::{
    DirectoryError, PermissionProbe, PermissionSet, ProbeFailure, ProgressSink,
    ResourceDirectory, ResourceRef, RunStats, SearchPattern, Subject,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub use permscan_core::ManualClock;

/// `n` resources with ids `https://tenant/sites/site-000` upwards
pub fn sites(n: usize) -> Vec<ResourceRef> {
    (0..n)
        .map(|i| ResourceRef::new(format!("https://tenant/sites/site-{i:03}"), format!("Site {i}")))
        .collect()
}

/// Resources with the given ids
pub fn resources(ids: &[&str]) -> Vec<ResourceRef> {
    ids.iter().map(|id| ResourceRef::new(*id, *id)).collect()
}

/// Permission set from labels
pub fn labels(items: &[&str]) -> PermissionSet {
    PermissionSet::from_labels(items.iter().copied())
}

pub fn subject() -> Subject {
    Subject::new("user@contoso.com")
}

/// Directory returning a fixed result
#[derive(Debug)]
pub struct StubDirectory {
    result: Result<Vec<ResourceRef>, DirectoryError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubDirectory {
    pub fn with_resources(resources: Vec<ResourceRef>) -> Self {
        Self {
            result: Ok(resources),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: DirectoryError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceDirectory for StubDirectory {
    async fn resolve(&self, _pattern: &SearchPattern) -> Result<Vec<ResourceRef>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Probe with scripted per-resource results
///
/// Tracks how many checks run at once so tests can assert the pool bound.
#[derive(Debug)]
pub struct StubProbe {
    default: Result<PermissionSet, ProbeFailure>,
    results: HashMap<String, Result<PermissionSet, ProbeFailure>>,
    delays: HashMap<String, Duration>,
    delay: Duration,
    panics: HashSet<String>,
    hangs: HashSet<String>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StubProbe {
    /// Every resource grants `granted`
    pub fn granting(granted: PermissionSet) -> Self {
        Self::with_default(Ok(granted))
    }

    /// Every resource fails with `failure`
    pub fn failing(failure: ProbeFailure) -> Self {
        Self::with_default(Err(failure))
    }

    fn with_default(default: Result<PermissionSet, ProbeFailure>) -> Self {
        Self {
            default,
            results: HashMap::new(),
            delays: HashMap::new(),
            delay: Duration::ZERO,
            panics: HashSet::new(),
            hangs: HashSet::new(),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_result(mut self, id: &str, result: Result<PermissionSet, ProbeFailure>) -> Self {
        self.results.insert(id.to_string(), result);
        self
    }

    /// Delay applied to every check
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay for one resource, replacing the common delay
    #[must_use]
    pub fn with_delay_for(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    #[must_use]
    pub fn panicking_on(mut self, id: &str) -> Self {
        self.panics.insert(id.to_string());
        self
    }

    /// Never answer for `id`
    #[must_use]
    pub fn hanging_on(mut self, id: &str) -> Self {
        self.hangs.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous checks observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Resource ids in the order checks started
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionProbe for StubProbe {
    async fn check(
        &self,
        resource: &ResourceRef,
        _subject: &Subject,
    ) -> Result<PermissionSet, ProbeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(resource.id.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        if self.hangs.contains(&resource.id) {
            std::future::pending::<()>().await;
        }

        let delay = self.delays.get(&resource.id).copied().unwrap_or(self.delay);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        if self.panics.contains(&resource.id) {
            panic!("stub probe panic on {}", resource.id);
        }

        self.results
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// One recorded sink call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Begin { subject: String, resolved: usize },
    Row { resource_id: String, summary: String },
    End(RunStats),
}

/// Progress sink that records every call
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Live rows as `(resource_id, summary)`, in arrival order
    pub fn rows(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Row {
                    resource_id,
                    summary,
                } => Some((resource_id.clone(), summary.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ProgressSink for RecordingSink {
    fn begin_run(&self, subject: &Subject, resolved: usize) {
        self.events.lock().push(SinkEvent::Begin {
            subject: subject.to_string(),
            resolved,
        });
    }

    fn append_live_row(&self, resource_id: &str, summary: &str) {
        self.events.lock().push(SinkEvent::Row {
            resource_id: resource_id.to_string(),
            summary: summary.to_string(),
        });
    }

    fn end_run(&self, stats: &RunStats) {
        self.events.lock().push(SinkEvent::End(*stats));
    }
}
