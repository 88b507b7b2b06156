//! Report sink contracts
//!
//! The engine only ever talks to a `ProgressSink`, from a single task, so
//! implementations see one call at a time. Persisting the sealed report is
//! the caller's step, through a `ReportWriter`. A `TabularSink` does both.

use crate::error::WriteError;
use crate::report::{Report, RunStats};
use crate::types::Subject;
use std::path::Path;

/// Live progress output
pub trait ProgressSink: Send + Sync {
    /// Header: resources resolved, before any probe runs
    fn begin_run(&self, _subject: &Subject, _resolved: usize) {}

    /// One line per considered resource, in completion order
    fn append_live_row(&self, resource_id: &str, summary: &str);

    /// Footer: counts after the report is sealed
    fn end_run(&self, _stats: &RunStats) {}
}

/// Durable report output
pub trait ReportWriter: Send + Sync {
    /// Persist a sealed report
    ///
    /// # Errors
    /// `WriteError::DestinationExists` if `destination` exists (it is never
    /// overwritten); other variants if staging or publishing fails. Nothing
    /// is left at `destination` on failure.
    fn write_final(&self, report: &Report, destination: &Path) -> Result<(), WriteError>;
}

/// Sink that renders progress and persists the final report
pub trait TabularSink: ProgressSink + ReportWriter {}

impl<T: ProgressSink + ReportWriter + ?Sized> TabularSink for T {}

/// Progress sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn append_live_row(&self, _resource_id: &str, _summary: &str) {}
}

impl<T: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<T> {
    fn begin_run(&self, subject: &Subject, resolved: usize) {
        (**self).begin_run(subject, resolved);
    }

    fn append_live_row(&self, resource_id: &str, summary: &str) {
        (**self).append_live_row(resource_id, summary);
    }

    fn end_run(&self, stats: &RunStats) {
        (**self).end_run(stats);
    }
}
