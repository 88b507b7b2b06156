//! Report assembly
//!
//! Probe results arrive in completion order. `ReportBuilder` keeps one slot
//! per resolved resource so the sealed `Report` is always in resolved order,
//! whatever order the probes finished in.

use crate::pattern::SearchPattern;
use crate::types::{truncate_summary, ProbeOutcome, RelevanceMode, ResourceRef, Subject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One considered resource with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Probed resource
    pub resource: ResourceRef,
    /// Probe outcome
    pub outcome: ProbeOutcome,
    /// Full rendered summary (joined labels or error text)
    pub summary: String,
}

impl ReportRow {
    /// Create a row, rendering the summary from the outcome
    #[must_use]
    pub fn new(resource: ResourceRef, outcome: ProbeOutcome) -> Self {
        let summary = outcome.summary();
        Self {
            resource,
            outcome,
            summary,
        }
    }

    /// Summary condensed for a progress line
    #[inline]
    #[must_use]
    pub fn display_summary(&self, max_chars: usize) -> String {
        truncate_summary(&self.summary, max_chars)
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Resources returned by the directory (after dedup)
    pub resolved: usize,
    /// Outcomes received
    pub considered: usize,
    /// Rows that passed the relevance filter
    pub kept: usize,
    /// `Granted` outcomes
    pub granted: usize,
    /// `Empty` outcomes
    pub empty: usize,
    /// `Failed` outcomes
    pub failed: usize,
    /// Wall time of the run in milliseconds
    pub elapsed_ms: u64,
}

impl RunStats {
    /// Outcomes dropped by the relevance filter
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.considered - self.kept
    }
}

/// Sealed, immutable report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    subject: Subject,
    pattern: SearchPattern,
    relevance: RelevanceMode,
    generated_at: DateTime<Utc>,
    stats: RunStats,
    rows: Vec<ReportRow>,
}

impl Report {
    /// Subject the report was generated for
    #[inline]
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Search pattern used to resolve resources
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &SearchPattern {
        &self.pattern
    }

    /// Relevance policy applied
    #[inline]
    #[must_use]
    pub fn relevance(&self) -> RelevanceMode {
        self.relevance
    }

    /// Time the report was sealed
    #[inline]
    #[must_use]
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Run counters
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Kept rows in resolved order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Number of kept rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if nothing passed the filter
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resource ids of kept rows, in order
    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.resource.id.as_str())
    }

    /// Find the row for a resource id
    #[must_use]
    pub fn row(&self, id: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.resource.id == id)
    }
}

/// Mutable report under construction
#[derive(Debug)]
pub struct ReportBuilder {
    subject: Subject,
    pattern: SearchPattern,
    relevance: RelevanceMode,
    slots: Vec<Option<ReportRow>>,
    seen: Vec<bool>,
    stats: RunStats,
}

impl ReportBuilder {
    /// Start a report for `resolved` resources
    #[must_use]
    pub fn new(
        subject: Subject,
        pattern: SearchPattern,
        relevance: RelevanceMode,
        resolved: usize,
    ) -> Self {
        Self {
            subject,
            pattern,
            relevance,
            slots: vec![None; resolved],
            seen: vec![false; resolved],
            stats: RunStats {
                resolved,
                ..RunStats::default()
            },
        }
    }

    /// Record the outcome for the resource at resolved position `index`
    ///
    /// Returns true if the row passed the relevance filter. A second record
    /// for the same index, or an out-of-range index, is ignored.
    pub fn record(&mut self, index: usize, row: ReportRow) -> bool {
        match self.seen.get_mut(index) {
            Some(seen) if !*seen => *seen = true,
            _ => {
                tracing::warn!(index, resource = %row.resource, "ignoring duplicate outcome");
                return false;
            }
        }

        self.stats.considered += 1;
        match row.outcome {
            ProbeOutcome::Granted(_) => self.stats.granted += 1,
            ProbeOutcome::Empty => self.stats.empty += 1,
            ProbeOutcome::Failed(_) => self.stats.failed += 1,
        }

        let kept = self.relevance.keeps(&row.outcome);
        if kept {
            self.stats.kept += 1;
            self.slots[index] = Some(row);
        }
        kept
    }

    /// Check if an outcome was recorded for `index`
    #[inline]
    #[must_use]
    pub fn is_recorded(&self, index: usize) -> bool {
        self.seen.get(index).copied().unwrap_or(false)
    }

    /// Indices still waiting for an outcome
    #[must_use]
    pub fn pending(&self) -> Vec<usize> {
        self.seen
            .iter()
            .enumerate()
            .filter(|(_, seen)| !**seen)
            .map(|(i, _)| i)
            .collect()
    }

    /// Current counters
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Seal into an immutable report in resolved order
    #[must_use]
    pub fn seal(self, elapsed: Duration) -> Report {
        let mut stats = self.stats;
        stats.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        Report {
            subject: self.subject,
            pattern: self.pattern,
            relevance: self.relevance,
            generated_at: Utc::now(),
            stats,
            rows: self.slots.into_iter().flatten().collect(),
        }
    }
}
