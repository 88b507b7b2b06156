//! permscan sinks
//!
//! Output side of a report run:
//! - `ProgressTable`: live progress lines plus a counts footer
//! - `CsvReportWriter` / `JsonReportWriter`: staged, no-clobber report files
//! - `ConsoleReportSink`: both together, as one `TabularSink`

#![warn(unreachable_pub)]

pub mod progress;
pub mod writer;

pub use progress::{ProgressTable, LIVE_HEADERS};
pub use writer::{
    permissions_header, publish_no_clobber, CsvReportWriter, FileReportWriter, JsonReportWriter,
    ReportFormat, RESOURCE_HEADER,
};

use permscan_core::{ProgressSink, Report, ReportWriter, RunStats, Subject, WriteError};
use std::io::Write;
use std::path::Path;

/// Progress table and file writer in one sink
#[derive(Debug)]
pub struct ConsoleReportSink<W: Write + Send> {
    progress: ProgressTable<W>,
    writer: FileReportWriter,
}

impl ConsoleReportSink<std::io::Stdout> {
    /// Progress on standard output, format by extension
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(ProgressTable::stdout())
    }
}

impl<W: Write + Send> ConsoleReportSink<W> {
    /// Create over a progress table
    #[must_use]
    pub fn new(progress: ProgressTable<W>) -> Self {
        Self {
            progress,
            writer: FileReportWriter::default(),
        }
    }

    /// Progress half of the sink
    #[inline]
    #[must_use]
    pub fn progress(&self) -> &ProgressTable<W> {
        &self.progress
    }
}

impl<W: Write + Send> ProgressSink for ConsoleReportSink<W> {
    fn begin_run(&self, subject: &Subject, resolved: usize) {
        self.progress.begin_run(subject, resolved);
    }

    fn append_live_row(&self, resource_id: &str, summary: &str) {
        self.progress.append_live_row(resource_id, summary);
    }

    fn end_run(&self, stats: &RunStats) {
        self.progress.end_run(stats);
    }
}

impl<W: Write + Send> ReportWriter for ConsoleReportSink<W> {
    fn write_final(&self, report: &Report, destination: &Path) -> Result<(), WriteError> {
        self.writer.write_final(report, destination)
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
