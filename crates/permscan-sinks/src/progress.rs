//! Live progress output
//!
//! Each considered resource is printed the moment its outcome is known and
//! also kept in a comfy-table. At the end of the run that table is printed
//! in full, followed by a small counts table.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use parking_lot::Mutex;
use permscan_core::{ProgressSink, RunStats, Subject};
use std::io::{self, Write};

/// Column headers of the live table
pub const LIVE_HEADERS: [&str; 2] = ["Resource URL", "Permissions"];

struct Inner<W> {
    out: W,
    table: Table,
    rows: usize,
}

/// Progress sink writing live lines to any `io::Write`
pub struct ProgressTable<W: Write + Send> {
    inner: Mutex<Inner<W>>,
}

impl ProgressTable<io::Stdout> {
    /// Progress on standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ProgressTable<W> {
    /// Create over a writer
    #[must_use]
    pub fn new(out: W) -> Self {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(LIVE_HEADERS.iter().map(|h| Cell::new(h).fg(Color::Cyan)));

        Self {
            inner: Mutex::new(Inner {
                out,
                table,
                rows: 0,
            }),
        }
    }

    /// Number of live rows seen
    #[must_use]
    pub fn rows_seen(&self) -> usize {
        self.inner.lock().rows
    }

    /// Every live row so far, rendered as a table
    #[must_use]
    pub fn render_live_table(&self) -> String {
        self.inner.lock().table.to_string()
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.inner.into_inner().out
    }

    fn emit(inner: &mut Inner<W>, text: &str) {
        if let Err(e) = writeln!(inner.out, "{text}").and_then(|()| inner.out.flush()) {
            tracing::warn!(error = %e, "failed to write progress output");
        }
    }
}

impl<W: Write + Send> ProgressSink for ProgressTable<W> {
    fn begin_run(&self, subject: &Subject, resolved: usize) {
        let mut inner = self.inner.lock();
        Self::emit(
            &mut inner,
            &format!("Validating {resolved} resources for subject {subject}"),
        );
    }

    fn append_live_row(&self, resource_id: &str, summary: &str) {
        let mut inner = self.inner.lock();
        inner.rows += 1;
        inner.table.add_row(vec![resource_id, summary]);
        Self::emit(&mut inner, &format!("{resource_id} - {summary}"));
    }

    fn end_run(&self, stats: &RunStats) {
        let mut footer = Table::new();
        footer
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![Cell::new("Outcome").fg(Color::Cyan), Cell::new("Count").fg(Color::Cyan)]);

        for (label, count, color) in [
            ("resolved", stats.resolved, None),
            ("granted", stats.granted, Some(Color::Green)),
            ("empty", stats.empty, None),
            ("failed", stats.failed, Some(Color::Red)),
            ("reported", stats.kept, None),
            ("filtered out", stats.dropped(), None),
        ] {
            let value = Cell::new(count);
            footer.add_row(vec![
                Cell::new(label),
                match color {
                    Some(c) if count > 0 => value.fg(c),
                    _ => value,
                },
            ]);
        }

        let mut inner = self.inner.lock();
        if inner.rows > 0 {
            let live = inner.table.to_string();
            Self::emit(&mut inner, &live);
        }
        Self::emit(&mut inner, &footer.to_string());
        Self::emit(
            &mut inner,
            &format!("{} rows reported in {}ms", stats.kept, stats.elapsed_ms),
        );
    }
}

impl<W: Write + Send> std::fmt::Debug for ProgressTable<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTable")
            .field("rows", &self.rows_seen())
            .finish_non_exhaustive()
    }
}
