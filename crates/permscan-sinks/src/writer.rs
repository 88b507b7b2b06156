//! Final report writers
//!
//! Reports are staged into a temp file next to the destination and
//! published with a no-clobber persist. The destination either ends up
//! holding the complete report or is left exactly as it was.

use permscan_core::{Report, ReportWriter, WriteError};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Header of the resource column
pub const RESOURCE_HEADER: &str = "ResourceUrl";

/// Header of the permissions column for `subject`
#[must_use]
pub fn permissions_header(subject: &str) -> String {
    format!("Permissions for subject {subject}")
}

/// On-disk report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Two-column CSV
    Csv,
    /// Serialized report
    Json,
}

impl ReportFormat {
    /// Pick the format from the destination's extension
    ///
    /// # Errors
    /// `WriteError::UnsupportedFormat` for any extension other than
    /// `.csv` or `.json`.
    pub fn from_path(path: &Path) -> Result<Self, WriteError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(WriteError::UnsupportedFormat(format!(".{other}"))),
            None => Err(WriteError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// File extension
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Stage content into a temp file and publish it at `destination`
///
/// `fill` writes the content. If it fails, or `destination` appears in the
/// meantime, the temp file is removed and `destination` is not touched.
///
/// # Errors
/// `WriteError::DestinationExists` if something is already at
/// `destination`; the error from `fill`; `WriteError::Io` for staging or
/// publishing failures.
pub fn publish_no_clobber<F>(destination: &Path, fill: F) -> Result<(), WriteError>
where
    F: FnOnce(&mut File) -> Result<(), WriteError>,
{
    if destination.exists() {
        return Err(WriteError::DestinationExists(destination.to_path_buf()));
    }

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(|e| WriteError::io(destination, e))?;
    fill(staged.as_file_mut())?;
    staged
        .as_file_mut()
        .flush()
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| WriteError::io(destination, e))?;

    staged.persist_noclobber(destination).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            WriteError::DestinationExists(destination.to_path_buf())
        } else {
            WriteError::io(destination, e.error)
        }
    })?;

    tracing::info!(path = %destination.display(), "report written");
    Ok(())
}

/// Two-column CSV writer
///
/// Rows carry the full summary, not the truncated progress text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportWriter;

impl CsvReportWriter {
    fn encode(report: &Report, file: &mut File) -> Result<(), WriteError> {
        let mut out = csv::Writer::from_writer(file);
        out.write_record([
            RESOURCE_HEADER.to_string(),
            permissions_header(report.subject().as_str()),
        ])
        .map_err(|e| WriteError::Serialize(e.to_string()))?;

        for row in report.rows() {
            out.write_record([row.resource.id.as_str(), row.summary.as_str()])
                .map_err(|e| WriteError::Serialize(e.to_string()))?;
        }
        out.flush().map_err(|e| WriteError::Serialize(e.to_string()))
    }
}

impl ReportWriter for CsvReportWriter {
    fn write_final(&self, report: &Report, destination: &Path) -> Result<(), WriteError> {
        publish_no_clobber(destination, |file| Self::encode(report, file))
    }
}

/// JSON writer for the sealed report
#[derive(Debug, Clone, Copy)]
pub struct JsonReportWriter {
    pretty: bool,
}

impl JsonReportWriter {
    /// Create writer
    #[must_use]
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Default for JsonReportWriter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReportWriter for JsonReportWriter {
    fn write_final(&self, report: &Report, destination: &Path) -> Result<(), WriteError> {
        publish_no_clobber(destination, |file| {
            let encoded = if self.pretty {
                serde_json::to_writer_pretty(&mut *file, report)
            } else {
                serde_json::to_writer(&mut *file, report)
            };
            encoded.map_err(|e| WriteError::Serialize(e.to_string()))?;
            writeln!(file).map_err(|e| WriteError::io(destination, e))
        })
    }
}

/// Writer that picks CSV or JSON from the destination extension
#[derive(Debug, Clone, Copy, Default)]
pub struct FileReportWriter {
    json: JsonReportWriter,
}

impl ReportWriter for FileReportWriter {
    fn write_final(&self, report: &Report, destination: &Path) -> Result<(), WriteError> {
        match ReportFormat::from_path(destination)? {
            ReportFormat::Csv => CsvReportWriter.write_final(report, destination),
            ReportFormat::Json => self.json.write_final(report, destination),
        }
    }
}
