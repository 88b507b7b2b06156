//! Report and listing runs over an inventory backend

use crate::inventory::{Inventory, InventoryBackend, InventoryError};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use permscan_core::{
    ConfigError, PagedDirectory, ProgressSink, Report, ReportConfig, ReportEngine, ReportError,
    ReportWriter, ResourceDirectory, ResourceRef, SearchPattern, SystemClock, WriteError,
};
use permscan_sinks::ReportFormat;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Process exit code for a successful run
pub const EXIT_OK: u8 = 0;
/// Directory or run failure
pub const EXIT_RUN: u8 = 1;
/// Configuration error
pub const EXIT_CONFIG: u8 = 2;
/// Report could not be written
pub const EXIT_WRITE: u8 = 3;
/// Interrupted by Ctrl-C
pub const EXIT_CANCELLED: u8 = 130;

/// Failure of a command-line run
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Settings are missing or invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Inventory could not be loaded
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Report run failed
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Report file could not be written
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl AppError {
    /// Process exit code for this failure
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Report(ReportError::InvalidConfig(_)) => EXIT_CONFIG,
            Self::Report(ReportError::Cancelled) => EXIT_CANCELLED,
            Self::Inventory(_) | Self::Report(ReportError::Directory(_)) => EXIT_RUN,
            Self::Write(_) => EXIT_WRITE,
        }
    }
}

type InventoryDirectory = PagedDirectory<Arc<InventoryBackend>>;

fn open_backend(
    config: &ReportConfig,
) -> Result<(Arc<InventoryBackend>, InventoryDirectory), AppError> {
    let path = config
        .inventory
        .as_deref()
        .ok_or(ConfigError::Missing("inventory"))?;
    let inventory = Inventory::load(path)?;

    if let Some(endpoint) = config.endpoint.as_deref() {
        if !inventory.serves(endpoint) {
            return Err(ConfigError::Invalid {
                key: "endpoint",
                reason: format!("inventory is for {}, not {endpoint}", inventory.tenant),
            }
            .into());
        }
    }

    let backend = Arc::new(InventoryBackend::new(inventory, config.page_size));
    let directory = PagedDirectory::new(
        Arc::clone(&backend),
        Arc::new(SystemClock),
        config.cache_ttl(),
    );
    Ok((backend, directory))
}

/// Generate a report and write it to the configured destination
///
/// The destination is checked before any probe runs; the writer checks
/// again when publishing.
///
/// # Errors
/// `AppError` classified for `exit_code`.
pub async fn run_report<S>(
    config: &ReportConfig,
    sink: Arc<S>,
    cancel: CancellationToken,
) -> Result<Report, AppError>
where
    S: ProgressSink + ReportWriter + 'static,
{
    config.validate()?;
    let subject = config.subject().ok_or(ConfigError::Missing("subject"))?;
    let destination = config
        .destination
        .as_deref()
        .ok_or(ConfigError::Missing("destination"))?;

    ReportFormat::from_path(destination)?;
    if destination.exists() {
        return Err(WriteError::DestinationExists(destination.to_path_buf()).into());
    }

    let (backend, directory) = open_backend(config)?;
    let engine = ReportEngine::new(Arc::new(directory), backend)
        .with_config(config.engine_config())
        .with_progress(sink.clone());

    let report = engine
        .generate_with_cancel(&subject, &config.search_pattern(), config.relevance, cancel)
        .await?;

    sink.write_final(&report, destination)?;
    tracing::info!(
        path = %destination.display(),
        rows = report.len(),
        "report saved"
    );
    Ok(report)
}

/// Result of a `sites` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteListing {
    /// Sites in the tenant
    pub tenant_size: usize,
    /// Pattern the matches were resolved with
    pub pattern: SearchPattern,
    /// Matching sites, sorted by url
    pub matches: Vec<ResourceRef>,
}

impl SiteListing {
    /// Render as a table with a count line
    #[must_use]
    pub fn render(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                ["Url", "Title", "Owner"]
                    .iter()
                    .map(|h| Cell::new(h).fg(Color::Cyan)),
            );
        for site in &self.matches {
            table.add_row(vec![
                site.id.as_str(),
                site.display_name.as_str(),
                site.owner.as_deref().unwrap_or(""),
            ]);
        }

        format!(
            "Found {} sites in the tenant.\n{table}\n{} sites match {}",
            self.tenant_size,
            self.matches.len(),
            self.pattern
        )
    }
}

/// Enumerate the tenant and resolve the configured pattern
///
/// # Errors
/// `AppError` classified for `exit_code`.
pub async fn list_sites(config: &ReportConfig) -> Result<SiteListing, AppError> {
    config.validate_tuning()?;
    let (_, directory) = open_backend(config)?;

    let tenant_size = directory.tenant_size().await.map_err(ReportError::from)?;
    let pattern = config.search_pattern();
    let mut matches = directory
        .resolve(&pattern)
        .await
        .map_err(ReportError::from)?;
    matches.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(SiteListing {
        tenant_size,
        pattern,
        matches,
    })
}
