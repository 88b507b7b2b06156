//! permscan core - bounded fan-out permission report engine
//!
//! Answers "which resources can this subject reach, and how broadly?":
//! - Resolves a search pattern to resources through a `ResourceDirectory`
//! - Probes each resource concurrently, bounded by a configurable pool
//! - Contains per-resource failures as report rows
//! - Filters outcomes with a named relevance policy
//! - Streams progress and returns a report in deterministic order
//!
//! # Example
//!
//! ```rust,ignore
//! use permscan_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     directory: Arc<dyn ResourceDirectory>,
//! #     probe: Arc<dyn PermissionProbe>,
//! # ) -> Result<(), ReportError> {
//! let engine = ReportEngine::new(directory, probe)
//!     .with_config(EngineConfig::new().with_concurrency(8));
//!
//! let report = engine
//!     .generate(&Subject::new("user@contoso.com"), &"*teams*".into(), RelevanceMode::BroadOnly)
//!     .await?;
//!
//! println!("{} of {} resources reported", report.len(), report.stats().resolved);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod permission;
pub mod probe;
pub mod probe_pool;
pub mod report;
pub mod sink;
pub mod types;

// Re-exports for convenience
pub use cache::{CacheStats, Clock, ListingCache, ManualClock, SystemClock, DEFAULT_LISTING_TTL};
pub use config::{ReportConfig, DEFAULT_PAGE_SIZE};
pub use directory::{DirectoryBackend, PagedDirectory, ResourceDirectory, DEFAULT_MAX_PAGES};
pub use engine::{EngineConfig, ReportEngine};
pub use error::{ConfigError, DirectoryError, ProbeFailure, ReportError, WriteError};
pub use pattern::SearchPattern;
pub use permission::{PermissionKind, PermissionSet, UnknownPermission};
pub use probe::PermissionProbe;
pub use probe_pool::{
    check_limit, PoolStats, ProbeCompletion, ProbePool, DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
};
pub use report::{Report, ReportBuilder, ReportRow, RunStats};
pub use sink::{NullProgress, ProgressSink, ReportWriter, TabularSink};
pub use types::{
    truncate_summary, ProbeOutcome, RelevanceMode, ResourceRef, Subject, DEFAULT_SUMMARY_WIDTH,
    ELLIPSIS,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with permscan core
    pub use crate::{
        DirectoryBackend, EngineConfig, PagedDirectory, PermissionProbe, PermissionSet,
        ProbeFailure, ProbeOutcome, ProgressSink, RelevanceMode, Report, ReportEngine,
        ReportError, ReportWriter, ResourceDirectory, ResourceRef, SearchPattern, Subject,
        TabularSink,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
