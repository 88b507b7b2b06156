//! Error types for permscan core
//!
//! The taxonomy follows how far a failure is allowed to travel:
//! - `ProbeFailure` is contained to one resource and becomes a `Failed` row
//! - `DirectoryError` aborts the run before any probe is dispatched
//! - `WriteError` is returned by report writers; the report survives it
//! - `ReportError` is what `ReportEngine::generate` returns
//! - `ConfigError` covers loading and validating run settings

use std::path::PathBuf;

/// Top-level error for a report run
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Run parameters are unusable (blank subject, zero concurrency, ...)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource resolution failed; no probe was dispatched
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// The caller aborted the run; no report was produced
    #[error("report run cancelled")]
    Cancelled,
}

impl ReportError {
    /// Check if the same run could succeed when attempted again
    ///
    /// Directory failures are usually transient (expired credentials,
    /// throttling mid-enumeration). Configuration and cancellation are not.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Check if the run was aborted by the caller
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Resource enumeration / resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Paging broke before the listing was complete; partial pages were discarded
    #[error("enumeration aborted after {fetched} resources: {reason}")]
    Enumeration {
        /// Resources fetched before the failure (all discarded)
        fetched: usize,
        /// Backend failure description
        reason: String,
    },

    /// Direct single-resource lookup failed
    #[error("lookup of '{id}' failed: {reason}")]
    Lookup {
        /// Resource id that was looked up
        id: String,
        /// Backend failure description
        reason: String,
    },

    /// Backend never returned an empty page
    #[error("enumeration did not terminate after {pages} pages")]
    Unbounded {
        /// Pages fetched before giving up
        pages: usize,
    },

    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

/// Failure of a single permission probe
///
/// Never aborts a run; the engine records it as `ProbeOutcome::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    /// Remote call failed (network, throttling, server error)
    #[error("{0}")]
    Remote(String),

    /// Caller is not allowed to inspect the resource
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Probe exceeded the per-probe deadline
    #[error("probe timed out after {after_ms}ms")]
    Timeout {
        /// Deadline in milliseconds
        after_ms: u64,
    },

    /// Probe implementation panicked
    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl ProbeFailure {
    /// Create a remote failure
    #[inline]
    pub fn remote(detail: impl Into<String>) -> Self {
        Self::Remote(detail.into())
    }
}

/// Report persistence errors
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Destination already exists; it is never overwritten
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Filesystem failure while staging or publishing
    #[error("cannot write {}: {source}", path.display())]
    Io {
        /// Destination being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Row encoding failed
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// No writer for the destination's extension
    #[error("unsupported report format: {0}")]
    UnsupportedFormat(String),
}

impl WriteError {
    /// Wrap an io error for a destination
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the failure was caused by an existing destination
    #[inline]
    #[must_use]
    pub fn is_destination_exists(&self) -> bool {
        matches!(self, Self::DestinationExists(_))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `ReportConfig`
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Required setting missing
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// Setting present but unusable
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
