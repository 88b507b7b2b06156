//! Run configuration
//!
//! `ReportConfig` is the file-level view of a run: everything the command
//! line accepts, loadable from TOML. Missing keys take their defaults, and
//! command-line flags are layered on top by the binary with the `with_*`
//! builders.

use crate::cache::DEFAULT_LISTING_TTL;
use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::pattern::SearchPattern;
use crate::probe_pool::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use crate::types::{RelevanceMode, Subject, DEFAULT_SUMMARY_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default page size for paged tenant enumeration
pub const DEFAULT_PAGE_SIZE: usize = 300;

/// Settings for one report run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Admin endpoint of the tenant
    pub endpoint: Option<String>,
    /// Tenant inventory snapshot used as the backend
    pub inventory: Option<PathBuf>,
    /// Subject to check
    pub subject: Option<String>,
    /// Resource search pattern; empty means every resource
    pub pattern: Option<String>,
    /// Report file
    pub destination: Option<PathBuf>,
    /// Relevance policy
    pub relevance: RelevanceMode,
    /// Maximum concurrent probes
    pub concurrency: usize,
    /// Per-probe deadline in seconds
    pub probe_timeout_secs: Option<u64>,
    /// Tenant listing cache lifetime in seconds
    pub cache_ttl_secs: u64,
    /// Resources per enumeration page
    pub page_size: usize,
}

impl ReportConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` for invalid TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// `ConfigError::Read` if the file cannot be read, `ConfigError::Parse`
    /// if it is not a valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// With endpoint
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// With inventory file
    #[inline]
    #[must_use]
    pub fn with_inventory(mut self, path: impl Into<PathBuf>) -> Self {
        self.inventory = Some(path.into());
        self
    }

    /// With subject
    #[inline]
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// With search pattern
    #[inline]
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// With report destination
    #[inline]
    #[must_use]
    pub fn with_destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    /// With relevance policy
    #[inline]
    #[must_use]
    pub fn with_relevance(mut self, relevance: RelevanceMode) -> Self {
        self.relevance = relevance;
        self
    }

    /// With concurrency limit
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With per-probe deadline
    #[inline]
    #[must_use]
    pub fn with_probe_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = Some(secs);
        self
    }

    /// With listing cache lifetime
    #[inline]
    #[must_use]
    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check that a report run can start
    ///
    /// # Errors
    /// `ConfigError::Missing` for an absent subject or destination,
    /// `ConfigError::Invalid` for zero-valued tunables or a blank subject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let subject = self.subject.as_deref().ok_or(ConfigError::Missing("subject"))?;
        if subject.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "subject",
                reason: "must not be blank".to_string(),
            });
        }
        if self.destination.is_none() {
            return Err(ConfigError::Missing("destination"));
        }
        self.validate_tuning()
    }

    /// Check only the tunables, for runs that do not probe
    ///
    /// # Errors
    /// `ConfigError::Invalid` for zero concurrency, timeout or page size, or
    /// concurrency above `MAX_CONCURRENCY`.
    pub fn validate_tuning(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid {
                key: "concurrency",
                reason: format!("must be at most {MAX_CONCURRENCY}"),
            });
        }
        if self.probe_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                key: "probe_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Subject, if set
    #[must_use]
    pub fn subject(&self) -> Option<Subject> {
        self.subject.as_deref().map(Subject::new)
    }

    /// Parsed search pattern (all resources when unset)
    #[must_use]
    pub fn search_pattern(&self) -> SearchPattern {
        self.pattern
            .as_deref()
            .map_or(SearchPattern::All, SearchPattern::parse)
    }

    /// Listing cache lifetime
    #[inline]
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Engine tuning derived from this configuration
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_concurrency(self.concurrency)
            .with_probe_timeout(self.probe_timeout_secs.map(Duration::from_secs))
            .with_summary_width(DEFAULT_SUMMARY_WIDTH)
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            inventory: None,
            subject: None,
            pattern: None,
            destination: None,
            relevance: RelevanceMode::default(),
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout_secs: None,
            cache_ttl_secs: DEFAULT_LISTING_TTL.as_secs(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
