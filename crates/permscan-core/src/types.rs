//! Core types for permscan
//!
//! Defines the values that flow through a report run:
//! - resources and the subject being checked
//! - per-resource probe outcomes
//! - the relevance policy deciding which outcomes are reported
//! - summary rendering for the progress stream

use crate::error::ProbeFailure;
use crate::permission::PermissionSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default progress-line summary width, in characters
pub const DEFAULT_SUMMARY_WIDTH: usize = 60;

/// Marker appended to truncated summaries
pub const ELLIPSIS: &str = "...";

/// A resource under inspection (one site collection)
///
/// Immutable once resolved by a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Canonical URL or path
    pub id: String,
    /// Human-readable title
    pub display_name: String,
    /// Owner contact, when the directory knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl ResourceRef {
    /// Create a resource reference
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            owner: None,
        }
    }

    /// With owner contact
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Identity whose access is being checked (user login or claim)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Wrap a subject identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as given
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for empty or whitespace-only identifiers
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Result of probing one resource for one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Subject holds these permissions
    Granted(PermissionSet),
    /// Subject holds no permissions
    Empty,
    /// Probe failed; the detail is kept for the report
    Failed(String),
}

impl ProbeOutcome {
    /// Classify a probe result
    #[must_use]
    pub fn from_result(result: Result<PermissionSet, ProbeFailure>) -> Self {
        match result {
            Ok(set) if set.is_empty() => Self::Empty,
            Ok(set) => Self::Granted(set),
            Err(failure) => Self::Failed(failure.to_string()),
        }
    }

    /// Number of granted labels (0 for `Empty` and `Failed`)
    #[inline]
    #[must_use]
    pub fn label_count(&self) -> usize {
        match self {
            Self::Granted(set) => set.len(),
            Self::Empty | Self::Failed(_) => 0,
        }
    }

    /// True for `Failed`
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Joined labels, error text, or empty string
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Granted(set) => set.joined(),
            Self::Empty => String::new(),
            Self::Failed(detail) => detail.clone(),
        }
    }
}

/// Policy deciding which outcomes make it into the report
///
/// `Failed` outcomes are kept under every policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceMode {
    /// Keep grants with more than one label (incidental access is dropped)
    #[default]
    BroadOnly,
    /// Keep every outcome
    All,
    /// Keep grants with at least this many labels
    AtLeast(usize),
}

impl RelevanceMode {
    /// Label threshold applied to `Granted`, if any
    #[inline]
    #[must_use]
    pub fn min_labels(self) -> Option<usize> {
        match self {
            Self::BroadOnly => Some(2),
            Self::AtLeast(n) => Some(n),
            Self::All => None,
        }
    }

    /// Decide if an outcome is reported
    #[must_use]
    pub fn keeps(self, outcome: &ProbeOutcome) -> bool {
        let Some(min) = self.min_labels() else {
            return true;
        };
        match outcome {
            ProbeOutcome::Failed(_) => true,
            ProbeOutcome::Granted(set) => set.len() >= min,
            ProbeOutcome::Empty => min == 0,
        }
    }
}

impl fmt::Display for RelevanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BroadOnly => f.write_str("broad-only"),
            Self::All => f.write_str("all"),
            Self::AtLeast(n) => write!(f, "at-least-{n}"),
        }
    }
}

/// Condense a summary for a progress line
///
/// Keeps the first line only and caps it at `max_chars` characters,
/// appending `...` when anything was cut.
#[must_use]
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    let first = text.lines().next().unwrap_or("");
    let cut_lines = first.len() < text.trim_end_matches(['\r', '\n']).len();

    match first.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &first[..byte_idx]),
        None if cut_lines => format!("{first}{ELLIPSIS}"),
        None => first.to_string(),
    }
}
