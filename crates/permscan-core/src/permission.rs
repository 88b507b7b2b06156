//! Permission vocabulary and permission sets
//!
//! `PermissionSet` is what a probe hands back to the engine: an ordered,
//! duplicate-free list of labels. `PermissionKind` is the fixed vocabulary
//! those labels come from, together with the bit layout used by tenant
//! permission masks so probe implementations can decode raw masks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base permission kinds with their mask bit numbers
///
/// Bit number `n` corresponds to mask bit `n - 1`. `FullMask` is not a
/// bit of its own: it is reported when every defined bit is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum PermissionKind {
    ViewListItems,
    AddListItems,
    EditListItems,
    DeleteListItems,
    ApproveItems,
    OpenItems,
    ViewVersions,
    DeleteVersions,
    CancelCheckout,
    ManagePersonalViews,
    ManageLists,
    ViewFormPages,
    AnonymousSearchAccessList,
    Open,
    ViewPages,
    AddAndCustomizePages,
    ApplyThemeAndBorder,
    ApplyStyleSheets,
    ViewUsageData,
    CreateSSCSite,
    ManageSubwebs,
    CreateGroups,
    ManagePermissions,
    BrowseDirectories,
    BrowseUserInfo,
    AddDelPrivateWebParts,
    UpdatePersonalWebParts,
    ManageWeb,
    AnonymousSearchAccessWebLists,
    UseClientIntegration,
    UseRemoteAPIs,
    ManageAlerts,
    CreateAlerts,
    EditMyUserInfo,
    EnumeratePermissions,
    FullMask,
}

/// Every defined mask bit set (bits 0..=62)
const FULL_MASK_BITS: u64 = 0x7FFF_FFFF_FFFF_FFFF;

impl PermissionKind {
    /// All kinds in vocabulary (bit) order
    pub const ALL: [PermissionKind; 36] = [
        Self::ViewListItems,
        Self::AddListItems,
        Self::EditListItems,
        Self::DeleteListItems,
        Self::ApproveItems,
        Self::OpenItems,
        Self::ViewVersions,
        Self::DeleteVersions,
        Self::CancelCheckout,
        Self::ManagePersonalViews,
        Self::ManageLists,
        Self::ViewFormPages,
        Self::AnonymousSearchAccessList,
        Self::Open,
        Self::ViewPages,
        Self::AddAndCustomizePages,
        Self::ApplyThemeAndBorder,
        Self::ApplyStyleSheets,
        Self::ViewUsageData,
        Self::CreateSSCSite,
        Self::ManageSubwebs,
        Self::CreateGroups,
        Self::ManagePermissions,
        Self::BrowseDirectories,
        Self::BrowseUserInfo,
        Self::AddDelPrivateWebParts,
        Self::UpdatePersonalWebParts,
        Self::ManageWeb,
        Self::AnonymousSearchAccessWebLists,
        Self::UseClientIntegration,
        Self::UseRemoteAPIs,
        Self::ManageAlerts,
        Self::CreateAlerts,
        Self::EditMyUserInfo,
        Self::EnumeratePermissions,
        Self::FullMask,
    ];

    /// Bit number in the tenant mask layout (1-based)
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::ViewListItems => 1,
            Self::AddListItems => 2,
            Self::EditListItems => 3,
            Self::DeleteListItems => 4,
            Self::ApproveItems => 5,
            Self::OpenItems => 6,
            Self::ViewVersions => 7,
            Self::DeleteVersions => 8,
            Self::CancelCheckout => 9,
            Self::ManagePersonalViews => 10,
            Self::ManageLists => 12,
            Self::ViewFormPages => 13,
            Self::AnonymousSearchAccessList => 14,
            Self::Open => 17,
            Self::ViewPages => 18,
            Self::AddAndCustomizePages => 19,
            Self::ApplyThemeAndBorder => 20,
            Self::ApplyStyleSheets => 21,
            Self::ViewUsageData => 22,
            Self::CreateSSCSite => 23,
            Self::ManageSubwebs => 24,
            Self::CreateGroups => 25,
            Self::ManagePermissions => 26,
            Self::BrowseDirectories => 27,
            Self::BrowseUserInfo => 28,
            Self::AddDelPrivateWebParts => 29,
            Self::UpdatePersonalWebParts => 30,
            Self::ManageWeb => 31,
            Self::AnonymousSearchAccessWebLists => 32,
            Self::UseClientIntegration => 37,
            Self::UseRemoteAPIs => 38,
            Self::ManageAlerts => 39,
            Self::CreateAlerts => 40,
            Self::EditMyUserInfo => 41,
            Self::EnumeratePermissions => 63,
            Self::FullMask => 65,
        }
    }

    /// Check if this kind is granted by a raw mask
    #[must_use]
    pub const fn is_set(self, mask: u64) -> bool {
        match self {
            Self::FullMask => mask & FULL_MASK_BITS == FULL_MASK_BITS,
            other => mask & (1u64 << (other.bit() as u32 - 1)) != 0,
        }
    }

    /// Label used in reports
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ViewListItems => "ViewListItems",
            Self::AddListItems => "AddListItems",
            Self::EditListItems => "EditListItems",
            Self::DeleteListItems => "DeleteListItems",
            Self::ApproveItems => "ApproveItems",
            Self::OpenItems => "OpenItems",
            Self::ViewVersions => "ViewVersions",
            Self::DeleteVersions => "DeleteVersions",
            Self::CancelCheckout => "CancelCheckout",
            Self::ManagePersonalViews => "ManagePersonalViews",
            Self::ManageLists => "ManageLists",
            Self::ViewFormPages => "ViewFormPages",
            Self::AnonymousSearchAccessList => "AnonymousSearchAccessList",
            Self::Open => "Open",
            Self::ViewPages => "ViewPages",
            Self::AddAndCustomizePages => "AddAndCustomizePages",
            Self::ApplyThemeAndBorder => "ApplyThemeAndBorder",
            Self::ApplyStyleSheets => "ApplyStyleSheets",
            Self::ViewUsageData => "ViewUsageData",
            Self::CreateSSCSite => "CreateSSCSite",
            Self::ManageSubwebs => "ManageSubwebs",
            Self::CreateGroups => "CreateGroups",
            Self::ManagePermissions => "ManagePermissions",
            Self::BrowseDirectories => "BrowseDirectories",
            Self::BrowseUserInfo => "BrowseUserInfo",
            Self::AddDelPrivateWebParts => "AddDelPrivateWebParts",
            Self::UpdatePersonalWebParts => "UpdatePersonalWebParts",
            Self::ManageWeb => "ManageWeb",
            Self::AnonymousSearchAccessWebLists => "AnonymousSearchAccessWebLists",
            Self::UseClientIntegration => "UseClientIntegration",
            Self::UseRemoteAPIs => "UseRemoteAPIs",
            Self::ManageAlerts => "ManageAlerts",
            Self::CreateAlerts => "CreateAlerts",
            Self::EditMyUserInfo => "EditMyUserInfo",
            Self::EnumeratePermissions => "EnumeratePermissions",
            Self::FullMask => "FullMask",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label is not part of the permission vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission kind: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for PermissionKind {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Ordered, duplicate-free set of permission labels
///
/// Insertion order is preserved. The empty set is a meaningful result:
/// the subject has no access to the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    labels: Vec<String>,
}

impl PermissionSet {
    /// Create an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from labels, dropping duplicates
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for label in labels {
            set.insert(label);
        }
        set
    }

    /// Decode a raw tenant permission mask
    ///
    /// Labels come out in vocabulary order.
    #[must_use]
    pub fn from_mask(mask: u64) -> Self {
        Self::from_labels(
            PermissionKind::ALL
                .iter()
                .filter(|k| k.is_set(mask))
                .map(|k| k.label()),
        )
    }

    /// Add a label; returns false if it was already present
    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.labels.iter().any(|l| *l == label) {
            return false;
        }
        self.labels.push(label);
        true
    }

    /// Number of labels
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if the subject has no access
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Check membership
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Iterate labels in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Labels joined the way reports show them
    #[must_use]
    pub fn joined(&self) -> String {
        self.labels.join(", ")
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_labels(iter)
    }
}
