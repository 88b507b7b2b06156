//! Tenant inventory backend
//!
//! A JSON snapshot of a tenant that stands in for the live admin service:
//!
//! ```json
//! {
//!   "tenant": "https://contoso-admin.sharepoint.com",
//!   "sites": [
//!     {
//!       "url": "https://contoso.sharepoint.com/sites/hr",
//!       "title": "HR",
//!       "owner": "hr-admin@contoso.com",
//!       "permissions": {
//!         "user@contoso.com": ["Open", "ViewPages"],
//!         "guest@fabrikam.com": { "mask": 196609 },
//!         "svc@contoso.com": { "error": "(403) Forbidden" }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Site urls match exactly; subject keys match case-insensitively. A subject
//! missing from a site's map has no permissions there.

use async_trait::async_trait;
use permscan_core::{
    DirectoryBackend, DirectoryError, PermissionKind, PermissionProbe, PermissionSet,
    ProbeFailure, ResourceRef, Subject,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Inventory loading errors
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// File could not be read
    #[error("cannot read inventory {}: {source}", path.display())]
    Read {
        /// Inventory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid inventory
    #[error("cannot parse inventory: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Permissions of one subject on one site
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GrantEntry {
    /// Permission labels
    Labels(Vec<String>),
    /// Raw permission mask
    Mask {
        /// Mask bits
        mask: u64,
    },
    /// The check fails with this message
    Error {
        /// Failure text
        error: String,
    },
}

impl GrantEntry {
    fn resolve(&self) -> Result<PermissionSet, ProbeFailure> {
        match self {
            Self::Labels(labels) => labels
                .iter()
                .map(|l| {
                    l.parse::<PermissionKind>()
                        .map(PermissionKind::label)
                        .map_err(|e| ProbeFailure::Malformed(e.to_string()))
                })
                .collect(),
            Self::Mask { mask } => Ok(PermissionSet::from_mask(*mask)),
            Self::Error { error } => Err(ProbeFailure::remote(error.clone())),
        }
    }
}

/// One site in the snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Site url, the resource id
    pub url: String,
    /// Site title
    #[serde(default)]
    pub title: String,
    /// Owner contact
    #[serde(default)]
    pub owner: Option<String>,
    /// Grants by subject
    #[serde(default)]
    pub permissions: HashMap<String, GrantEntry>,
}

impl SiteEntry {
    fn resource(&self) -> ResourceRef {
        let title = if self.title.is_empty() {
            self.url.clone()
        } else {
            self.title.clone()
        };
        let resource = ResourceRef::new(self.url.clone(), title);
        match &self.owner {
            Some(owner) => resource.with_owner(owner.clone()),
            None => resource,
        }
    }
}

/// Parsed tenant snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct Inventory {
    /// Admin endpoint of the tenant
    pub tenant: String,
    /// Sites in listing order
    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

impl Inventory {
    /// Parse JSON text
    ///
    /// # Errors
    /// `InventoryError::Parse` if the text is not a valid inventory.
    pub fn from_json_str(text: &str) -> Result<Self, InventoryError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a JSON file
    ///
    /// # Errors
    /// `InventoryError::Read` or `InventoryError::Parse`.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let text = std::fs::read_to_string(path).map_err(|source| InventoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let inventory = Self::from_json_str(&text)?;
        tracing::info!(
            path = %path.display(),
            tenant = %inventory.tenant,
            sites = inventory.sites.len(),
            "loaded tenant inventory"
        );
        Ok(inventory)
    }

    /// Check if `endpoint` names this tenant
    #[must_use]
    pub fn serves(&self, endpoint: &str) -> bool {
        normalize_endpoint(&self.tenant) == normalize_endpoint(endpoint)
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_lowercase()
}

/// Directory backend and permission probe over an `Inventory`
#[derive(Debug)]
pub struct InventoryBackend {
    sites: Vec<SiteEntry>,
    by_url: HashMap<String, usize>,
    grants: Vec<HashMap<String, GrantEntry>>,
    page_size: usize,
    tenant: String,
}

impl InventoryBackend {
    /// Index an inventory, serving `page_size` sites per page
    #[must_use]
    pub fn new(inventory: Inventory, page_size: usize) -> Self {
        let mut by_url = HashMap::with_capacity(inventory.sites.len());
        for (i, site) in inventory.sites.iter().enumerate() {
            by_url.entry(site.url.clone()).or_insert(i);
        }

        let grants = inventory
            .sites
            .iter()
            .map(|site| {
                site.permissions
                    .iter()
                    .map(|(subject, grant)| (subject.to_lowercase(), grant.clone()))
                    .collect()
            })
            .collect();

        Self {
            sites: inventory.sites,
            by_url,
            grants,
            page_size: page_size.max(1),
            tenant: inventory.tenant,
        }
    }

    /// Tenant admin endpoint
    #[inline]
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Sites in the snapshot
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// True for an empty snapshot
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[async_trait]
impl DirectoryBackend for InventoryBackend {
    async fn fetch_page(&self, start_index: usize) -> Result<Vec<ResourceRef>, DirectoryError> {
        Ok(self
            .sites
            .iter()
            .skip(start_index)
            .take(self.page_size)
            .map(SiteEntry::resource)
            .collect())
    }

    async fn lookup(&self, id: &str) -> Result<Option<ResourceRef>, DirectoryError> {
        Ok(self.by_url.get(id).map(|&i| self.sites[i].resource()))
    }
}

#[async_trait]
impl PermissionProbe for InventoryBackend {
    async fn check(
        &self,
        resource: &ResourceRef,
        subject: &Subject,
    ) -> Result<PermissionSet, ProbeFailure> {
        let Some(&index) = self.by_url.get(&resource.id) else {
            return Err(ProbeFailure::remote(format!(
                "site not found in inventory: {}",
                resource.id
            )));
        };

        match self.grants[index].get(&subject.as_str().to_lowercase()) {
            Some(grant) => grant.resolve(),
            None => Ok(PermissionSet::new()),
        }
    }
}
