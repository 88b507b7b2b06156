//! Resource directory contract and the paged directory adapter
//!
//! `ResourceDirectory` is what the engine calls. `PagedDirectory` implements
//! it on top of any `DirectoryBackend` that can list the tenant page by page
//! and look up a single resource, adding the listing cache and pattern
//! filtering.

use crate::cache::{Clock, ListingCache, SystemClock, DEFAULT_LISTING_TTL};
use crate::error::DirectoryError;
use crate::pattern::SearchPattern;
use crate::types::ResourceRef;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default guard against backends that never return an empty page
pub const DEFAULT_MAX_PAGES: usize = 100_000;

/// Resolves search patterns into resources
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Resolve a pattern into the matching resources
    ///
    /// # Errors
    /// `DirectoryError` if the listing cannot be produced in full.
    async fn resolve(&self, pattern: &SearchPattern) -> Result<Vec<ResourceRef>, DirectoryError>;
}

#[async_trait]
impl<T: ResourceDirectory + ?Sized> ResourceDirectory for Arc<T> {
    async fn resolve(&self, pattern: &SearchPattern) -> Result<Vec<ResourceRef>, DirectoryError> {
        (**self).resolve(pattern).await
    }
}

/// Raw tenant listing access
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    /// Fetch the page starting at `start_index`; an empty page ends the listing
    async fn fetch_page(&self, start_index: usize) -> Result<Vec<ResourceRef>, DirectoryError>;

    /// Look up a single resource by id
    async fn lookup(&self, id: &str) -> Result<Option<ResourceRef>, DirectoryError>;
}

#[async_trait]
impl<T: DirectoryBackend + ?Sized> DirectoryBackend for Arc<T> {
    async fn fetch_page(&self, start_index: usize) -> Result<Vec<ResourceRef>, DirectoryError> {
        (**self).fetch_page(start_index).await
    }

    async fn lookup(&self, id: &str) -> Result<Option<ResourceRef>, DirectoryError> {
        (**self).lookup(id).await
    }
}

/// `ResourceDirectory` over a paged backend, with a cached full listing
#[derive(Debug)]
pub struct PagedDirectory<B> {
    backend: B,
    cache: ListingCache<ResourceRef>,
    max_pages: usize,
}

impl<B: DirectoryBackend> PagedDirectory<B> {
    /// Create with an explicit clock and listing TTL
    #[must_use]
    pub fn new(backend: B, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            backend,
            cache: ListingCache::new(ttl, clock),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Create on the wall clock with the default one-hour TTL
    #[must_use]
    pub fn with_defaults(backend: B) -> Self {
        Self::new(backend, Arc::new(SystemClock), DEFAULT_LISTING_TTL)
    }

    /// With page limit
    #[inline]
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Backing source
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Listing cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ListingCache<ResourceRef> {
        &self.cache
    }

    /// Full tenant listing, from cache when fresh
    ///
    /// # Errors
    /// `DirectoryError` if paging breaks; nothing is cached in that case.
    pub async fn full_listing(&self) -> Result<Arc<Vec<ResourceRef>>, DirectoryError> {
        self.cache
            .try_get_or_insert_with(|| self.enumerate_all())
            .await
    }

    /// Number of resources in the tenant
    ///
    /// # Errors
    /// Same as `full_listing`.
    pub async fn tenant_size(&self) -> Result<usize, DirectoryError> {
        Ok(self.full_listing().await?.len())
    }

    /// Drop the cached listing
    #[inline]
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    async fn enumerate_all(&self) -> Result<Vec<ResourceRef>, DirectoryError> {
        let mut resources = Vec::new();

        for page_no in 0..self.max_pages {
            let page = self
                .backend
                .fetch_page(resources.len())
                .await
                .map_err(|e| DirectoryError::Enumeration {
                    fetched: resources.len(),
                    reason: e.to_string(),
                })?;

            if page.is_empty() {
                tracing::info!(
                    resources = resources.len(),
                    pages = page_no,
                    "tenant enumeration complete"
                );
                return Ok(resources);
            }

            tracing::debug!(page = page_no, size = page.len(), "fetched directory page");
            resources.extend(page);
        }

        Err(DirectoryError::Unbounded {
            pages: self.max_pages,
        })
    }
}

#[async_trait]
impl<B: DirectoryBackend> ResourceDirectory for PagedDirectory<B> {
    async fn resolve(&self, pattern: &SearchPattern) -> Result<Vec<ResourceRef>, DirectoryError> {
        if let SearchPattern::Exact(id) = pattern {
            let found = self
                .backend
                .lookup(id)
                .await
                .map_err(|e| DirectoryError::Lookup {
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
            return Ok(found.into_iter().collect());
        }

        let listing = self.full_listing().await?;
        Ok(listing
            .iter()
            .filter(|r| pattern.matches(&r.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct PagedSites {
        sites: Vec<ResourceRef>,
        page_size: usize,
        fail_at_page: Option<usize>,
        page_calls: AtomicUsize,
    }

    impl PagedSites {
        fn new(ids: &[&str], page_size: usize) -> Self {
            Self {
                sites: ids.iter().map(|id| ResourceRef::new(*id, *id)).collect(),
                page_size,
                fail_at_page: None,
                page_calls: AtomicUsize::new(0),
            }
        }

        fn failing_at(mut self, page: usize) -> Self {
            self.fail_at_page = Some(page);
            self
        }
    }

    #[async_trait]
    impl DirectoryBackend for PagedSites {
        async fn fetch_page(&self, start: usize) -> Result<Vec<ResourceRef>, DirectoryError> {
            let call = self.page_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at_page == Some(call) {
                return Err(DirectoryError::Backend("(401) token expired".into()));
            }
            Ok(self.sites.iter().skip(start).take(self.page_size).cloned().collect())
        }

        async fn lookup(&self, id: &str) -> Result<Option<ResourceRef>, DirectoryError> {
            Ok(self.sites.iter().find(|s| s.id == id).cloned())
        }
    }

    const IDS: [&str; 5] = [
        "https://t/sites/alpha",
        "https://t/sites/beta",
        "https://t/teams/wildcard-one",
        "https://t/teams/wildcard-two",
        "https://t/teams/hr",
    ];

    fn directory(backend: PagedSites) -> (PagedDirectory<PagedSites>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::epoch());
        let dir = PagedDirectory::new(backend, clock.clone(), Duration::from_secs(3600));
        (dir, clock)
    }

    #[tokio::test]
    async fn enumerates_every_page() {
        let (dir, _) = directory(PagedSites::new(&IDS, 2));
        assert_eq!(dir.tenant_size().await.unwrap(), 5);
        // 3 full/partial pages + 1 empty page
        assert_eq!(dir.backend().page_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn wildcard_patterns_filter_listing() {
        let (dir, _) = directory(PagedSites::new(&IDS, 2));

        let all = dir.resolve(&SearchPattern::All).await.unwrap();
        assert_eq!(all.len(), 5);

        let teams = dir.resolve(&"*wildcard*".into()).await.unwrap();
        assert_eq!(teams.len(), 2);

        let hr = dir.resolve(&"*/hr".into()).await.unwrap();
        assert_eq!(hr.len(), 1);

        let sites = dir.resolve(&"https://t/sites/*".into()).await.unwrap();
        assert_eq!(sites.len(), 2);
    }

    #[tokio::test]
    async fn exact_pattern_uses_lookup() {
        let (dir, _) = directory(PagedSites::new(&IDS, 2));

        let found = dir.resolve(&"https://t/teams/hr".into()).await.unwrap();
        assert_eq!(found.len(), 1);
        let missing = dir.resolve(&"https://t/teams/nope".into()).await.unwrap();
        assert!(missing.is_empty());
        assert_eq!(dir.backend().page_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listing_is_cached_until_ttl() {
        let (dir, clock) = directory(PagedSites::new(&IDS, 10));

        dir.resolve(&SearchPattern::All).await.unwrap();
        dir.resolve(&"*teams*".into()).await.unwrap();
        assert_eq!(dir.backend().page_calls.load(Ordering::SeqCst), 2);

        clock.advance(Duration::from_secs(3600));
        dir.resolve(&SearchPattern::All).await.unwrap();
        assert_eq!(dir.backend().page_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn paging_failure_discards_partial_listing() {
        let (dir, _) = directory(PagedSites::new(&IDS, 2).failing_at(1));

        let err = dir.resolve(&SearchPattern::All).await.unwrap_err();
        match err {
            DirectoryError::Enumeration { fetched, reason } => {
                assert_eq!(fetched, 2);
                assert!(reason.contains("token expired"));
            }
            other => panic!("expected Enumeration, got {other:?}"),
        }
        assert!(!dir.cache().contains_fresh());
    }

    #[tokio::test]
    async fn never_ending_backend_is_bounded() {
        #[derive(Debug)]
        struct Endless;

        #[async_trait]
        impl DirectoryBackend for Endless {
            async fn fetch_page(&self, start: usize) -> Result<Vec<ResourceRef>, DirectoryError> {
                Ok(vec![ResourceRef::new(format!("https://t/{start}"), "x")])
            }
            async fn lookup(&self, _id: &str) -> Result<Option<ResourceRef>, DirectoryError> {
                Ok(None)
            }
        }

        let dir = PagedDirectory::with_defaults(Endless).with_max_pages(3);
        let err = dir.resolve(&SearchPattern::All).await.unwrap_err();
        assert_eq!(err, DirectoryError::Unbounded { pages: 3 });
    }
}
