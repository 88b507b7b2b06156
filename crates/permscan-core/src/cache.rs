//! Time-bounded listing cache
//!
//! Holds the full tenant listing so wildcard searches do not re-enumerate
//! every site. Freshness is measured against an injected `Clock`, which lets
//! tests move time forward instead of sleeping.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default freshness window for the tenant listing
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(60 * 60);

/// Source of "now"
pub trait Clock: Send + Sync + Debug {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at a fixed instant
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the Unix epoch
    #[must_use]
    pub fn epoch() -> Self {
        Self::new(DateTime::<Utc>::default())
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }

    /// Jump to an instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Entries dropped because they aged out
    pub expirations: u64,
    /// Items in the cached listing (0 when empty)
    pub entry_count: usize,
}

#[derive(Debug)]
struct Entry<T> {
    items: Arc<Vec<T>>,
    stored_at: DateTime<Utc>,
}

#[derive(Debug)]
struct State<T> {
    entry: Option<Entry<T>>,
    stats: CacheStats,
}

/// Single-entry cache for a complete listing
///
/// An entry is fresh while `now < stored_at + ttl`.
#[derive(Debug)]
pub struct ListingCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<State<T>>,
}

impl<T> ListingCache<T> {
    /// Create cache with a TTL and clock
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            state: Mutex::new(State {
                entry: None,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Create cache on the wall clock
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Configured TTL
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the listing if still fresh
    pub fn get(&self) -> Option<Arc<Vec<T>>> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let Some(fresh) = state
            .entry
            .as_ref()
            .map(|entry| self.is_fresh(entry.stored_at, now))
        else {
            state.stats.misses += 1;
            return None;
        };

        if fresh {
            state.stats.hits += 1;
            state.entry.as_ref().map(|e| Arc::clone(&e.items))
        } else {
            tracing::debug!(ttl_secs = self.ttl.as_secs(), "listing cache entry expired");
            state.entry = None;
            state.stats.expirations += 1;
            state.stats.misses += 1;
            state.stats.entry_count = 0;
            None
        }
    }

    /// Store a complete listing, replacing any previous one
    pub fn insert(&self, items: Vec<T>) -> Arc<Vec<T>> {
        let items = Arc::new(items);
        let mut state = self.state.lock();
        state.stats.entry_count = items.len();
        state.entry = Some(Entry {
            items: Arc::clone(&items),
            stored_at: self.clock.now(),
        });
        items
    }

    /// Get the listing or compute and store it
    ///
    /// Nothing is stored when `f` fails. The lock is not held while `f`
    /// runs, so two concurrent misses may both compute.
    pub async fn try_get_or_insert_with<E, F, Fut>(&self, f: F) -> Result<Arc<Vec<T>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        if let Some(cached) = self.get() {
            return Ok(cached);
        }

        let items = f().await?;
        Ok(self.insert(items))
    }

    /// Drop the cached listing
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.entry = None;
        state.stats.entry_count = 0;
    }

    /// Check for a fresh entry without touching the counters
    #[must_use]
    pub fn contains_fresh(&self) -> bool {
        let now = self.clock.now();
        let state = self.state.lock();
        state
            .entry
            .as_ref()
            .is_some_and(|e| self.is_fresh(e.stored_at, now))
    }

    /// Cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that went backwards counts as zero age.
        let age = now
            .signed_duration_since(stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age < self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(ttl_secs: u64) -> (ListingCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::epoch());
        let cache = ListingCache::new(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn empty_cache_misses() {
        let (cache, _) = cache(60);
        assert!(cache.get().is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn fresh_entry_hits() {
        let (cache, clock) = cache(60);
        cache.insert(vec![1, 2, 3]);
        clock.advance(Duration::from_secs(59));

        let items = cache.get().unwrap();
        assert_eq!(*items, vec![1, 2, 3]);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().entry_count, 3);
    }

    #[test]
    fn entry_expires_at_ttl() {
        let (cache, clock) = cache(60);
        cache.insert(vec![1]);
        clock.advance(Duration::from_secs(60));

        assert!(!cache.contains_fresh());
        assert!(cache.get().is_none());
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn backwards_clock_keeps_entry_fresh() {
        let (cache, clock) = cache(60);
        clock.advance(Duration::from_secs(600));
        cache.insert(vec![9]);
        clock.set(DateTime::<Utc>::default());
        assert!(cache.get().is_some());
    }

    #[test]
    fn invalidate_drops_entry() {
        let (cache, _) = cache(60);
        cache.insert(vec![1]);
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn try_get_or_insert_with_computes_once() {
        let (cache, _) = cache(60);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let items = cache
                .try_get_or_insert_with(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec![7, 8])
                })
                .await
                .unwrap();
            assert_eq!(*items, vec![7, 8]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_compute_stores_nothing() {
        let (cache, _) = cache(60);
        let result = cache
            .try_get_or_insert_with(|| async { Err::<Vec<u32>, _>("paging broke") })
            .await;
        assert_eq!(result.unwrap_err(), "paging broke");
        assert!(!cache.contains_fresh());
    }

    #[tokio::test]
    async fn expired_entry_is_recomputed() {
        let (cache, clock) = cache(60);
        cache.insert(vec![1]);
        clock.advance(Duration::from_secs(61));

        let items = cache
            .try_get_or_insert_with(|| async { Ok::<_, String>(vec![2]) })
            .await
            .unwrap();
        assert_eq!(*items, vec![2]);
    }
}
