use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::{Mutex as GateMutex, OwnedMutexGuard};

use crate::filters::FilterState;
use crate::listing_provider::{ListingProvider, ProviderError};
use crate::listing_types::{CityCount, ListingPage};

pub const DEFAULT_TTL_SECS: u64 = 60;
pub const DEFAULT_RETENTION_SECS: u64 = 300;
pub const DEFAULT_MAX_ENTRIES: usize = 512;

#[derive(Clone)]
struct CacheEntry {
    page: ListingPage,
    stored_at: Instant,
}

enum Lookup {
    Fresh(ListingPage),
    Stale(ListingPage),
}

struct CacheInner {
    provider: Arc<dyn ListingProvider>,
    ttl: Duration,
    retention: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
    inflight: GateMutex<HashMap<String, Arc<GateMutex<()>>>>,
    refreshing: Mutex<HashSet<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Result cache keyed by canonical filter strings. A clone is another
/// handle to the same cache.
///
/// Entries younger than the TTL are served directly. Entries older than
/// the TTL but within the retention window are served immediately while
/// a background refresh runs. Concurrent misses for one key are
/// coalesced into a single provider call. Mutations drop everything.
#[derive(Clone)]
pub struct SearchCache {
    inner: Arc<CacheInner>,
}

impl SearchCache {
    pub fn new(
        provider: Arc<dyn ListingProvider>,
        ttl: Duration,
        retention: Duration,
        max_entries: usize,
    ) -> Self {
        // A retention shorter than the TTL would expire fresh entries.
        let retention = retention.max(ttl);
        Self {
            inner: Arc::new(CacheInner {
                provider,
                ttl,
                retention,
                max_entries: max_entries.max(1),
                entries: Mutex::new(HashMap::new()),
                inflight: GateMutex::new(HashMap::new()),
                refreshing: Mutex::new(HashSet::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn provider_tag(&self) -> &'static str {
        self.inner.provider.provider_tag()
    }

    /// Serves one page of results for a normalized filter, from cache
    /// when possible. Errors surface only when there is nothing cached
    /// to fall back on; failed fetches cache nothing.
    pub async fn search(&self, filters: &FilterState) -> Result<ListingPage, ProviderError> {
        let key = filters.cache_key();

        match self.lookup(&key) {
            Some(Lookup::Fresh(page)) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                debug!("cache hit for \"{}\"", key);
                return Ok(page);
            }
            Some(Lookup::Stale(page)) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                debug!("serving stale entry for \"{}\" while revalidating", key);
                self.spawn_refresh(key, filters.clone());
                return Ok(page);
            }
            None => {}
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!("cache miss for \"{}\"", key);

        let _guard = self.acquire(&key).await;

        // A coalesced request may have filled the entry while we waited.
        if let Some(Lookup::Fresh(page)) = self.lookup(&key) {
            return Ok(page);
        }

        let page = self.inner.provider.search(filters).await?;
        self.store(key, page.clone());
        Ok(page)
    }

    /// City facet passthrough; cheap enough to skip caching.
    pub async fn cities(&self) -> Result<Vec<CityCount>, ProviderError> {
        self.inner.provider.cities().await
    }

    /// Drops every cached page. Called after any listing mutation so
    /// the next search observes the write.
    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.inner.entries.lock() {
            let dropped = entries.len();
            entries.clear();
            if dropped > 0 {
                debug!("invalidated {} cached result pages", dropped);
            }
        }
    }

    /// Periodic maintenance: expire entries past retention and drop
    /// coalescing gates no request is holding.
    pub fn sweep(&self) {
        if let Ok(mut entries) = self.inner.entries.lock() {
            let before = entries.len();
            entries.retain(|_, e| e.stored_at.elapsed() <= self.inner.retention);
            let expired = before - entries.len();
            if expired > 0 {
                debug!("swept {} expired result pages", expired);
            }
        }
        if let Ok(mut inflight) = self.inner.inflight.try_lock() {
            inflight.retain(|_, gate| Arc::strong_count(gate) > 1);
        }
    }

    /// (hits, misses, live entries)
    pub fn stats(&self) -> (u64, u64, usize) {
        let len = self.inner.entries.lock().map(|e| e.len()).unwrap_or(0);
        (
            self.inner.hits.load(Ordering::Relaxed),
            self.inner.misses.load(Ordering::Relaxed),
            len,
        )
    }

    fn lookup(&self, key: &str) -> Option<Lookup> {
        if let Ok(mut entries) = self.inner.entries.lock() {
            entries.retain(|_, e| e.stored_at.elapsed() <= self.inner.retention);
            if let Some(entry) = entries.get(key) {
                let page = entry.page.clone();
                return Some(if entry.stored_at.elapsed() <= self.inner.ttl {
                    Lookup::Fresh(page)
                } else {
                    Lookup::Stale(page)
                });
            }
        }
        None
    }

    fn store(&self, key: String, page: ListingPage) {
        if let Ok(mut entries) = self.inner.entries.lock() {
            entries.retain(|_, e| e.stored_at.elapsed() <= self.inner.retention);
            if entries.len() >= self.inner.max_entries {
                if let Some(victim) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&victim);
                }
            }
            entries.insert(
                key,
                CacheEntry {
                    page,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut inflight = self.inner.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(GateMutex::new(()))),
            )
        };
        gate.lock_owned().await
    }

    fn spawn_refresh(&self, key: String, filters: FilterState) {
        // At most one background refresh per key.
        match self.inner.refreshing.lock() {
            Ok(mut refreshing) => {
                if !refreshing.insert(key.clone()) {
                    return;
                }
            }
            Err(_) => return,
        }

        let cache = self.clone();
        tokio::spawn(async move {
            match cache.inner.provider.search(&filters).await {
                Ok(page) => cache.store(key.clone(), page),
                // The stale entry stays; it ages out at the retention
                // boundary if refreshes keep failing.
                Err(e) => warn!("background revalidation failed for \"{}\": {}", key, e),
            }
            if let Ok(mut refreshing) = cache.inner.refreshing.lock() {
                refreshing.remove(&key);
            }
        });
    }
}
