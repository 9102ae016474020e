//! Per-method cache of in-flight requests.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dedup::fingerprint::Fingerprint;
use crate::transport::{Method, Params, RequestHandle};

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct DedupStats {
    /// Lookups answered with a live handle.
    pub hits: AtomicU64,
    /// Lookups that started a new operation.
    pub misses: AtomicU64,
}

impl DedupStats {
    fn record(&self, method: Method, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("dedup_hits_total", "method" => method.as_str()).increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("dedup_misses_total", "method" => method.as_str()).increment(1);
        }
    }

    /// Fraction of lookups that were collapsed onto an existing request.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Collapses concurrent identical requests onto one in-flight handle.
///
/// GET and POST have independent maps; a GET never answers a POST.
#[derive(Debug, Default)]
pub struct DedupCache {
    get: DashMap<Fingerprint, RequestHandle>,
    post: DashMap<Fingerprint, RequestHandle>,
    stats: DedupStats,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, method: Method) -> &DashMap<Fingerprint, RequestHandle> {
        match method {
            Method::Get => &self.get,
            Method::Post => &self.post,
        }
    }

    /// Return the live handle for `(method, url, params)`, or start a new
    /// operation with `issue` and remember it.
    ///
    /// The lookup and the insert happen under the same shard lock, so two
    /// racing callers never both call `issue`. `issue` must not re-enter
    /// this cache.
    pub fn issue_or_reuse<F>(&self, method: Method, url: &str, params: &Params, issue: F) -> RequestHandle
    where
        F: FnOnce() -> RequestHandle,
    {
        let fingerprint = Fingerprint::new(url, params);

        let (handle, hit) = match self.map(method).entry(fingerprint) {
            Entry::Occupied(entry) if !entry.get().is_complete() => (entry.get().clone(), true),
            Entry::Occupied(mut entry) => {
                let handle = issue();
                entry.insert(handle.clone());
                (handle, false)
            }
            Entry::Vacant(entry) => {
                let handle = issue();
                entry.insert(handle.clone());
                (handle, false)
            }
        };

        self.stats.record(method, hit);
        tracing::debug!(method = %method, url = %url, handle = %handle.id(), reused = hit, "Dedup lookup");
        handle
    }

    /// Number of cached fingerprints for `method`, stale ones included.
    pub fn len(&self, method: Method) -> usize {
        self.map(method).len()
    }

    pub fn is_empty(&self) -> bool {
        self.get.is_empty() && self.post.is_empty()
    }

    /// Drop entries whose handle has completed. Returns how many were
    /// removed.
    pub fn purge_completed(&self) -> usize {
        let mut removed = 0;
        for map in [&self.get, &self.post] {
            let before = map.len();
            map.retain(|_, handle| !handle.is_complete());
            removed += before - map.len();
        }
        removed
    }

    pub fn stats(&self) -> &DedupStats {
        &self.stats
    }
}
