//! In-process query cache with per-entry expiry.
//!
//! Keys are fingerprints of a query name and its parameters. Expired entries
//! are removed lazily by the lookup that finds them; nothing sweeps in the
//! background. Fingerprints are only meaningful within one process run.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::DEFAULT_CACHE_TTL;

/// Derives the cache key for `query` called with `params`.
///
/// Parameters are serialized with `serde_json`, so equal values always give
/// equal keys and tuple order is preserved. Returns `None` when the
/// parameters cannot be serialized.
///
/// # Examples
///
/// ```
/// use notepool::cache::fingerprint;
///
/// assert_eq!(fingerprint("get_note", &(7,)).as_deref(), Some("get_note:[7]"));
/// ```
pub fn fingerprint<P: Serialize + ?Sized>(query: &str, params: &P) -> Option<String> {
    match serde_json::to_string(params) {
        Ok(serialized) => Some(format!("{query}:{serialized}")),
        Err(e) => {
            debug!(query, error = %e, "parameters not cacheable");
            None
        }
    }
}

/// Upper bound on how far ahead an entry may expire.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Expiry for an entry stored now; TTLs beyond [`MAX_TTL`] are capped.
fn expiry(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl.min(MAX_TTL))
}

struct CacheEntry<V> {
    /// Query name the entry was stored under, for exact invalidation.
    tag: String,
    value: V,
    expires_at: Instant,
}

/// Entry count and default TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub default_ttl: Duration,
}

/// Thread-safe TTL cache keyed by query fingerprints.
pub struct QueryCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> QueryCache<V> {
    /// Creates a cache whose entries live for `default_ttl` unless `set` is
    /// given an explicit TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Returns the cached value if it exists and has not expired.
    ///
    /// An expired entry is evicted as a side effect.
    pub fn get<P: Serialize + ?Sized>(&self, query: &str, params: &P) -> Option<V> {
        let key = fingerprint(query, params)?;
        let mut entries = self.lock_entries();

        let entry = entries.get(&key)?;
        if Instant::now() < entry.expires_at {
            trace!(key = %key, "cache hit");
            return Some(entry.value.clone());
        }

        entries.remove(&key);
        trace!(key = %key, "evicted expired entry");
        None
    }

    /// Stores `value` until now + `ttl` (or the default TTL).
    pub fn set<P: Serialize + ?Sized>(
        &self,
        query: &str,
        params: &P,
        value: V,
        ttl: Option<Duration>,
    ) {
        let Some(key) = fingerprint(query, params) else {
            return;
        };
        let Some(expires_at) = expiry(ttl.unwrap_or(self.default_ttl)) else {
            debug!(query, "ttl out of range, not caching");
            return;
        };

        self.lock_entries().insert(
            key,
            CacheEntry {
                tag: query.to_string(),
                value,
                expires_at,
            },
        );
    }

    /// Removes every entry stored under exactly the query name `tag`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let removed = self.retain(|_, entry| entry.tag != tag);
        if removed > 0 {
            debug!(tag, removed, "invalidated cache tag");
        }
        removed
    }

    /// Removes every entry whose fingerprint contains `pattern`.
    ///
    /// Coarse: a pattern that happens to appear inside another query's name
    /// or parameters removes those entries too. Prefer
    /// [`QueryCache::invalidate_tag`].
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let removed = self.retain(|key, _| !key.contains(pattern));
        if removed > 0 {
            debug!(pattern, removed, "invalidated cache pattern");
        }
        removed
    }

    /// Removes entries stored under exactly `tag` whose fingerprint also
    /// contains `pattern`, leaving every other query untouched.
    pub fn invalidate_within(&self, tag: &str, pattern: &str) -> usize {
        let removed = self.retain(|key, entry| entry.tag != tag || !key.contains(pattern));
        if removed > 0 {
            debug!(tag, pattern, removed, "invalidated cache entries within tag");
        }
        removed
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn size(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.size(),
            default_ttl: self.default_ttl,
        }
    }

    fn retain(&self, mut keep: impl FnMut(&str, &CacheEntry<V>) -> bool) -> usize {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|key, entry| keep(key, entry));
        before - entries.len()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
