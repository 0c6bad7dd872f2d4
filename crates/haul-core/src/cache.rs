//! TTL cache with hit/miss accounting.
//!
//! Freshness is checked on every read (`now - stored_at < ttl`); stale
//! entries are evicted at that moment and reported as misses. Nothing
//! sweeps the store in the background. An optional capacity bound hands
//! size-based eviction to moka.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::sync::Cache;
use serde::Serialize;

/// Configuration for [`CacheManager`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays fresh.
    pub ttl: Duration,
    /// Upper bound on stored entries; `None` leaves growth unbounded.
    pub max_entries: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            max_entries: None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Point-in-time cache statistics. Purely observational.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
}

/// Thread-safe TTL cache shared by every call through one orchestrator.
#[derive(Clone)]
pub struct CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: Cache<String, CacheEntry<V>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        let mut builder = Cache::builder();
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        Self {
            entries: builder.build(),
            ttl: config.ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return a fresh value for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            Some(_) => {
                tracing::debug!(cache_key = %key, "Evicting expired cache entry");
                self.entries.invalidate(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Like [`get`](Self::get) but leaves the hit and miss counters alone.
    ///
    /// For re-checking a key the caller has already counted.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value)
    }

    /// Store `value` under `key`, overwriting any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            hits,
            misses,
            size: self.entries.entry_count(),
        }
    }

    /// Drop every entry and zero the counters.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl: Duration) -> CacheManager<String> {
        CacheManager::new(CacheConfig {
            ttl,
            max_entries: None,
        })
    }

    #[test]
    fn get_returns_stored_value_and_counts_hit() {
        let c = cache(Duration::from_secs(60));
        c.set("k", "v".to_string());
        assert_eq!(c.get("k").as_deref(), Some("v"));

        let stats = c.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn absent_key_counts_miss() {
        let c = cache(Duration::from_secs(60));
        assert!(c.get("missing").is_none());
        assert_eq!(c.stats().misses, 1);
        assert_eq!(c.stats().hit_rate, 0.0);
    }

    #[test]
    fn expired_entry_is_evicted_and_counts_miss() {
        let c = cache(Duration::from_millis(20));
        c.set("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(30));

        assert!(c.get("k").is_none());
        let stats = c.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn set_overwrites_and_restamps() {
        let c = cache(Duration::from_millis(60));
        c.set("k", "old".to_string());
        std::thread::sleep(Duration::from_millis(40));
        c.set("k", "new".to_string());
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(c.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn clear_drops_entries_and_counters() {
        let c = cache(Duration::from_secs(60));
        c.set("a", "1".to_string());
        c.set("b", "2".to_string());
        c.get("a");
        c.get("zzz");

        c.clear();

        let stats = c.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert!(c.get("a").is_none());
    }

    #[test]
    fn peek_does_not_count() {
        let c = cache(Duration::from_secs(60));
        assert!(c.peek("k").is_none());
        c.set("k", "v".to_string());
        assert_eq!(c.peek("k").as_deref(), Some("v"));

        let stats = c.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn peek_ignores_expired_entry() {
        let c = cache(Duration::from_millis(20));
        c.set("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(30));
        assert!(c.peek("k").is_none());
    }

    #[test]
    fn hit_rate_mixes_hits_and_misses() {
        let c = cache(Duration::from_secs(60));
        c.set("a", "1".to_string());
        c.get("a");
        c.get("a");
        c.get("a");
        c.get("b");
        assert!((c.stats().hit_rate - 0.75).abs() < 1e-9);
    }
}
