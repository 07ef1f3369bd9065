//! TTL response cache.
//!
//! Freshness is checked at read time against a TTL supplied by the caller,
//! so one entry can serve callers with different freshness needs. Stale
//! entries stay until the next write to the same key or a bulk [`evict`].
//!
//! [`evict`]: ResponseCache::evict

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;

// ============================================================================
// CacheEntry
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

// ============================================================================
// ResponseCache
// ============================================================================

/// Key → (value, timestamp) map with lazy expiry.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<FxHashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// Creates an empty cache.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key` if it was stored less than `ttl` ago.
    #[must_use]
    pub fn get(&self, key: &str, ttl: Duration) -> Option<Value> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;

        if entry.stored_at.elapsed() < ttl {
            trace!(key, "Cache hit");
            Some(entry.value.clone())
        } else {
            trace!(key, "Cache entry stale");
            None
        }
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.entries.lock().insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Removes entries whose key contains `pattern`, or everything for `None`.
    ///
    /// Returns the number of entries removed.
    pub fn evict(&self, pattern: Option<&str>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();

        match pattern {
            Some(pattern) => entries.retain(|key, _| !key.contains(pattern)),
            None => entries.clear(),
        }

        before - entries.len()
    }

    /// Returns `true` if an entry exists for `key`, fresh or not.
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of stored entries, fresh or not.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the cache holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_ttl() {
        let cache = ResponseCache::new();
        cache.set("wallet.balance:{}", json!(10));

        assert_eq!(cache.get("wallet.balance:{}", Duration::from_secs(1)), Some(json!(10)));

        advance(Duration::from_millis(999)).await;
        assert!(cache.get("wallet.balance:{}", Duration::from_secs(1)).is_some());

        advance(Duration::from_millis(1)).await;
        assert!(cache.get("wallet.balance:{}", Duration::from_secs(1)).is_none());

        // A laxer caller still sees the same entry.
        assert!(cache.get("wallet.balance:{}", Duration::from_secs(60)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_refreshes_timestamp() {
        let cache = ResponseCache::new();
        cache.set("k", json!(1));
        advance(Duration::from_secs(5)).await;
        cache.set("k", json!(2));

        assert_eq!(cache.get("k", Duration::from_secs(1)), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evict_by_pattern() {
        let cache = ResponseCache::new();
        cache.set("wallet.balance:{}", json!(1));
        cache.set("wallet.history:{\"page\":1}", json!(2));
        cache.set("stats.daily:{}", json!(3));

        assert_eq!(cache.evict(Some("wallet.")), 2);
        assert!(cache.contains_key("stats.daily:{}"));
        assert!(!cache.contains_key("wallet.balance:{}"));

        assert_eq!(cache.evict(None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_miss() {
        let cache = ResponseCache::new();
        assert!(cache.get("absent", Duration::from_secs(60)).is_none());
    }
}
