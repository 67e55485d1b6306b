//! Time-bounded key/value cache.
//!
//! Owned by whoever wraps a data source; the backtest engine never sees it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

// =============================================================================
// Constants
// =============================================================================

/// Default entry lifetime (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

// =============================================================================
// TtlCache
// =============================================================================

/// A cache whose entries expire a fixed time after insertion.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, (Instant, V)>>,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a clone of the live entry for `key`. Expired entries are
    /// treated as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|(inserted, _)| inserted.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key, (Instant::now(), value));
    }

    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key).map(|(_, value)| value)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drops expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (inserted, _)| inserted.elapsed() < self.ttl);
        before - entries.len()
    }

    /// Number of stored entries, including ones that have expired but not
    /// been purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
