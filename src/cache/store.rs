//! Expiring Store Module
//!
//! Pure TTL key-value store: HashMap storage with lazy expiry on read and a
//! sweep for entries nobody reads again. There is no size bound.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheStats};

// == Expiring Store ==
/// TTL key-value storage holding arbitrary values by string key.
#[derive(Debug)]
pub struct ExpiringStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// TTL applied by `set`
    default_ttl: Duration,
}

impl<V: Clone> ExpiringStore<V> {
    // == Constructor ==
    /// Creates a new store whose entries live for `default_ttl` after each set.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Set ==
    /// Stores a value under `key`, overwriting any previous value and
    /// restarting its TTL window. Always succeeds.
    pub fn set(&mut self, key: impl Into<String>, value: V) -> bool {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl)
    }

    /// Stores a value with an explicit TTL instead of the default one.
    pub fn set_with_ttl(&mut self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        self.entries.insert(key.into(), CacheEntry::new(value, ttl));
        self.stats.set_keys(self.entries.len());
        true
    }

    // == Get ==
    /// Retrieves an owned copy of the value stored under `key`.
    ///
    /// Expired entries still present (not yet swept) are removed here and
    /// reported as absent. Reads never extend the TTL window.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_keys(self.entries.len());
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Delete ==
    /// Removes an entry by key. Returns true if something was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_keys(self.entries.len());
        removed
    }

    // == Flush All ==
    /// Drops every entry and resets statistics.
    pub fn flush_all(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::new();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_keys(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();

        self.stats.record_expirations(removed);
        self.stats.set_keys(self.entries.len());
        removed
    }

    /// Returns all live keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
