//! Bounded Cache Module
//!
//! Fixed-capacity key/value store combining HashMap storage with LRU
//! tracking and optional per-entry TTL.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LinkedOrder, RecencyOrder};
use crate::events::{noop_sink, notify, ShapingEvent, SharedSink};

// == Bounded Cache ==
/// Cache holding at most `limit` entries, evicting the least recently used.
///
/// `O` selects the recency tracker; [`LinkedOrder`] is the default and
/// [`crate::cache::ScanOrder`] suits small caches.
#[derive(Debug)]
pub struct BoundedCache<V, O: RecencyOrder = LinkedOrder> {
    entries: HashMap<String, CacheEntry<V>>,
    order: O,
    stats: CacheStats,
    limit: usize,
    events: SharedSink,
}

impl<V, O: RecencyOrder> BoundedCache<V, O> {
    // == Constructor ==
    /// Creates an empty cache. A `limit` of 0 is clamped to 1.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: O::default(),
            stats: CacheStats::new(),
            limit: limit.max(1),
            events: noop_sink(),
        }
    }

    /// Routes cache events to `sink`.
    pub fn with_events(mut self, sink: SharedSink) -> Self {
        self.events = sink;
        self
    }

    // == Put ==
    /// Inserts or overwrites `key` as the most recently used entry, then
    /// evicts from the LRU end until the cache fits its limit.
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        self.insert(key.into(), CacheEntry::new(value, None));
    }

    /// Same as [`put`](Self::put) but the entry expires after `ttl`.
    pub fn put_with_ttl(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        self.insert(key.into(), CacheEntry::new(value, Some(ttl)));
    }

    fn insert(&mut self, key: String, entry: CacheEntry<V>) {
        self.order.touch(&key);
        self.entries.insert(key, entry);

        while self.entries.len() > self.limit {
            let Some(evicted) = self.order.pop_lru() else {
                break;
            };
            self.entries.remove(&evicted);
            self.stats.record_eviction();
            debug!("LRU eviction: {}", evicted);
            notify(&*self.events, ShapingEvent::CacheEviction { key: evicted });
        }

        self.stats.set_total_entries(self.entries.len());
    }

    // == Lookup ==
    /// Returns a reference to a live entry's value and marks it most recently
    /// used. Expired entries are removed and reported as misses.
    pub fn get_ref(&mut self, key: &str) -> Option<&V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                notify(&*self.events, ShapingEvent::CacheMiss { key: key.to_string() });
                return None;
            }
        };

        if expired {
            self.drop_expired(key);
            self.stats.record_miss();
            notify(&*self.events, ShapingEvent::CacheMiss { key: key.to_string() });
            return None;
        }

        self.stats.record_hit();
        self.order.touch(key);
        notify(&*self.events, ShapingEvent::CacheHit { key: key.to_string() });
        self.entries.get(key).map(|entry| &entry.value)
    }

    fn drop_expired(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.remove(key);
        self.stats.record_expiration();
        self.stats.set_total_entries(self.entries.len());
        notify(&*self.events, ShapingEvent::CacheExpired { key: key.to_string() });
    }

    /// Checks for a live entry without touching recency or statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Delete ==
    /// Removes an entry. Returns false if the key was absent.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.remove(key);
            self.stats.set_total_entries(self.entries.len());
            true
        } else {
            false
        }
    }

    /// Removes every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats.set_total_entries(0);
    }

    // == Limit ==
    /// Changes the capacity, clamped to at least 1.
    ///
    /// Shrinking does not evict immediately; the next `put` trims the cache.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.drop_expired(key);
        }
        expired.len()
    }

    /// Keys ordered from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.order.keys()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone, O: RecencyOrder> BoundedCache<V, O> {
    /// Returns a copy of a live entry's value and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_ref(key).cloned()
    }
}
