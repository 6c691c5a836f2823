use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

/// Cache entry con TTL propio
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    /// Insertion sequence, used to find the oldest entry on eviction.
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.age(now) > self.ttl
    }
}

#[derive(Debug)]
struct Entries<V> {
    map: HashMap<String, CacheEntry<V>>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl<V> Entries<V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.map.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.map.remove(&key);
        Some(key)
    }

    fn clear(&mut self) -> usize {
        let removed = self.map.len();
        self.map.clear();
        self.order.clear();
        removed
    }
}

/// Bounded key/value store where every entry carries its own time-to-live.
///
/// Reads never return an entry older than its TTL: a stale entry is dropped
/// on the read that finds it. When a new key arrives while the store is full,
/// the entry inserted first is evicted. That only approximates LRU, since a
/// read does not refresh an entry's position.
///
/// Every operation is synchronous and infallible; a miss is `None`, never an
/// error. Time is read from `tokio::time::Instant`, so tests running on a
/// paused runtime can move the clock with `tokio::time::advance`.
#[derive(Debug)]
pub struct TtlCache<V> {
    name: &'static str,
    default_ttl: Duration,
    max_entries: usize,
    entries: Mutex<Entries<V>>,
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
}

impl<V> TtlCache<V> {
    /// Creates an empty cache. A `max_entries` of zero is treated as one.
    pub fn new(name: &'static str, default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            default_ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(Entries::new()),
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of stored entries, expired ones included until they are swept.
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `value` under `key` with the cache's default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key`, overwriting any previous entry.
    ///
    /// Overwriting restarts the entry's clock but keeps its place in the
    /// eviction order.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.map.get_mut(&key) {
            existing.value = value;
            existing.stored_at = now;
            existing.ttl = ttl;
            return;
        }

        if entries.map.len() >= self.max_entries {
            if let Some(evicted) = entries.pop_oldest() {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key = %evicted, "evicted oldest entry");
            }
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.order.insert(seq, key.clone());
        entries.map.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                seq,
            },
        );
    }

    /// Removes one entry. Returns whether something was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        if removed {
            debug!(cache = self.name, key, "invalidated");
        }
        removed
    }

    /// Removes every entry whose key contains `pattern`.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.entries.lock();
        let keys: Vec<String> = entries
            .map
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        for key in &keys {
            entries.remove(key);
        }

        if !keys.is_empty() {
            debug!(cache = self.name, pattern, removed = keys.len(), "invalidated by pattern");
        }
        keys.len()
    }

    /// Drops every entry.
    pub fn clear(&self) -> usize {
        let removed = self.entries.lock().clear();
        debug!(cache = self.name, removed, "cleared");
        removed
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .map
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.remove(key);
        }

        let removed = expired.len();
        if removed > 0 {
            self.counters
                .expired_removals
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(cache = self.name, removed, "swept expired entries");
        }
        removed
    }

    /// Diagnostic snapshot of every entry, oldest insertion first.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.lock();
        let per_entry = entries
            .order
            .values()
            .filter_map(|key| entries.map.get(key).map(|entry| (key, entry)))
            .map(|(key, entry)| {
                let age = entry.age(now);
                EntryStats {
                    key: key.clone(),
                    age,
                    ttl: entry.ttl,
                    expires_in: entry.ttl.saturating_sub(age),
                }
            })
            .collect();

        CacheStats {
            name: self.name,
            size: entries.map.len(),
            max_size: self.max_entries,
            entries: per_entry,
        }
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expired_removals: self.counters.expired_removals.load(Ordering::Relaxed),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Returns the value if it exists and is still within its TTL.
    ///
    /// An expired entry is removed as part of the lookup.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired = match entries.map.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key, "cache miss");
                return None;
            }
        };

        if expired {
            entries.remove(key);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            self.counters.expired_removals.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, key, "⏰ expired entry removed");
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(cache = self.name, key, "cache hit");
        entries.map.get(key).map(|entry| entry.value.clone())
    }
}

/// Snapshot of one cache, as returned by [`TtlCache::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub size: usize,
    pub max_size: usize,
    pub entries: Vec<EntryStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryStats {
    pub key: String,
    pub age: Duration,
    pub ttl: Duration,
    pub expires_in: Duration,
}

/// Métricas básicas del cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}
