//! TTL + LRU bounded cache

use super::CacheStats;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A cached value with its bookkeeping timestamps
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value
    pub value: V,
    /// When the value was written
    pub created_at: DateTime<Utc>,
    /// Last read or write
    pub accessed_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, now: DateTime<Utc>) -> Self {
        Self {
            value,
            created_at: now,
            accessed_at: now,
        }
    }
}

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    /// Position in the recency index; larger is more recent
    tick: u64,
}

/// Key/value store with LRU eviction on capacity and TTL expiry on read
///
/// Recency is tracked with a monotonically increasing tick per touch, so the
/// least-recently-used key is always the smallest tick in `order`.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    capacity: usize,
    ttl: Duration,
    next_tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries, each living `ttl`
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            capacity: capacity.max(1),
            ttl,
            next_tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    /// Insert a value, returning the entry evicted to make room (if any)
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.insert_at(key, value, Utc::now())
    }

    /// Insert with an explicit timestamp (for testing/replay)
    pub fn insert_at(&mut self, key: K, value: V, now: DateTime<Utc>) -> Option<(K, V)> {
        let tick = self.bump_tick();

        if let Some(slot) = self.entries.get_mut(&key) {
            self.order.remove(&slot.tick);
            slot.tick = tick;
            slot.entry = CacheEntry::new(value, now);
            self.order.insert(tick, key);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };

        self.order.insert(tick, key.clone());
        self.entries.insert(
            key,
            Slot {
                entry: CacheEntry::new(value, now),
                tick,
            },
        );

        evicted
    }

    /// Look up a value, touching its recency
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_at(key, Utc::now())
    }

    /// Look up a value at an explicit time
    ///
    /// An expired entry is removed and counted as both a miss and an expiration.
    pub fn get_at(&mut self, key: &K, now: DateTime<Utc>) -> Option<&V> {
        if !self.touch(key, now) {
            return None;
        }
        self.entries.get(key).map(|slot| &slot.entry.value)
    }

    /// Mutable lookup at an explicit time, same accounting as [`get_at`](Self::get_at)
    pub fn get_mut_at(&mut self, key: &K, now: DateTime<Utc>) -> Option<&mut V> {
        if !self.touch(key, now) {
            return None;
        }
        self.entries.get_mut(key).map(|slot| &mut slot.entry.value)
    }

    /// Read an entry without touching recency or counters
    ///
    /// Expired entries are reported as absent but left in place.
    pub fn peek_at(&self, key: &K, now: DateTime<Utc>) -> Option<&CacheEntry<V>> {
        self.entries
            .get(key)
            .map(|slot| &slot.entry)
            .filter(|entry| !self.is_expired(entry, now))
    }

    /// Whether a live (unexpired) entry exists
    pub fn contains_key_at(&self, key: &K, now: DateTime<Utc>) -> bool {
        self.peek_at(key, now).is_some()
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot.entry.value)
    }

    /// Remove all entries (counters are kept)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, slot)| self.is_expired(&slot.entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }

    /// Iterate over live entries without touching recency
    pub fn iter_at(&self, now: DateTime<Utc>) -> impl Iterator<Item = (&K, &CacheEntry<V>)> {
        self.entries
            .iter()
            .map(|(key, slot)| (key, &slot.entry))
            .filter(move |(_, entry)| !self.is_expired(entry, now))
    }

    /// Number of stored entries (expired entries count until they are read or purged)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.created_at > self.ttl
    }

    fn bump_tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    /// Hit/miss accounting plus recency update. Returns true on a live hit.
    fn touch(&mut self, key: &K, now: DateTime<Utc>) -> bool {
        let expired = match self.entries.get(key) {
            Some(slot) => self.is_expired(&slot.entry, now),
            None => {
                self.misses += 1;
                return false;
            }
        };

        if expired {
            self.remove(key);
            self.misses += 1;
            self.expirations += 1;
            return false;
        }

        let tick = self.bump_tick();
        if let Some(slot) = self.entries.get_mut(key) {
            self.order.remove(&slot.tick);
            slot.tick = tick;
            slot.entry.accessed_at = now;
            self.order.insert(tick, key.clone());
        }
        self.hits += 1;
        true
    }

    fn evict_lru(&mut self) -> Option<(K, V)> {
        let oldest = *self.order.keys().next()?;
        let key = self.order.remove(&oldest)?;
        let slot = self.entries.remove(&key)?;
        self.evictions += 1;
        Some((key, slot.entry.value))
    }
}
