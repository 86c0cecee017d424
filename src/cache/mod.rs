//! Bounded in-memory caches
//!
//! TTL + LRU key/value store used by the market data store and the scanner.

mod bounded;

pub use bounded::{BoundedCache, CacheEntry};

use serde::Serialize;

/// Counters exposed for health reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of live entries
    pub entries: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Successful lookups
    pub hits: u64,
    /// Lookups that found nothing (including expired entries)
    pub misses: u64,
    /// Entries dropped to make room for a new key
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
}

impl CacheStats {
    /// Fraction of lookups that were hits (0.0 when nothing was looked up)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}
