//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::{Deserialize, Serialize};

use crate::cache::EvictionPolicy;

// == Cache Stats ==
/// Performance counters plus the shape of the cache they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries physically stored, including expired ones not yet swept
    pub size: usize,
    /// Maximum number of entries before eviction triggers
    pub capacity: usize,
    /// Number of successful reads
    pub hits: u64,
    /// Number of reads that found nothing or an expired entry
    pub misses: u64,
    /// Number of entries removed by the eviction policy
    pub evictions: u64,
    /// `hits / (hits + misses) * 100`, 0 before the first read
    pub hit_rate: f64,
    /// Eviction policy of the cache
    pub policy: EvictionPolicy,
}

impl CacheStats {
    // == Constructor ==
    /// Creates zeroed stats for a cache of the given shape.
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            size: 0,
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
            hit_rate: 0.0,
            policy,
        }
    }

    // == Hit Rate ==
    /// Hit rate as a percentage, or 0.0 if no reads have been made.
    pub fn compute_hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.refresh_hit_rate();
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.refresh_hit_rate();
    }

    // == Record Eviction ==
    /// Adds to the eviction counter.
    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    // == Reset ==
    /// Zeroes every counter, keeping capacity and policy.
    pub fn reset(&mut self) {
        *self = Self::new(self.capacity, self.policy);
    }

    // == Update Entry Count ==
    /// Updates the current size.
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    fn refresh_hit_rate(&mut self) {
        self.hit_rate = Self::compute_hit_rate(self.hits, self.misses);
    }
}
