//! Eviction Policy Module
//!
//! Closed set of eviction orders. The policies differ only in the key entries
//! are ranked by when capacity is exceeded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::TimedEntry;
use crate::error::CacheError;

/// One eviction pass removes 1 / EVICTION_DIVISOR of the entries, rounded up.
const EVICTION_DIVISOR: usize = 10;

// == Eviction Policy ==
/// Order in which entries are evicted when a new key would exceed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Least Recently Used: stalest `last_accessed_at` first
    #[default]
    #[serde(rename = "LRU")]
    Lru,
    /// Least Frequently Used: lowest `access_count` first
    #[serde(rename = "LFU")]
    Lfu,
    /// First In First Out: oldest `created_at` first
    #[serde(rename = "FIFO")]
    Fifo,
}

impl EvictionPolicy {
    // == Rank ==
    /// Sort key for an entry; lower ranks are evicted first.
    ///
    /// The second component is a logical tick that makes ties deterministic
    /// when timestamps or counts collide.
    pub(crate) fn rank<V>(&self, entry: &TimedEntry<V>) -> (u64, u64) {
        match self {
            EvictionPolicy::Lru => (entry.last_accessed_at, entry.touched_tick),
            EvictionPolicy::Lfu => (entry.access_count, entry.inserted_tick),
            EvictionPolicy::Fifo => (entry.created_at, entry.inserted_tick),
        }
    }

    // == Victim Count ==
    /// Number of entries one eviction pass removes: `ceil(size * 0.1)`, at
    /// least 1 when the cache is not empty.
    pub fn victim_count(size: usize) -> usize {
        size.div_ceil(EVICTION_DIVISOR)
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionPolicy::Lru => "LRU",
            EvictionPolicy::Lfu => "LFU",
            EvictionPolicy::Fifo => "FIFO",
        };
        f.write_str(name)
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown eviction policy '{}'",
                other
            ))),
        }
    }
}
