//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with TTL expiration and a
//! pluggable eviction policy.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheStats, EvictionPolicy, TimedEntry};
use crate::clock::{millis, Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;

/// A cache shared between tasks. Every cache operation is a single
/// synchronous call made while holding the lock.
pub type SharedCache<K, V> = Arc<RwLock<Cache<K, V>>>;

// == Cache ==
/// Fixed-capacity key-value store with per-entry TTL and policy-driven eviction.
#[derive(Debug)]
pub struct Cache<K, V> {
    /// Key-value storage
    entries: HashMap<K, TimedEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// Capacity, default TTL, policy and sweep interval
    config: CacheConfig,
    /// Time source for TTL and recency
    clock: Arc<dyn Clock>,
    /// Logical operation counter used to break ranking ties
    tick: u64,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a cache driven by the system clock.
    ///
    /// Fails with `InvalidConfig` if the configuration does not validate.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache driven by the given clock.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config, clock))
    }

    /// Builds a cache from a configuration the caller already validated.
    pub(crate) fn from_validated(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(config.capacity, config.policy),
            config,
            clock,
            tick: 0,
        }
    }

    /// Wraps the cache for sharing across tasks.
    pub fn into_shared(self) -> SharedCache<K, V> {
        Arc::new(RwLock::new(self))
    }

    // == Set ==
    /// Stores a value, replacing any existing entry for the key.
    ///
    /// Overwriting resets the entry's age and access metadata. Inserting a new
    /// key into a full cache first evicts `ceil(size * 0.1)` entries in policy
    /// order.
    pub fn set(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let is_overwrite = self.entries.contains_key(&key);
        if !is_overwrite && self.entries.len() >= self.config.capacity {
            self.evict();
        }

        let ttl_ms = millis(ttl.unwrap_or(self.config.default_ttl));
        let tick = self.next_tick();
        let entry = TimedEntry::new(value, self.clock.now_ms(), ttl_ms, tick);
        self.entries.insert(key, entry);
        self.stats.set_size(self.entries.len());
    }

    // == Get ==
    /// Retrieves a live value, counting a hit or a miss.
    ///
    /// Expired entries are removed on the spot and counted as misses.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.lookup(key).cloned()
    }

    // == Has ==
    /// Same as `get` without returning the value.
    ///
    /// This counts as a read: it records a hit or miss, bumps the access
    /// count and drops an expired entry. Use [`peek`](Self::peek) for a
    /// side-effect free check.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lookup(key).is_some()
    }

    // == Peek ==
    /// Returns a live value without touching counters or access metadata.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| &entry.value)
    }

    // == Delete ==
    /// Removes an entry. Returns whether the key was present.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_size(self.entries.len());
        removed
    }

    // == Clear ==
    /// Removes every entry and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.reset();
    }

    // == Keys ==
    /// Iterates over the stored keys, including expired entries not yet swept.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.keys()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries without touching the hit/miss counters.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        self.stats.set_size(self.entries.len());
        before - self.entries.len()
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lookup<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = self.clock.now_ms();
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.entries.remove(key);
            self.stats.set_size(self.entries.len());
            self.stats.record_miss();
            return None;
        }

        let tick = self.next_tick();
        self.stats.record_hit();
        let entry = self.entries.get_mut(key)?;
        entry.record_access(now, tick);
        Some(&entry.value)
    }

    fn evict(&mut self) {
        let policy = self.config.policy;
        let count = EvictionPolicy::victim_count(self.entries.len());

        let mut ranked: Vec<(&K, (u64, u64))> = self
            .entries
            .iter()
            .map(|(key, entry)| (key, policy.rank(entry)))
            .collect();
        ranked.sort_unstable_by_key(|(_, rank)| *rank);

        let victims: Vec<K> = ranked
            .into_iter()
            .take(count)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &victims {
            self.entries.remove(key);
        }
        self.stats.record_evictions(victims.len());
        debug!(policy = %policy, evicted = victims.len(), "Evicted cache entries");
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
