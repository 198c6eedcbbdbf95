//! Query Cache Module
//!
//! Memoizes the results of asynchronous lookups by string key.
//!
//! Concurrent misses on the same key are coalesced: callers queue on a
//! per-key lock, the first one runs its producer and the rest find the value
//! already cached. A failed producer caches nothing, so the next queued caller
//! runs its own producer and sees its own result or error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;

use crate::cache::{Cache, CacheStats, SharedCache};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::Result;

// == Query Cache ==
/// String-keyed cache with get-or-compute semantics.
#[derive(Debug, Clone)]
pub struct QueryCache<V> {
    cache: SharedCache<String, V>,
    in_flight: InFlight,
}

/// Per-key locks of the misses currently being computed.
type InFlight = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

fn lock_in_flight(in_flight: &InFlight) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    // The map is never left half-updated, so a poisoned lock is still usable
    in_flight
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

// == Key Lease ==
/// A caller's registration in the per-key lock map.
///
/// Dropping the lease, including when the caller's future is cancelled,
/// removes the map entry once no caller holds the key's lock. Drop every
/// lock handle taken from the lease before the lease itself.
struct KeyLease {
    in_flight: InFlight,
    key: String,
}

impl KeyLease {
    fn new(in_flight: &InFlight, key: &str) -> Self {
        Self {
            in_flight: Arc::clone(in_flight),
            key: key.to_string(),
        }
    }

    /// The lock every caller of this key queues on.
    fn lock(&self) -> Arc<Mutex<()>> {
        lock_in_flight(&self.in_flight)
            .entry(self.key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let mut in_flight = lock_in_flight(&self.in_flight);
        // Only the map still references the lock: nobody is waiting
        if in_flight
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            in_flight.remove(&self.key);
        }
    }
}

impl<V> QueryCache<V>
where
    V: Clone,
{
    // == Constructor ==
    /// Creates a query cache over a fresh [`Cache`].
    pub fn new(config: CacheConfig) -> Result<Self> {
        Ok(Self::from_shared(Cache::new(config)?.into_shared()))
    }

    /// Creates a query cache driven by the given clock.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::from_shared(
            Cache::with_clock(config, clock)?.into_shared(),
        ))
    }

    /// Wraps an existing shared cache.
    pub fn from_shared(cache: SharedCache<String, V>) -> Self {
        Self {
            cache,
            in_flight: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// The underlying cache, for sweeping or metrics.
    pub fn shared(&self) -> &SharedCache<String, V> {
        &self.cache
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or runs `producer` and caches its
    /// result.
    ///
    /// A producer error is returned as-is and leaves no entry behind. The
    /// cache lock is never held while the producer runs.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.cache.write().await.get(key) {
            return Ok(value);
        }

        let lease = KeyLease::new(&self.in_flight, key);
        let key_lock = lease.lock();
        let _guard = key_lock.lock().await;

        // Another caller may have filled the key while we waited. Peek so
        // the miss above stays the only counted lookup for this call.
        let cached = self.cache.read().await.peek(key).cloned();
        match cached {
            Some(value) => Ok(value),
            None => {
                let value = producer().await?;
                self.cache
                    .write()
                    .await
                    .set(key.to_string(), value.clone(), ttl);
                Ok(value)
            }
        }
    }

    // == Set ==
    /// Stores a value directly, bypassing any producer.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.cache.write().await.set(key.into(), value, ttl);
    }

    // == Get ==
    /// Reads a value without computing it on miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.cache.write().await.get(key)
    }

    // == Invalidate ==
    /// Removes a single key.
    pub async fn invalidate(&self, key: &str) {
        self.cache.write().await.delete(key);
    }

    // == Invalidate Pattern ==
    /// Removes every key matching `pattern`. Returns the number removed.
    pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut cache = self.cache.write().await;
        let matching: Vec<String> = cache
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();

        for key in &matching {
            cache.delete(key.as_str());
        }
        matching.len()
    }

    /// Removes every entry and resets the counters.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    // == Stats ==
    /// Statistics of the underlying cache.
    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }
}
