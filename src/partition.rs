//! Partitioned Cache Module
//!
//! One independent cache per partition key (typically a user id), created on
//! first access and discarded explicitly.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{Cache, CacheStats, SharedCache};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::spawn_sweep_task;

/// A partition's cache and its expiry sweep.
#[derive(Debug)]
struct Partition<V> {
    cache: SharedCache<String, V>,
    sweeper: Option<JoinHandle<()>>,
}

impl<V> Drop for Partition<V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

// == Partitioned Cache ==
/// Lazily created caches keyed by partition, all sharing one configuration.
///
/// Clones are handles to the same set of partitions.
#[derive(Debug)]
pub struct PartitionedCache<P, V> {
    partitions: Arc<RwLock<HashMap<P, Partition<V>>>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl<P, V> Clone for PartitionedCache<P, V> {
    fn clone(&self) -> Self {
        Self {
            partitions: Arc::clone(&self.partitions),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<P, V> PartitionedCache<P, V>
where
    P: Eq + Hash + Clone,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty partitioned cache. Every partition uses `config`.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty partitioned cache driven by the given clock.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            partitions: Arc::new(RwLock::new(HashMap::new())),
            config,
            clock,
        })
    }

    // == Partition ==
    /// Returns the cache of `key`, creating it on first access.
    ///
    /// Repeated calls return handles to the same cache.
    pub async fn partition(&self, key: &P) -> SharedCache<String, V> {
        if let Some(partition) = self.partitions.read().await.get(key) {
            return partition.cache.clone();
        }

        let mut partitions = self.partitions.write().await;
        partitions
            .entry(key.clone())
            .or_insert_with(|| self.new_partition())
            .cache
            .clone()
    }

    // == Clear Partition ==
    /// Empties one partition but keeps it. No-op for unknown keys.
    pub async fn clear_partition(&self, key: &P) {
        if let Some(partition) = self.partitions.read().await.get(key) {
            partition.cache.write().await.clear();
        }
    }

    // == Remove Partition ==
    /// Discards one partition and stops its sweep. Returns whether it existed.
    pub async fn remove_partition(&self, key: &P) -> bool {
        self.partitions.write().await.remove(key).is_some()
    }

    // == Clear All ==
    /// Clears and discards every partition.
    pub async fn clear_all(&self) {
        let drained: Vec<Partition<V>> = {
            let mut partitions = self.partitions.write().await;
            partitions.drain().map(|(_, partition)| partition).collect()
        };

        // Callers may still hold handles to these caches
        for partition in &drained {
            partition.cache.write().await.clear();
        }
        debug!(partitions = drained.len(), "Discarded all cache partitions");
    }

    /// Number of live partitions.
    pub async fn partition_count(&self) -> usize {
        self.partitions.read().await.len()
    }

    /// Returns true if `key` has a partition, without creating one.
    pub async fn contains_partition(&self, key: &P) -> bool {
        self.partitions.read().await.contains_key(key)
    }

    // == Stats ==
    /// Statistics of every partition.
    pub async fn partition_stats(&self) -> Vec<(P, CacheStats)> {
        let handles: Vec<(P, SharedCache<String, V>)> = self
            .partitions
            .read()
            .await
            .iter()
            .map(|(key, partition)| (key.clone(), partition.cache.clone()))
            .collect();

        let mut stats = Vec::with_capacity(handles.len());
        for (key, cache) in handles {
            stats.push((key, cache.read().await.stats()));
        }
        stats
    }

    /// Configuration shared by every partition.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn new_partition(&self) -> Partition<V> {
        let cache =
            Cache::from_validated(self.config.clone(), Arc::clone(&self.clock)).into_shared();
        let sweeper = match (self.config.sweep_interval, Handle::try_current()) {
            (Some(interval), Ok(_)) => Some(spawn_sweep_task(cache.clone(), interval)),
            _ => None,
        };
        debug!("Created cache partition");
        Partition { cache, sweeper }
    }
}
