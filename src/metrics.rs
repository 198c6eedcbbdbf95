//! Metrics Module
//!
//! Periodic snapshots of cache statistics kept in a bounded rolling history.
//! The recorder only reads statistics; it never mutates the caches it watches.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{Cache, CacheStats};
use crate::partition::PartitionedCache;
use crate::query::QueryCache;

/// Number of snapshots kept unless configured otherwise.
pub const DEFAULT_HISTORY: usize = 100;

/// Number of snapshots averaged by default.
pub const DEFAULT_AVERAGE_WINDOW: usize = 10;

// == Stats Source ==
/// Anything that can report [`CacheStats`].
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Current statistics of the source.
    async fn cache_stats(&self) -> CacheStats;
}

#[async_trait]
impl<K, V> StatsSource for RwLock<Cache<K, V>>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    async fn cache_stats(&self) -> CacheStats {
        self.read().await.stats()
    }
}

#[async_trait]
impl<V> StatsSource for QueryCache<V>
where
    V: Clone + Send + Sync,
{
    async fn cache_stats(&self) -> CacheStats {
        self.stats().await
    }
}

/// Partitions report as one cache: sizes, capacities and counters are summed.
#[async_trait]
impl<P, V> StatsSource for PartitionedCache<P, V>
where
    P: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync + 'static,
{
    async fn cache_stats(&self) -> CacheStats {
        let mut total = CacheStats::new(0, self.config().policy);
        for (_, stats) in self.partition_stats().await {
            total.size += stats.size;
            total.capacity += stats.capacity;
            total.hits += stats.hits;
            total.misses += stats.misses;
            total.evictions += stats.evictions;
        }
        total.hit_rate = CacheStats::compute_hit_rate(total.hits, total.misses);
        total
    }
}

// == Metrics Snapshot ==
/// Statistics of every registered source at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Position in the recording order, starting at 1
    pub sequence: u64,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Hit rate in percent over all sources combined
    pub hit_rate: f64,
    /// Statistics per registered source name
    pub caches: BTreeMap<String, CacheStats>,
}

// == Metrics Recorder ==
/// Collects snapshots into a sliding window of the most recent ones.
///
/// Clones share sources and history.
#[derive(Clone)]
pub struct MetricsRecorder {
    sources: Arc<RwLock<Vec<(String, Arc<dyn StatsSource>)>>>,
    history: Arc<RwLock<VecDeque<MetricsSnapshot>>>,
    max_history: usize,
    sequence: Arc<AtomicU64>,
}

impl fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("max_history", &self.max_history)
            .field("recorded", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    /// Creates a recorder keeping the last [`DEFAULT_HISTORY`] snapshots.
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Creates a recorder keeping the last `max_history` snapshots.
    ///
    /// A size of zero is clamped to one.
    pub fn with_history(max_history: usize) -> Self {
        Self {
            sources: Arc::new(RwLock::new(Vec::new())),
            history: Arc::new(RwLock::new(VecDeque::with_capacity(max_history.max(1)))),
            max_history: max_history.max(1),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    // == Register ==
    /// Adds a source to every future snapshot under `name`.
    ///
    /// Registering a name twice replaces the earlier source.
    pub async fn register(&self, name: impl Into<String>, source: Arc<dyn StatsSource>) {
        let name = name.into();
        let mut sources = self.sources.write().await;
        sources.retain(|(existing, _)| *existing != name);
        sources.push((name, source));
    }

    // == Start Monitoring ==
    /// Spawns a task that collects a snapshot every `interval`.
    ///
    /// Each call starts another task; abort the handle to stop it.
    pub fn start_monitoring(&self, interval: Duration) -> JoinHandle<()> {
        let recorder = self.clone();

        tokio::spawn(async move {
            info!(
                "Starting cache metrics monitoring with interval of {} seconds",
                interval.as_secs()
            );

            loop {
                tokio::time::sleep(interval).await;
                let snapshot = recorder.collect_metrics().await;
                debug!(
                    sequence = snapshot.sequence,
                    hit_rate = snapshot.hit_rate,
                    "Collected cache metrics"
                );
            }
        })
    }

    // == Collect Metrics ==
    /// Takes one snapshot now and appends it to the history.
    pub async fn collect_metrics(&self) -> MetricsSnapshot {
        let sources: Vec<(String, Arc<dyn StatsSource>)> = self.sources.read().await.clone();

        let mut caches = BTreeMap::new();
        let (mut hits, mut misses) = (0, 0);
        for (name, source) in sources {
            let stats = source.cache_stats().await;
            hits += stats.hits;
            misses += stats.misses;
            caches.insert(name, stats);
        }

        let snapshot = MetricsSnapshot {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            timestamp: Utc::now(),
            hit_rate: CacheStats::compute_hit_rate(hits, misses),
            caches,
        };

        let mut history = self.history.write().await;
        history.push_back(snapshot.clone());
        while history.len() > self.max_history {
            history.pop_front();
        }

        snapshot
    }

    // == Get Metrics ==
    /// Recorded snapshots, oldest first.
    pub async fn get_metrics(&self) -> Vec<MetricsSnapshot> {
        self.history.read().await.iter().cloned().collect()
    }

    // == Average Hit Rate ==
    /// Mean `hit_rate` of the last `min(last_n, recorded)` snapshots, 0.0 if
    /// nothing was recorded.
    pub async fn average_hit_rate(&self, last_n: usize) -> f64 {
        let history = self.history.read().await;
        let window = last_n.min(history.len());
        if window == 0 {
            return 0.0;
        }

        let sum: f64 = history
            .iter()
            .skip(history.len() - window)
            .map(|snapshot| snapshot.hit_rate)
            .sum();
        sum / window as f64
    }

    /// Maximum number of snapshots kept.
    pub fn max_history(&self) -> usize {
        self.max_history
    }
}
