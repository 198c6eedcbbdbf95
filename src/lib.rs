//! Mini Cache - A client-side caching layer
//!
//! Provides TTL expiry with LRU/LFU/FIFO eviction, memoized async queries,
//! per-user cache partitions, a durable best-effort cache and rolling
//! hit-rate metrics.

pub mod cache;
pub mod clock;
pub mod config;
pub mod durable;
pub mod error;
pub mod layer;
pub mod metrics;
pub mod partition;
pub mod query;
pub mod tasks;

pub use cache::{Cache, CacheStats, EvictionPolicy, SharedCache};
pub use config::{CacheConfig, Config};
pub use durable::{DurableCache, FileStore, KeyValueStore, MemoryStore};
pub use error::{CacheError, Result};
pub use layer::{BackgroundTasks, CacheLayer};
pub use metrics::{MetricsRecorder, MetricsSnapshot, StatsSource};
pub use partition::PartitionedCache;
pub use query::QueryCache;
pub use tasks::{spawn_durable_cleanup_task, spawn_sweep_task};
