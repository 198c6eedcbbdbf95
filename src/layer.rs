//! Cache Layer Module
//!
//! Composition root: builds every cache the application uses from one
//! [`Config`], wires them to the metrics recorder and owns their background
//! tasks. Construct it once at startup and hand clones of the caches to the
//! code that needs them.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::durable::{DurableCache, FileStore, KeyValueStore, MemoryStore, SharedDurableCache};
use crate::error::Result;
use crate::metrics::MetricsRecorder;
use crate::partition::PartitionedCache;
use crate::query::QueryCache;
use crate::tasks::{spawn_durable_cleanup_task, spawn_sweep_task};

/// Metrics source name of the shared query cache.
pub const QUERY_CACHE_NAME: &str = "queries";

/// Metrics source name of the per-user caches.
pub const USER_CACHE_NAME: &str = "users";

// == Cache Layer ==
/// Every cache of the application plus its metrics recorder.
#[derive(Debug, Clone)]
pub struct CacheLayer {
    /// Memoized backend query results
    pub queries: QueryCache<Value>,
    /// Per-user caches keyed by user id
    pub users: PartitionedCache<String, Value>,
    /// Cache that survives restarts
    pub durable: SharedDurableCache,
    /// Rolling statistics of `queries` and `users`
    pub metrics: MetricsRecorder,
    config: Config,
}

impl CacheLayer {
    /// Builds the layer and registers its caches with the metrics recorder.
    ///
    /// Fails only on invalid cache configuration. A durable file that cannot
    /// be opened is logged and replaced by an in-memory store.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let queries = QueryCache::new(config.query_cache())?;
        let users = PartitionedCache::new(config.user_cache())?;

        let store: Box<dyn KeyValueStore> = match &config.durable_path {
            Some(path) => match FileStore::open(path) {
                Ok(store) => Box::new(store),
                Err(err) => {
                    warn!(path = %path, error = %err, "Durable cache file unusable, falling back to memory");
                    Box::new(MemoryStore::new())
                }
            },
            None => Box::new(MemoryStore::new()),
        };
        let durable = DurableCache::new(store, config.durable_prefix.clone()).into_shared();

        let metrics = MetricsRecorder::with_history(config.metrics_history);
        metrics
            .register(QUERY_CACHE_NAME, Arc::new(queries.clone()))
            .await;
        metrics.register(USER_CACHE_NAME, Arc::new(users.clone())).await;

        Ok(Self {
            queries,
            users,
            durable,
            metrics,
            config: config.clone(),
        })
    }

    /// Configuration the layer was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Start ==
    /// Purges stale durable records, then spawns the query cache sweep, the
    /// durable cleanup loop and metrics monitoring.
    ///
    /// Per-user partitions run their own sweeps.
    pub async fn start(&self) -> BackgroundTasks {
        let removed = self.durable.write().await.cleanup();
        info!("Startup durable cleanup removed {} stale records", removed);

        let mut handles = Vec::new();
        if let Some(interval) = self.queries.shared().read().await.config().sweep_interval {
            handles.push(spawn_sweep_task(self.queries.shared().clone(), interval));
        }
        handles.push(spawn_durable_cleanup_task(
            self.durable.clone(),
            Duration::from_secs(self.config.durable_cleanup_interval),
        ));
        handles.push(
            self.metrics
                .start_monitoring(Duration::from_secs(self.config.metrics_interval)),
        );

        BackgroundTasks { handles }
    }
}

// == Background Tasks ==
/// Handles of the tasks started by [`CacheLayer::start`].
#[derive(Debug)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no task was started.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Aborts every task.
    pub fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        info!("Stopped {} background tasks", self.handles.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use serde_json::json;

    #[tokio::test]
    async fn test_layer_from_default_config() {
        let layer = CacheLayer::from_config(&Config::default()).await.unwrap();

        layer.queries.set("courses", json!([1, 2]), None).await;
        layer
            .users
            .partition(&"student_1".to_string())
            .await
            .write()
            .await
            .set("dashboard".to_string(), json!({"due": 3}), None);

        let snapshot = layer.metrics.collect_metrics().await;
        assert_eq!(snapshot.caches[QUERY_CACHE_NAME].size, 1);
        assert_eq!(snapshot.caches[USER_CACHE_NAME].size, 1);
    }

    #[tokio::test]
    async fn test_layer_rejects_invalid_config() {
        let config = Config {
            query_max_entries: 0,
            ..Config::default()
        };

        let result = CacheLayer::from_config(&config).await;
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_layer_uses_file_store_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("durable.json");
        let config = Config {
            durable_path: Some(path.to_string_lossy().into_owned()),
            ..Config::default()
        };

        {
            let layer = CacheLayer::from_config(&config).await.unwrap();
            layer
                .durable
                .write()
                .await
                .set("prefs", &json!({"lang": "en"}), Duration::from_secs(3600));
        }

        let layer = CacheLayer::from_config(&config).await.unwrap();
        let prefs: Option<Value> = layer.durable.write().await.get("prefs");
        assert_eq!(prefs, Some(json!({"lang": "en"})));
    }

    #[tokio::test]
    async fn test_layer_falls_back_on_corrupt_durable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("durable.json");
        std::fs::write(&path, "garbage").unwrap();
        let config = Config {
            durable_path: Some(path.to_string_lossy().into_owned()),
            ..Config::default()
        };

        let layer = CacheLayer::from_config(&config).await.unwrap();
        layer
            .durable
            .write()
            .await
            .set("k", &1, Duration::from_secs(60));
        assert_eq!(layer.durable.write().await.get::<i32>("k"), Some(1));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let layer = CacheLayer::from_config(&Config::default()).await.unwrap();

        let tasks = layer.start().await;

        assert_eq!(tasks.len(), 3);
        tasks.shutdown();
    }
}
