//! Durable Cleanup Task
//!
//! Host-side schedule for [`DurableCache::cleanup`](crate::durable::DurableCache::cleanup).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::durable::SharedDurableCache;

/// Spawns a task that purges expired durable records every `interval`.
///
/// The first purge happens after one interval; run `cleanup` directly at
/// startup if the store may hold records from a previous process.
pub fn spawn_durable_cleanup_task(cache: SharedDurableCache, interval: Duration) -> JoinHandle<()> {
    let cache = Arc::downgrade(&cache);

    tokio::spawn(async move {
        info!(
            "Starting durable cache cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                break;
            };

            let removed = cache.write().await.cleanup();

            if removed > 0 {
                info!("Durable cleanup: removed {} stale records", removed);
            } else {
                debug!("Durable cleanup: no stale records found");
            }
        }
    })
}
