//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries, so caches
//! whose keys are never read again still shrink.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::clock::millis;

/// Spawns a background task that periodically cleans up expired cache entries.
///
/// The task holds only a weak reference to the cache and exits on its own
/// once the last strong handle is dropped. Abort the returned handle to stop
/// it earlier.
///
/// # Example
/// ```ignore
/// let cache = Cache::new(config)?.into_shared();
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<K, V>(cache: SharedCache<K, V>, interval: Duration) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let cache = Arc::downgrade(&cache);

    tokio::spawn(async move {
        debug!(interval_ms = millis(interval), "Starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping expiry sweep task");
                break;
            };

            let removed = cache.write().await.cleanup_expired();

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, EvictionPolicy};
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;

    fn shared_cache(clock: &ManualClock) -> SharedCache<String, String> {
        let config = CacheConfig::new(100, Duration::from_secs(300), EvictionPolicy::Lru);
        Cache::with_clock(config, Arc::new(clock.clone()))
            .unwrap()
            .into_shared()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired_entries() {
        let clock = ManualClock::new(0);
        let cache = shared_cache(&clock);
        cache.write().await.set(
            "expire_soon".to_string(),
            "value".to_string(),
            Some(Duration::from_secs(1)),
        );
        cache
            .write()
            .await
            .set("long_lived".to_string(), "value".to_string(), None);

        let handle = spawn_sweep_task(cache.clone(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(61)).await;

        {
            let guard = cache.read().await;
            assert_eq!(guard.len(), 1);
            assert!(guard.peek("long_lived").is_some());
            assert_eq!(guard.stats().misses, 0, "sweep does not count misses");
        }

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_stops_when_cache_dropped() {
        let clock = ManualClock::new(0);
        let cache = shared_cache(&clock);

        let handle = spawn_sweep_task(cache.clone(), Duration::from_secs(1));
        drop(cache);

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(handle.is_finished(), "sweep should exit without a cache");
    }

    #[tokio::test]
    async fn test_sweep_can_be_aborted() {
        let clock = ManualClock::new(0);
        let cache = shared_cache(&clock);

        let handle = spawn_sweep_task(cache, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
