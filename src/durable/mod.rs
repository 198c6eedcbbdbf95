//! Durable Cache Module
//!
//! A best-effort cache persisted through a [`KeyValueStore`], so contents
//! survive a restart. Expired records are dropped lazily on read and in bulk by
//! [`DurableCache::cleanup`], which the host schedules; the cache itself runs
//! no background task.
//!
//! Storage failures never reach the caller: reads degrade to a miss and writes
//! are dropped, both with a warning.

mod backend;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clock::{millis, Clock, SystemClock};

pub use backend::{FileStore, KeyValueStore, MemoryStore};

/// A durable cache shared between tasks.
pub type SharedDurableCache = Arc<RwLock<DurableCache>>;

// == Durable Record ==
/// What is written under each namespaced key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DurableRecord {
    value: serde_json::Value,
    created_at: u64,
    ttl_millis: u64,
}

impl DurableRecord {
    fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl_millis
    }
}

// == Durable Cache ==
/// TTL cache stored as JSON records under `prefix + key`.
#[derive(Debug)]
pub struct DurableCache {
    store: Box<dyn KeyValueStore>,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl DurableCache {
    /// Creates a cache over `store`, namespacing every key with `prefix`.
    pub fn new(store: Box<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self::with_clock(store, prefix, Arc::new(SystemClock))
    }

    /// Creates a cache driven by the given clock.
    pub fn with_clock(
        store: Box<dyn KeyValueStore>,
        prefix: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            clock,
        }
    }

    /// Wraps the cache for sharing across tasks.
    pub fn into_shared(self) -> SharedDurableCache {
        Arc::new(RwLock::new(self))
    }

    /// Namespace prefix of this cache's records.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    // == Set ==
    /// Persists `value` for `ttl`.
    ///
    /// Failures are logged and swallowed. A failed write also removes any
    /// earlier record for `key`, so the next `get` misses.
    pub fn set<T>(&mut self, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize + ?Sized,
    {
        let record = match serde_json::to_value(value) {
            Ok(value) => DurableRecord {
                value,
                created_at: self.clock.now_ms(),
                ttl_millis: millis(ttl),
            },
            Err(err) => {
                warn!(key, error = %err, "Durable cache: value not serializable, write dropped");
                return;
            }
        };

        let raw = match serde_json::to_string(&record) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "Durable cache: record not serializable, write dropped");
                return;
            }
        };

        let namespaced = self.namespaced(key);
        if let Err(err) = self.store.set_item(&namespaced, raw) {
            warn!(key, error = %err, "Durable cache: write failed, previous entry dropped");
            // A stale value must not outlive the write that replaced it
            self.remove_quietly(&namespaced);
        }
    }

    // == Get ==
    /// Reads a live value.
    ///
    /// Missing, expired, unparseable and wrongly-typed records are all misses;
    /// everything but a missing record is also removed.
    pub fn get<T>(&mut self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let namespaced = self.namespaced(key);
        let raw = match self.store.get_item(&namespaced) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "Durable cache: read failed, treating as miss");
                return None;
            }
        };

        let record: DurableRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(key, error = %err, "Durable cache: corrupt record removed");
                self.remove_quietly(&namespaced);
                return None;
            }
        };

        if record.is_expired(self.clock.now_ms()) {
            debug!(key, "Durable cache: expired record removed");
            self.remove_quietly(&namespaced);
            return None;
        }

        match serde_json::from_value(record.value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "Durable cache: record has unexpected shape, removed");
                self.remove_quietly(&namespaced);
                None
            }
        }
    }

    // == Delete ==
    /// Removes the record for `key`.
    pub fn delete(&mut self, key: &str) {
        let namespaced = self.namespaced(key);
        self.remove_quietly(&namespaced);
    }

    // == Clear ==
    /// Removes every record under this cache's prefix and nothing else.
    pub fn clear(&mut self) {
        let namespaced = self.namespaced_keys();
        self.remove_all_quietly(&namespaced);
    }

    // == Cleanup ==
    /// Removes every expired or unparseable record under the prefix.
    ///
    /// Returns the number of records removed.
    pub fn cleanup(&mut self) -> usize {
        let now = self.clock.now_ms();

        let stale: Vec<String> = self
            .namespaced_keys()
            .into_iter()
            .filter(|namespaced| match self.store.get_item(namespaced) {
                Ok(Some(raw)) => serde_json::from_str::<DurableRecord>(&raw)
                    .map_or(true, |record| record.is_expired(now)),
                Ok(None) => false,
                Err(err) => {
                    warn!(key = %namespaced, error = %err, "Durable cache: read failed during cleanup");
                    false
                }
            })
            .collect();

        if self.remove_all_quietly(&stale) {
            stale.len()
        } else {
            0
        }
    }

    // == Keys ==
    /// Keys of the records under this cache's prefix, without the prefix.
    pub fn keys(&self) -> Vec<String> {
        self.namespaced_keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }

    // == Length ==
    /// Number of records under the prefix, including expired ones.
    pub fn len(&self) -> usize {
        self.namespaced_keys().len()
    }

    /// Returns true if no records exist under the prefix.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn namespaced_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.prefix))
                .collect(),
            Err(err) => {
                warn!(error = %err, "Durable cache: listing keys failed");
                Vec::new()
            }
        }
    }

    fn remove_all_quietly(&mut self, namespaced: &[String]) -> bool {
        if namespaced.is_empty() {
            return true;
        }
        match self.store.remove_items(namespaced) {
            Ok(()) => true,
            Err(err) => {
                warn!(records = namespaced.len(), error = %err, "Durable cache: batch remove failed");
                false
            }
        }
    }

    fn remove_quietly(&mut self, namespaced: &str) -> bool {
        match self.store.remove_item(namespaced) {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %namespaced, error = %err, "Durable cache: remove failed");
                false
            }
        }
    }
}
