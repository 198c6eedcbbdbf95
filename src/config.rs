//! Configuration Module
//!
//! Per-cache settings with validation, and the application configuration
//! loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionPolicy;
use crate::error::{CacheError, Result};

// == Cache Config ==
/// Shape of a single in-memory cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction triggers
    pub capacity: usize,
    /// TTL applied when `set` gets no override
    pub default_ttl: Duration,
    /// Eviction order
    pub policy: EvictionPolicy,
    /// Interval of the background expiry sweep, None = no sweep
    pub sweep_interval: Option<Duration>,
}

impl CacheConfig {
    /// Creates a configuration with the default 60 second sweep.
    pub fn new(capacity: usize, default_ttl: Duration, policy: EvictionPolicy) -> Self {
        Self {
            capacity,
            default_ttl,
            policy,
            sweep_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Replaces the sweep interval. `None` disables the sweep.
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    // == Validate ==
    /// Rejects zero capacity, zero TTL and a zero sweep interval.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default TTL must be greater than 0".to_string(),
            ));
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Application configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the shared query cache
    pub query_max_entries: usize,
    /// Default TTL in seconds of the shared query cache
    pub query_default_ttl: u64,
    /// Eviction policy of the shared query cache
    pub query_policy: EvictionPolicy,
    /// Capacity of each per-user partition
    pub user_max_entries: usize,
    /// Default TTL in seconds of each per-user partition
    pub user_default_ttl: u64,
    /// Eviction policy of each per-user partition
    pub user_policy: EvictionPolicy,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// File backing the durable cache, None = in-memory store
    pub durable_path: Option<String>,
    /// Namespace prefix of durable cache records
    pub durable_prefix: String,
    /// Durable cache cleanup interval in seconds
    pub durable_cleanup_interval: u64,
    /// Metrics snapshot interval in seconds
    pub metrics_interval: u64,
    /// Number of metrics snapshots kept
    pub metrics_history: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `QUERY_CACHE_MAX_ENTRIES` (default: 1000)
    /// - `QUERY_CACHE_TTL` seconds (default: 300)
    /// - `QUERY_CACHE_POLICY` lru | lfu | fifo (default: lru)
    /// - `USER_CACHE_MAX_ENTRIES` (default: 100)
    /// - `USER_CACHE_TTL` seconds (default: 600)
    /// - `USER_CACHE_POLICY` (default: lru)
    /// - `SWEEP_INTERVAL` seconds (default: 60)
    /// - `DURABLE_CACHE_PATH` (default: unset, in-memory)
    /// - `DURABLE_CACHE_PREFIX` (default: "cache_")
    /// - `DURABLE_CLEANUP_INTERVAL` seconds (default: 3600)
    /// - `METRICS_INTERVAL` seconds (default: 60)
    /// - `METRICS_HISTORY` (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            query_max_entries: env_or("QUERY_CACHE_MAX_ENTRIES", defaults.query_max_entries),
            query_default_ttl: env_or("QUERY_CACHE_TTL", defaults.query_default_ttl),
            query_policy: env_or("QUERY_CACHE_POLICY", defaults.query_policy),
            user_max_entries: env_or("USER_CACHE_MAX_ENTRIES", defaults.user_max_entries),
            user_default_ttl: env_or("USER_CACHE_TTL", defaults.user_default_ttl),
            user_policy: env_or("USER_CACHE_POLICY", defaults.user_policy),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            durable_path: env::var("DURABLE_CACHE_PATH")
                .ok()
                .filter(|v| !v.is_empty()),
            durable_prefix: env::var("DURABLE_CACHE_PREFIX").unwrap_or(defaults.durable_prefix),
            durable_cleanup_interval: env_or(
                "DURABLE_CLEANUP_INTERVAL",
                defaults.durable_cleanup_interval,
            ),
            metrics_interval: env_or("METRICS_INTERVAL", defaults.metrics_interval),
            metrics_history: env_or("METRICS_HISTORY", defaults.metrics_history),
        }
    }

    /// Configuration of the shared query cache.
    pub fn query_cache(&self) -> CacheConfig {
        CacheConfig::new(
            self.query_max_entries,
            Duration::from_secs(self.query_default_ttl),
            self.query_policy,
        )
        .with_sweep_interval(Some(Duration::from_secs(self.sweep_interval)))
    }

    /// Configuration applied to every per-user partition.
    pub fn user_cache(&self) -> CacheConfig {
        CacheConfig::new(
            self.user_max_entries,
            Duration::from_secs(self.user_default_ttl),
            self.user_policy,
        )
        .with_sweep_interval(Some(Duration::from_secs(self.sweep_interval)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_max_entries: 1000,
            query_default_ttl: 300,
            query_policy: EvictionPolicy::Lru,
            user_max_entries: 100,
            user_default_ttl: 600,
            user_policy: EvictionPolicy::Lru,
            sweep_interval: 60,
            durable_path: None,
            durable_prefix: "cache_".to_string(),
            durable_cleanup_interval: 3600,
            metrics_interval: 60,
            metrics_history: 100,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
