//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
///
/// Only construction (`InvalidConfig`) surfaces to callers of the in-memory
/// caches. The storage variants are produced by durable backends and are
/// absorbed by [`DurableCache`](crate::durable::DurableCache).
#[derive(Error, Debug)]
pub enum CacheError {
    /// Rejected cache configuration (zero capacity, zero TTL, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backend refused a write because it would exceed its quota
    #[error("Storage quota exceeded: needed {needed} bytes, {available} available")]
    QuotaExceeded {
        /// Bytes the write would have required
        needed: usize,
        /// Bytes left in the quota
        available: usize,
    },

    /// Filesystem failure in a disk-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
