//! Cache Module
//!
//! Provides the in-memory cache with TTL expiration and LRU/LFU/FIFO eviction.

mod entry;
mod policy;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::TimedEntry;
pub use policy::EvictionPolicy;
pub use stats::CacheStats;
pub use store::{Cache, SharedCache};
