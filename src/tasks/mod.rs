//! Background Tasks Module
//!
//! Periodic maintenance loops run on the tokio runtime.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from an in-memory cache
//! - Durable cleanup: host-scheduled purge of expired durable records

mod durable_cleanup;
mod sweep;

pub use durable_cleanup::spawn_durable_cleanup_task;
pub use sweep::spawn_sweep_task;
