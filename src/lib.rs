//! Config Cache - a bounded TTL cache for remote configuration lookups
//!
//! Entries expire after a configurable TTL and can carry a refresh callback
//! that a background worker invokes periodically, keeping hot configuration
//! warm without callers ever waiting on the remote source.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{
    CacheEntry, CacheStats, CacheValue, ConfigCache, ConfigurationCache, RefreshCallback,
    RefreshSummary,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{spawn_flush_task, spawn_refresh_worker, stop_channel, StopHandle, StopSignal};
