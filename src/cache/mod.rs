//! Cache Module
//!
//! Provides a bounded in-memory cache with TTL stamping and per-entry refresh.

mod entry;
mod expiry;
mod stats;
mod store;


use std::time::Duration;

use crate::error::Result;

// Re-export public types
pub use entry::{CacheEntry, CacheValue, RefreshCallback};
pub use expiry::{Clock, ExpiryPolicy, ManualClock, SystemClock};
pub use stats::CacheStats;
pub(crate) use stats::StatsRecorder;
pub use store::{ConfigCache, RefreshSummary};

// == Public Constants ==
/// Default time before a cached value is considered expired
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval between background refresh cycles
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3 * 60);

/// Default capacity limit; negative means unlimited
pub const DEFAULT_CACHE_LIMIT: i64 = -1;

// == Configuration Cache ==
/// The operations an authorization component needs from a configuration cache.
pub trait ConfigurationCache<T>: Send + Sync {
    /// Retrieves an entry if present, without checking expiry.
    fn get(&self, key: &str) -> Option<CacheEntry<T>>;

    /// Stores a value, failing only when a new key would exceed the limit.
    fn set(&self, key: String, value: CacheValue<T>) -> Result<()>;

    fn delete(&self, key: &str);

    /// Removes expired entries, returning how many were removed.
    fn flush_expired(&self) -> usize;

    /// Runs every registered refresh callback once.
    fn refresh(&self) -> RefreshSummary;
}
