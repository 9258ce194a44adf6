//! Configuration Module
//!
//! Loads cache parameters from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{DEFAULT_CACHE_LIMIT, DEFAULT_CACHE_TTL, DEFAULT_REFRESH_INTERVAL};

/// Default interval between expired-entry flushes, in seconds.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL in seconds for entries inserted without an explicit expiry
    pub ttl_secs: u64,
    /// Interval in seconds between background refresh cycles
    pub refresh_interval_secs: u64,
    /// Interval in seconds between background flushes of expired entries
    pub flush_interval_secs: u64,
    /// Maximum number of entries; negative means unlimited
    pub limit: i64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_SECS` - Default TTL in seconds (default: 300)
    /// - `CACHE_REFRESH_INTERVAL_SECS` - Refresh cycle frequency (default: 180)
    /// - `CACHE_FLUSH_INTERVAL_SECS` - Flush frequency (default: 60)
    /// - `CACHE_LIMIT` - Maximum entries, negative for unlimited (default: -1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl_secs: env_or("CACHE_TTL_SECS", defaults.ttl_secs),
            refresh_interval_secs: env_or(
                "CACHE_REFRESH_INTERVAL_SECS",
                defaults.refresh_interval_secs,
            ),
            flush_interval_secs: env_or(
                "CACHE_FLUSH_INTERVAL_SECS",
                defaults.flush_interval_secs,
            ),
            limit: env_or("CACHE_LIMIT", defaults.limit),
        }
    }

    /// Default TTL as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Refresh interval as a `Duration`.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Flush interval as a `Duration`.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Capacity limit, `None` when unlimited.
    pub fn capacity_limit(&self) -> Option<usize> {
        usize::try_from(self.limit).ok()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            limit: DEFAULT_CACHE_LIMIT,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
