//! Error types for the configuration cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors returned synchronously by cache operations.
///
/// Refresh callback failures are deliberately absent: they are counted in
/// [`CacheStats`](crate::cache::CacheStats) and leave the prior entry in place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A new key was inserted while the cache already held `limit` entries
    #[error("cache is full, cannot add more than {limit} entries")]
    CapacityExceeded { limit: usize },

    /// A refresh worker is already running for this cache
    #[error("refresh worker has already been started")]
    AlreadyRunning,

    /// Periodic tasks need a non-zero interval
    #[error("interval must be greater than zero")]
    InvalidInterval,

    /// Background tasks can only be started from within a tokio runtime
    #[error("no tokio runtime available to run the worker")]
    NoRuntime,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
