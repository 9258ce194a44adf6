//! Cache Entry Module
//!
//! Defines stored entries, the values handed to `set`, and refresh callbacks.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::expiry::is_expired_at;

// == Refresh Callback ==
/// Re-fetches an entry's item from its source of truth.
///
/// The cache only holds the function; whatever clients or credentials the
/// closure captures stay owned by the caller. Retry and backoff belong inside
/// the callback (see [`RefreshCallback::with_retries`]).
pub struct RefreshCallback<T> {
    fetch: Arc<dyn Fn() -> anyhow::Result<T> + Send + Sync>,
}

impl<T> RefreshCallback<T> {
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            fetch: Arc::new(fetch),
        }
    }

    /// Runs the callback once.
    pub fn call(&self) -> anyhow::Result<T> {
        (self.fetch)()
    }
}

impl<T: 'static> RefreshCallback<T> {
    /// Wraps the callback so one invocation makes up to `retries` extra
    /// attempts, returning the last error if every attempt fails.
    pub fn with_retries(self, retries: usize) -> Self {
        let inner = self.fetch;
        Self::new(move || {
            let mut attempt = 0;
            loop {
                match inner() {
                    Ok(item) => return Ok(item),
                    Err(err) if attempt >= retries => return Err(err),
                    Err(_) => attempt += 1,
                }
            }
        })
    }
}

impl<T> Clone for RefreshCallback<T> {
    fn clone(&self) -> Self {
        Self {
            fetch: Arc::clone(&self.fetch),
        }
    }
}

impl<T> fmt::Debug for RefreshCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshCallback(..)")
    }
}

// == Cache Value ==
/// A value to be stored with [`set`](super::ConfigCache::set).
///
/// Without an explicit expiry the cache stamps `now() + ttl` at insertion.
#[derive(Debug, Clone)]
pub struct CacheValue<T> {
    pub(crate) item: T,
    pub(crate) expires: Option<DateTime<Utc>>,
    pub(crate) refresh: Option<RefreshCallback<T>>,
}

impl<T> CacheValue<T> {
    pub fn new(item: T) -> Self {
        Self {
            item,
            expires: None,
            refresh: None,
        }
    }

    /// Overrides the expiry the cache would otherwise compute.
    pub fn with_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Registers the callback used by refresh cycles.
    pub fn with_refresh_callback(mut self, refresh: RefreshCallback<T>) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Shorthand for `with_refresh_callback(RefreshCallback::new(fetch))`.
    pub fn refresh_with<F>(self, fetch: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.with_refresh_callback(RefreshCallback::new(fetch))
    }
}

impl<T> From<T> for CacheValue<T> {
    fn from(item: T) -> Self {
        Self::new(item)
    }
}

// == Cache Entry ==
/// An entry as held by the cache: item, expiry and optional refresh callback.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub(crate) item: T,
    pub(crate) expires: DateTime<Utc>,
    pub(crate) refresh: Option<RefreshCallback<T>>,
}

impl<T> CacheEntry<T> {
    pub(crate) fn stamp(
        value: CacheValue<T>,
        default_expiry: impl FnOnce() -> DateTime<Utc>,
    ) -> Self {
        Self {
            item: value.item,
            expires: value.expires.unwrap_or_else(default_expiry),
            refresh: value.refresh,
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn into_item(self) -> T {
        self.item
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn refresh_callback(&self) -> Option<&RefreshCallback<T>> {
        self.refresh.as_ref()
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh.is_some()
    }

    /// Whether the entry is stale as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired_at(self.expires, now)
    }
}
