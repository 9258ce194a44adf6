//! Cache Store Module
//!
//! Sharded key-value storage with TTL stamping, a capacity limit and bulk refresh.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::cache::{
    CacheEntry, CacheStats, CacheValue, Clock, ConfigurationCache, ExpiryPolicy, StatsRecorder,
    DEFAULT_CACHE_TTL,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Refresh Summary ==
/// Outcome of one [`ConfigCache::refresh`] cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Entries replaced with a freshly fetched item
    pub refreshed: usize,
    /// Callbacks that returned an error; their entries were left untouched
    pub failed: usize,
    /// Successful fetches discarded because the key was deleted meanwhile
    pub discarded: usize,
}

// == Config Cache ==
/// Bounded TTL cache whose entries can refresh themselves.
///
/// Storage is a [`DashMap`], so operations on unrelated keys only contend
/// when they hash to the same shard, and a slow refresh callback never holds
/// a lock while it runs.
pub struct ConfigCache<T> {
    /// Key-value storage
    entries: DashMap<String, CacheEntry<T>>,
    /// Number of occupied slots, updated under the owning shard's lock
    slots: AtomicUsize,
    /// Maximum number of entries, `None` = unlimited
    limit: Option<usize>,
    /// TTL and clock
    policy: ExpiryPolicy,
    /// Performance statistics
    stats: StatsRecorder,
    /// Set while a refresh worker owns this cache
    pub(crate) worker_running: AtomicBool,
}

impl<T> ConfigCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with the given default TTL and capacity limit.
    ///
    /// # Arguments
    /// * `ttl` - Added to the current time for entries without an explicit expiry
    /// * `limit` - Maximum number of entries, `None` for unlimited
    pub fn new(ttl: Duration, limit: Option<usize>) -> Self {
        Self::with_policy(ExpiryPolicy::new(ttl), limit)
    }

    /// Creates a cache that reads time from `clock`.
    pub fn with_clock(ttl: Duration, limit: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(ExpiryPolicy::with_clock(ttl, clock), limit)
    }

    /// Creates an unlimited cache with the default TTL.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CACHE_TTL, None)
    }

    /// Creates a cache from loaded configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.capacity_limit())
    }

    fn with_policy(policy: ExpiryPolicy, limit: Option<usize>) -> Self {
        Self {
            entries: DashMap::new(),
            slots: AtomicUsize::new(0),
            limit,
            policy,
            stats: StatsRecorder::default(),
            worker_running: AtomicBool::new(false),
        }
    }

    // == Get ==
    /// Looks up an entry without regard to its expiry.
    ///
    /// Staleness is the caller's decision; see [`CacheEntry::is_expired_at`].
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value().clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Looks up only the cached item.
    pub fn get_item(&self, key: &str) -> Option<T> {
        self.get(key).map(CacheEntry::into_item)
    }

    // == Set ==
    /// Inserts or overwrites an entry.
    ///
    /// Overwrites always succeed. A new key is rejected with
    /// [`CacheError::CapacityExceeded`] once the cache holds `limit` entries,
    /// leaving the cache unchanged.
    pub fn set(&self, key: impl Into<String>, value: impl Into<CacheValue<T>>) -> Result<()> {
        let entry = CacheEntry::stamp(value.into(), || self.policy.expiry_time());

        match self.entries.entry(key.into()) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                self.reserve_slot()?;
                vacant.insert(entry);
            }
        }
        Ok(())
    }

    fn reserve_slot(&self) -> Result<()> {
        let limit = self.limit;
        self.slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| match limit {
                Some(limit) if used >= limit => None,
                _ => Some(used + 1),
            })
            .map(|_| ())
            .map_err(|_| {
                self.stats.record_rejected();
                CacheError::CapacityExceeded {
                    limit: limit.unwrap_or_default(),
                }
            })
    }

    // == Delete ==
    /// Removes an entry; absent keys are ignored.
    pub fn delete(&self, key: &str) {
        // slot goes back while the shard is still locked
        self.entries.remove_if(key, |_, _| {
            self.slots.fetch_sub(1, Ordering::AcqRel);
            true
        });
    }

    // == Flush Expired ==
    /// Removes every entry that had expired as of the start of the call.
    ///
    /// Returns the number of entries removed.
    pub fn flush_expired(&self) -> usize {
        let now = self.policy.now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            let expired = entry.is_expired_at(now);
            if expired {
                removed += 1;
                self.slots.fetch_sub(1, Ordering::AcqRel);
            }
            !expired
        });

        self.stats.record_flushed(removed);
        removed
    }

    // == Refresh ==
    /// Runs every registered refresh callback once.
    ///
    /// Callbacks are invoked without holding any lock. A failure leaves the
    /// entry as it was; a success replaces item and expiry in one step and
    /// keeps the callback. Blocks until the slowest callback returns.
    pub fn refresh(&self) -> RefreshSummary {
        let refreshable: Vec<_> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let callback = entry.value().refresh.clone()?;
                Some((entry.key().clone(), callback))
            })
            .collect();

        let mut summary = RefreshSummary::default();
        for (key, callback) in refreshable {
            let item = match callback.call() {
                Ok(item) => item,
                Err(err) => {
                    debug!(
                        key = %key,
                        error = %err,
                        "refresh callback failed, keeping cached entry"
                    );
                    self.stats.record_refresh_failure();
                    summary.failed += 1;
                    continue;
                }
            };

            let replacement = CacheEntry {
                item,
                expires: self.policy.expiry_time(),
                refresh: Some(callback),
            };
            match self.entries.get_mut(&key) {
                Some(mut slot) => {
                    *slot = replacement;
                    self.stats.record_refresh();
                    summary.refreshed += 1;
                }
                None => summary.discarded += 1,
            }
        }
        summary
    }

    // == Introspection ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// The expiry policy entries are stamped with.
    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// True while a refresh worker is attached to this cache.
    pub fn is_worker_running(&self) -> bool {
        self.worker_running.load(Ordering::Acquire)
    }
}

impl<T> ConfigurationCache<T> for ConfigCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        ConfigCache::get(self, key)
    }

    fn set(&self, key: String, value: CacheValue<T>) -> Result<()> {
        ConfigCache::set(self, key, value)
    }

    fn delete(&self, key: &str) {
        ConfigCache::delete(self, key)
    }

    fn flush_expired(&self) -> usize {
        ConfigCache::flush_expired(self)
    }

    fn refresh(&self) -> RefreshSummary {
        ConfigCache::refresh(self)
    }
}

impl<T> std::fmt::Debug for ConfigCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigCache")
            .field("entries", &self.entries.len())
            .field("limit", &self.limit)
            .field("policy", &self.policy)
            .field("worker_running", &self.worker_running)
            .finish()
    }
}
