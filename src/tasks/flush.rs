//! Expired-Entry Flush Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::{current_runtime, StopSignal};
use crate::cache::ConfigCache;
use crate::error::{CacheError, Result};

/// Spawns a background task that periodically flushes expired cache entries.
///
/// Unlike the refresh worker, any number of flush tasks may run against one
/// cache; flushing is idempotent.
///
/// # Arguments
/// * `cache` - Shared reference to the cache
/// * `interval` - Time between flushes
/// * `stop` - Signal that ends the task between flushes
///
/// # Example
/// ```ignore
/// let cache = Arc::new(ConfigCache::<String>::with_defaults());
/// let (stop, signal) = stop_channel();
/// let handle = spawn_flush_task(cache.clone(), Duration::from_secs(60), signal)?;
/// // Later, during shutdown:
/// stop.stop();
/// handle.await?;
/// ```
pub fn spawn_flush_task<T>(
    cache: Arc<ConfigCache<T>>,
    interval: Duration,
    mut stop: StopSignal,
) -> Result<JoinHandle<()>>
where
    T: Clone + Send + Sync + 'static,
{
    if interval.is_zero() {
        return Err(CacheError::InvalidInterval);
    }
    let runtime = current_runtime()?;

    Ok(runtime.spawn(async move {
        info!(
            "Starting flush task with interval of {} ms",
            interval.as_millis()
        );

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = ticker.tick() => {
                    let removed = cache.flush_expired();
                    if removed > 0 {
                        info!("TTL flush: removed {} expired entries", removed);
                    } else {
                        debug!("TTL flush: no expired entries found");
                    }
                }
            }
        }

        info!("Flush task stopped");
    }))
}
