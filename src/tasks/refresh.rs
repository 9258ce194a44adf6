//! Refresh Worker
//!
//! Background task that periodically re-fetches every refreshable entry.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{current_runtime, StopSignal};
use crate::cache::ConfigCache;
use crate::error::{CacheError, Result};

/// Spawns the refresh worker for `cache`.
///
/// The first cycle runs one `interval` after start. Each cycle calls
/// [`ConfigCache::refresh`] on tokio's blocking pool and is awaited before
/// the next tick, so cycles never overlap; ticks missed by a slow cycle are
/// skipped. The worker exits once `stop` is observed between cycles, after
/// which the cache may be started again.
///
/// # Errors
/// - [`CacheError::InvalidInterval`] if `interval` is zero
/// - [`CacheError::NoRuntime`] if called outside a tokio runtime
/// - [`CacheError::AlreadyRunning`] if a worker is already attached; the
///   running worker is unaffected
pub fn spawn_refresh_worker<T>(
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

    if cache
        .worker_running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(CacheError::AlreadyRunning);
    }
    // Shared with every in-flight cycle, so the flag clears only once the
    // task and its last blocking refresh are both gone.
    let guard = Arc::new(WorkerGuard { cache });

    Ok(runtime.spawn(async move {
        info!(
            "Starting refresh worker with interval of {} ms",
            interval.as_millis()
        );

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = ticker.tick() => run_cycle(&guard).await,
            }
        }

        info!("Refresh worker stopped");
    }))
}

impl<T> ConfigCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts the background refresh worker for this cache.
    ///
    /// See [`spawn_refresh_worker`].
    pub fn start_refresh_worker(
        self: &Arc<Self>,
        interval: Duration,
        stop: StopSignal,
    ) -> Result<JoinHandle<()>> {
        spawn_refresh_worker(Arc::clone(self), interval, stop)
    }
}

async fn run_cycle<T>(guard: &Arc<WorkerGuard<T>>)
where
    T: Clone + Send + Sync + 'static,
{
    let guard = Arc::clone(guard);
    match task::spawn_blocking(move || guard.cache.refresh()).await {
        Ok(summary) => debug!(
            refreshed = summary.refreshed,
            failed = summary.failed,
            discarded = summary.discarded,
            "Refresh cycle complete"
        ),
        Err(err) => warn!(error = %err, "Refresh cycle did not complete"),
    }
}

/// Returns the cache to the stopped state once the worker and any cycle it
/// started have gone away.
struct WorkerGuard<T> {
    cache: Arc<ConfigCache<T>>,
}

impl<T> Drop for WorkerGuard<T> {
    fn drop(&mut self) {
        self.cache.worker_running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use anyhow::anyhow;
    use tokio_test::{assert_err, assert_ok};

    use crate::cache::CacheValue;
    use crate::tasks::stop_channel;

    fn shared_cache() -> Arc<ConfigCache<usize>> {
        Arc::new(ConfigCache::new(Duration::from_secs(60), None))
    }

    fn counting_cache() -> (Arc<ConfigCache<usize>>, Arc<AtomicUsize>) {
        let cache = shared_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = CacheValue::new(0).refresh_with(move || {
            let calls = counter.fetch_add(1, Ordering::SeqCst);
            Ok(calls + 1)
        });
        cache.set("test", value).unwrap();
        (cache, calls)
    }

    #[tokio::test]
    async fn test_worker_refreshes_entries() {
        let (cache, calls) = counting_cache();
        let (stop, signal) = stop_channel();

        let interval = Duration::from_millis(5);
        let handle = assert_ok!(cache.start_refresh_worker(interval, signal));
        time::sleep(Duration::from_millis(100)).await;

        assert!(calls.load(Ordering::SeqCst) > 0, "callback should have run");
        assert!(cache.get_item("test").unwrap() > 0);

        stop.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_second_start_fails_while_running() {
        let (cache, calls) = counting_cache();
        let (stop, signal) = stop_channel();
        let interval = Duration::from_millis(1);
        let handle = assert_ok!(cache.start_refresh_worker(interval, signal.clone()));
        let second = cache.start_refresh_worker(interval, signal);
        assert_eq!(assert_err!(second), CacheError::AlreadyRunning);
        assert!(cache.is_worker_running());

        // the original worker keeps ticking
        time::sleep(Duration::from_millis(50)).await;
        assert!(calls.load(Ordering::SeqCst) > 0);

        stop.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_halts_ticks() {
        let (cache, calls) = counting_cache();
        let (stop, signal) = stop_channel();

        let interval = Duration::from_millis(1);
        let handle = cache.start_refresh_worker(interval, signal).unwrap();
        time::sleep(Duration::from_millis(20)).await;

        stop.stop();
        handle.await.unwrap();
        assert!(!cache.is_worker_running());

        let after_stop = calls.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (cache, _calls) = counting_cache();
        let interval = Duration::from_millis(1);

        let (stop, signal) = stop_channel();
        let handle = cache.start_refresh_worker(interval, signal).unwrap();
        stop.stop();
        handle.await.unwrap();

        let (stop, signal) = stop_channel();
        let handle = assert_ok!(cache.start_refresh_worker(interval, signal));
        assert!(cache.is_worker_running());
        stop.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_already_stopped_signal_exits_without_refreshing() {
        let (cache, calls) = counting_cache();
        let (stop, signal) = stop_channel();
        stop.stop();

        let interval = Duration::from_millis(1);
        let handle = cache.start_refresh_worker(interval, signal).unwrap();
        handle.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!cache.is_worker_running());
    }

    #[tokio::test]
    async fn test_aborted_worker_releases_flag() {
        let (cache, _calls) = counting_cache();
        let (_stop, signal) = stop_channel();

        let interval = Duration::from_secs(3600);
        let handle = cache.start_refresh_worker(interval, signal).unwrap();
        handle.abort();
        let _ = handle.await;

        assert!(!cache.is_worker_running());
    }

    #[tokio::test]
    async fn test_abort_mid_cycle_keeps_worker_claimed() {
        let cache = shared_cache();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (active, highest) = (in_flight.clone(), peak.clone());
        let value = CacheValue::new(0).refresh_with(move || {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            highest.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(now)
        });
        cache.set("slow", value).unwrap();

        let interval = Duration::from_millis(5);
        let (_stop, signal) = stop_channel();
        let handle = cache.start_refresh_worker(interval, signal.clone()).unwrap();

        // abort while the first cycle is still blocked in the callback
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);
        handle.abort();
        let _ = handle.await;

        let second = cache.start_refresh_worker(interval, signal);
        assert_eq!(assert_err!(second), CacheError::AlreadyRunning);
        assert!(cache.is_worker_running());

        // the orphaned cycle drains and releases the cache
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert!(!cache.is_worker_running());

        let (stop, signal) = stop_channel();
        let handle = assert_ok!(cache.start_refresh_worker(interval, signal));
        time::sleep(Duration::from_millis(100)).await;
        stop.stop();
        handle.await.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1, "refresh cycles overlapped");
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (cache, _calls) = counting_cache();
        let (_stop, signal) = stop_channel();

        let result = cache.start_refresh_worker(Duration::ZERO, signal);
        assert_eq!(assert_err!(result), CacheError::InvalidInterval);
        assert!(!cache.is_worker_running());
    }

    #[test]
    fn test_start_outside_runtime() {
        let (cache, _calls) = counting_cache();
        let (_stop, signal) = stop_channel();

        let result = cache.start_refresh_worker(Duration::from_millis(1), signal);
        assert_eq!(assert_err!(result), CacheError::NoRuntime);
        assert!(!cache.is_worker_running());
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_kill_worker() {
        let cache = shared_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = CacheValue::new(0usize).refresh_with(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first fetch blows up");
            }
            Err(anyhow!("backend unavailable"))
        });
        cache.set("flaky", value).unwrap();
        let (stop, signal) = stop_channel();

        let interval = Duration::from_millis(2);
        let handle = cache.start_refresh_worker(interval, signal).unwrap();
        time::sleep(Duration::from_millis(100)).await;

        assert!(
            calls.load(Ordering::SeqCst) > 1,
            "worker kept ticking after a panic"
        );
        assert_eq!(cache.get_item("flaky"), Some(0));

        stop.stop();
        handle.await.unwrap();
    }
}
