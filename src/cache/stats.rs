//! Cache Statistics Module
//!
//! Tracks lookups, refresh outcomes, flushes and capacity rejections.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups for absent keys
    pub misses: u64,
    /// Entries replaced by a successful refresh callback
    pub refreshes: u64,
    /// Refresh callbacks that returned an error
    pub refresh_failures: u64,
    /// Entries removed by expired-entry flushes
    pub flushed: u64,
    /// Inserts rejected because the cache was full
    pub rejected: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by every caller of one cache.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    flushed: AtomicU64,
    rejected: AtomicU64,
}

impl StatsRecorder {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flushed(&self, count: usize) {
        self.flushed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_no_lookups() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let recorder = StatsRecorder::default();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();

        let stats = recorder.snapshot(3);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.total_entries, 3);
    }

    #[test]
    fn test_snapshot_counts() {
        let recorder = StatsRecorder::default();
        recorder.record_refresh();
        recorder.record_refresh_failure();
        recorder.record_refresh_failure();
        recorder.record_flushed(4);
        recorder.record_rejected();

        let stats = recorder.snapshot(0);
        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.refresh_failures, 2);
        assert_eq!(stats.flushed, 4);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = CacheStats {
            hits: 2,
            misses: 1,
            total_entries: 2,
            ..Default::default()
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hits"], 2);
        assert_eq!(json["misses"], 1);
        assert_eq!(json["refresh_failures"], 0);
        assert_eq!(json["total_entries"], 2);
    }
}
