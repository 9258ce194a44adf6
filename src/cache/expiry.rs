//! Expiry Policy Module
//!
//! Computes expiry timestamps from a TTL and an injectable clock.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

// == Clock ==
/// Source of the current time.
///
/// The cache never reads the system time directly, so tests can move time
/// forward with [`ManualClock`] instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |m| {
                Some(m.saturating_add(delta))
            })
            .ok();
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::Acquire))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

// == Expiry Policy ==
/// Default TTL plus the clock it is measured against.
#[derive(Clone)]
pub struct ExpiryPolicy {
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl ExpiryPolicy {
    /// Creates a policy measured against the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a policy measured against `clock`.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Returns `now() + ttl`, saturating at the largest representable instant.
    pub fn expiry_time(&self) -> DateTime<Utc> {
        self.expiry_from(self.now())
    }

    pub(crate) fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// True once `now()` is strictly after `expires`.
    pub fn is_expired(&self, expires: DateTime<Utc>) -> bool {
        is_expired_at(expires, self.now())
    }
}

impl fmt::Debug for ExpiryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryPolicy")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Strict comparison: an entry expiring exactly at `now` is still fresh.
pub(crate) fn is_expired_at(expires: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires
}
