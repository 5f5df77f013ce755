//! Timestamps and the injectable clock.
//!
//! Business logic never reads the system clock. Every operation that depends
//! on time receives `now` explicitly; the tick driver obtains it from a
//! [`Clock`], and tests use [`ManualClock`] to place completions and
//! arrivals exactly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since an arbitrary epoch (the Unix epoch for [`SystemClock`]).
pub type Timestamp = u64;

/// Milliseconds in one second.
pub const MILLIS_PER_SECOND: u64 = 1_000;

/// Seconds in one hour. Speeds and production rates are expressed per hour.
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Convert whole seconds to a millisecond duration.
#[inline]
pub fn secs_to_millis(secs: u64) -> u64 {
    secs.saturating_mul(MILLIS_PER_SECOND)
}

/// Timestamp `secs` seconds after `start`.
#[inline]
pub fn after_secs(start: Timestamp, secs: u64) -> Timestamp {
    start.saturating_add(secs_to_millis(secs))
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.now.fetch_add(secs_to_millis(secs), Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_secs_adds_millis() {
        assert_eq!(after_secs(500, 2), 2_500);
    }

    #[test]
    fn after_secs_saturates() {
        assert_eq!(after_secs(u64::MAX - 1, 10), u64::MAX);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance_secs(3);
        assert_eq!(clock.now(), 4_000);
        clock.advance_millis(5);
        assert_eq!(clock.now(), 4_005);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn system_clock_is_past_2020() {
        // 2020-01-01 in millis.
        assert!(SystemClock.now() > 1_577_836_800_000);
    }
}
