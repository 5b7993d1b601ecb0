//! Time source for the cache
//!
//! Expiry, the circuit breaker and eviction-storm damping all read time
//! through [`Clock`] so tests can drive them without sleeping.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests and simulations
///
/// Cloning shares the underlying offset, so a clone handed to a cache can be
/// advanced from the test body.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: DateTime<Utc>,
    offset_ms: Arc<AtomicI64>,
}

impl ManualClock {
    /// Start at the current wall-clock time
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Start at a fixed instant
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            offset_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + ChronoDuration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Milliseconds elapsed from `earlier` to `later`, clamped at zero
pub(crate) fn millis_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    u64::try_from((later - earlier).num_milliseconds()).unwrap_or(0)
}

/// Longest duration the cache works with; larger TTLs are clamped to it
const MAX_SPAN_DAYS: i64 = 365 * 100;

/// Convert a std duration to chrono, clamped so timestamp arithmetic cannot overflow
pub(crate) fn to_chrono(duration: Duration) -> ChronoDuration {
    let max = ChronoDuration::days(MAX_SPAN_DAYS);
    ChronoDuration::from_std(duration)
        .map(|d| d.min(max))
        .unwrap_or(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(90));
        assert_eq!(millis_between(start, clock.now()), 90_000);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_millis(250));
        assert_eq!(millis_between(start, clock.now()), 250);
    }

    #[test]
    fn test_millis_between_clamps_negative() {
        let now = Utc::now();
        let earlier = now - ChronoDuration::seconds(5);
        assert_eq!(millis_between(now, earlier), 0);
    }

    #[test]
    fn test_to_chrono_clamps_huge_durations() {
        let clamped = to_chrono(Duration::from_secs(u64::MAX));
        assert_eq!(clamped, ChronoDuration::days(MAX_SPAN_DAYS));
        assert!(Utc::now().checked_add_signed(clamped).is_some());
    }
}
