//! Circuit breaker guarding the cache's own internal operations

use crate::cache::clock::to_chrono;
use crate::cache::types::CircuitState;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// Three-state breaker driven by consecutive internal failures
///
/// `Closed` → `Open` once `threshold` consecutive failures are recorded,
/// `Open` → `HalfOpen` when an operation arrives after `reset_timeout`,
/// `HalfOpen` → `Closed` on the next success. A failure while half-open
/// re-opens the breaker immediately.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    enabled: bool,
    threshold: u32,
    reset_timeout: Duration,
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(enabled: bool, threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            enabled,
            threshold: threshold.max(1),
            reset_timeout,
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Ask whether an operation may run at `now`
    ///
    /// Moves an expired `Open` breaker to `HalfOpen` so the caller's
    /// operation becomes the probe.
    pub fn allow(&mut self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }

        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let reopen_at = self
                    .opened_at
                    .map(|opened| opened + to_chrono(self.reset_timeout));
                match reopen_at {
                    Some(at) if now < at => false,
                    _ => {
                        info!("Cache circuit breaker half-open, probing next operation");
                        self.state = CircuitState::HalfOpen;
                        true
                    }
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state == CircuitState::HalfOpen {
            info!("Cache circuit breaker closed after successful probe");
        }
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        if !self.enabled {
            return;
        }

        self.failure_count = self.failure_count.saturating_add(1);

        let should_open = match self.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => self.failure_count >= self.threshold,
            CircuitState::Open => false,
        };

        if should_open {
            warn!(
                "Cache circuit breaker opened after {} consecutive failures",
                self.failure_count
            );
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(true, 3, Duration::from_secs(60))
    }

    #[test]
    fn test_opens_at_threshold() {
        let now = Utc::now();
        let mut cb = breaker();

        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow(now + ChronoDuration::seconds(59)));
    }

    #[test]
    fn test_success_resets_consecutive_count() {
        let now = Utc::now();
        let mut cb = breaker();

        cb.record_failure(now);
        cb.record_failure(now);
        cb.record_success();
        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 1);
    }

    #[test]
    fn test_half_open_then_closed() {
        let now = Utc::now();
        let mut cb = breaker();
        for _ in 0..3 {
            cb.record_failure(now);
        }

        let later = now + ChronoDuration::seconds(60);
        assert!(cb.allow(later));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let now = Utc::now();
        let mut cb = breaker();
        for _ in 0..3 {
            cb.record_failure(now);
        }

        let later = now + ChronoDuration::seconds(61);
        assert!(cb.allow(later));
        cb.record_failure(later);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow(later + ChronoDuration::seconds(1)));
    }

    #[test]
    fn test_disabled_never_opens() {
        let now = Utc::now();
        let mut cb = CircuitBreaker::new(false, 1, Duration::from_secs(60));
        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow(now));
    }
}
