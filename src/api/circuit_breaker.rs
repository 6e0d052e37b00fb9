// src/api/circuit_breaker.rs
//! Circuit breaker guarding the wiki backend.
//!
//! After `threshold` consecutive transient failures the breaker opens and every
//! call fails fast with [`AppError::CircuitOpen`] until the cooldown elapses.
//! The first call after the cooldown is a trial: success closes the breaker,
//! failure re-opens it for another cooldown.

use crate::constants::{BREAKER_COOLDOWN, BREAKER_FAILURE_THRESHOLD};
use crate::error::AppError;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BREAKER_FAILURE_THRESHOLD, BREAKER_COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerInner {
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock();
        match inner.opened_at {
            None => BreakerState::Closed,
            Some(at) if at.elapsed() >= self.cooldown => BreakerState::HalfOpen,
            Some(_) => BreakerState::Open,
        }
    }

    /// Admits a call, or fails fast while the breaker is open.
    pub fn try_acquire(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock();
        let Some(opened_at) = inner.opened_at else {
            return Ok(());
        };

        let elapsed = opened_at.elapsed();
        if elapsed < self.cooldown {
            return Err(AppError::CircuitOpen {
                retry_in: self.cooldown - elapsed,
            });
        }

        // Half-open: one trial call at a time
        if inner.trial_in_flight {
            return Err(AppError::CircuitOpen {
                retry_in: Duration::ZERO,
            });
        }
        inner.trial_in_flight = true;
        log::info!("Circuit breaker half-open, letting a trial request through");
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.opened_at.is_some() {
            log::info!("Circuit breaker closed, backend recovered");
        }
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    /// Gives back an admitted call that never produced an outcome.
    ///
    /// A half-open breaker stays half-open so the next call can run the trial.
    pub fn release(&self) {
        self.inner.lock().trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;

        let trial_failed = inner.trial_in_flight;
        inner.trial_in_flight = false;

        if trial_failed || inner.consecutive_failures >= self.threshold {
            if inner.opened_at.is_none() || trial_failed {
                log::warn!(
                    "Circuit breaker opened after {} consecutive failures; pausing requests for {:?}",
                    inner.consecutive_failures,
                    self.cooldown
                );
            }
            inner.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(matches!(
            breaker.try_acquire(),
            Err(AppError::CircuitOpen { .. })
        ));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_trial() {
        let breaker = CircuitBreaker::new(1, Duration::ZERO);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        // Only one trial at a time
        assert!(breaker.try_acquire().is_ok());
        assert!(breaker.try_acquire().is_err());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_abandoned_trial_frees_the_slot() {
        let breaker = CircuitBreaker::new(1, Duration::ZERO);
        breaker.record_failure();

        assert!(breaker.try_acquire().is_ok());
        breaker.release();

        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_failed_trial_reopens() {
        let breaker = CircuitBreaker::new(5, Duration::from_millis(0));
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.try_acquire().is_ok());
        breaker.record_failure();
        assert!(!breaker.inner.lock().trial_in_flight);
        assert!(breaker.inner.lock().opened_at.is_some());
    }
}
