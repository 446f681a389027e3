//! Circuit breaker guarding a downstream dependency.
//!
//! Three states:
//! - **Closed**: normal operation, attempts are allowed.
//! - **Open**: the dependency is judged unhealthy, attempts are rejected.
//! - **HalfOpen**: the cooldown elapsed, probe attempts are allowed.
//!
//! Transitions are evaluated lazily on access (no background timer): an Open
//! breaker moves to HalfOpen the first time `check_state` is called at or
//! after `opened_at + reset_timeout`. State is in-memory only and resets on
//! process restart; persistence is the broker's problem, not the engine's.
//!
//! One breaker instance protects one downstream dependency and is shared via
//! `Arc` by every executor that talks to it. All three operations take one
//! short mutex critical section with no await inside, so concurrent
//! success/failure/check calls serialize cleanly.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;
use crate::ports::{Clock, SystemClock};

/// Breaker state as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Immutable breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Validate and build: `failure_threshold >= 1`, `reset_timeout > 0`.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Result<Self, ConfigError> {
        if failure_threshold < 1 {
            return Err(ConfigError::FailureThreshold(failure_threshold));
        }
        if reset_timeout.is_zero() {
            return Err(ConfigError::ResetTimeout);
        }
        Ok(Self {
            failure_threshold,
            reset_timeout,
        })
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }
}

impl Default for CircuitBreakerConfig {
    /// 3 consecutive failures to trip, 5s cooldown.
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(5),
        }
    }
}

/// Mutable breaker fields, guarded as one unit.
///
/// Invariant: `opened_at.is_some()` iff `state == Open`.
#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Shared circuit breaker.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    config: CircuitBreakerConfig,
    clock: Box<dyn Clock>,
}

impl CircuitBreaker {
    /// Breaker on the system clock.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    /// Breaker with an injected clock (tests drive transitions without
    /// sleeping).
    pub fn with_clock(config: CircuitBreakerConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            config,
            clock,
        }
    }

    /// Lock the inner state, recovering from poison.
    ///
    /// Worst case after recovery is a slightly stale circuit, which beats
    /// panicking a worker.
    fn lock_inner(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Current state, advancing Open -> HalfOpen when the cooldown elapsed.
    ///
    /// An `Open` result is an immediate rejection: callers must not attempt
    /// the operation and must not record anything against the breaker.
    pub fn check_state(&self) -> BreakerState {
        let mut inner = self.lock_inner();

        if inner.state == BreakerState::Open
            && let Some(opened_at) = inner.opened_at
            && self.clock.now().duration_since(opened_at) >= self.config.reset_timeout
        {
            tracing::info!("circuit breaker cooldown elapsed, transitioning to half-open");
            inner.state = BreakerState::HalfOpen;
            inner.opened_at = None;
        }

        inner.state
    }

    /// Record a successful attempt: back to Closed, failure streak cleared.
    pub fn record_success(&self) {
        let mut inner = self.lock_inner();

        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => {
                if inner.state == BreakerState::HalfOpen {
                    tracing::info!("probe succeeded, closing circuit");
                }
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
            }
            BreakerState::Open => {
                // Straggler from before the trip; the cooldown stays in
                // charge of reopening traffic.
                tracing::debug!("success recorded while open, ignoring");
            }
        }
    }

    /// Record a failed attempt (operation error or timeout).
    pub fn record_failure(&self) {
        let mut inner = self.lock_inner();
        let now = self.clock.now();

        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::info!(
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening circuit"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                }
            }
            BreakerState::HalfOpen => {
                // Any probe failure is a fresh trip regardless of threshold.
                tracing::info!("probe failed, reopening circuit");
                inner.consecutive_failures += 1;
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
            }
            BreakerState::Open => {
                // Straggling attempt finishing after the trip: keep the
                // circuit open and restart the cooldown.
                inner.consecutive_failures += 1;
                inner.opened_at = Some(now);
            }
        }
    }

    /// Current failure streak (observability; not part of the decision API).
    pub fn consecutive_failures(&self) -> u32 {
        self.lock_inner().consecutive_failures
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock_inner();
        f.debug_struct("CircuitBreaker")
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;
    use rstest::rstest;
    use std::sync::Arc;

    fn breaker(threshold: u32, reset: Duration) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let cb = CircuitBreaker::with_clock(
            CircuitBreakerConfig::new(threshold, reset).unwrap(),
            Box::new(clock.clone()),
        );
        (cb, clock)
    }

    #[test]
    fn starts_closed() {
        let (cb, _clock) = breaker(3, Duration::from_secs(5));
        assert_eq!(cb.check_state(), BreakerState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[rstest]
    #[case::single(1)]
    #[case::typical(3)]
    #[case::high(7)]
    fn opens_after_exactly_threshold_failures(#[case] threshold: u32) {
        let (cb, _clock) = breaker(threshold, Duration::from_secs(5));

        for _ in 0..threshold - 1 {
            cb.record_failure();
            assert_eq!(cb.check_state(), BreakerState::Closed);
        }

        cb.record_failure();
        assert_eq!(cb.check_state(), BreakerState::Open);
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let (cb, _clock) = breaker(3, Duration::from_secs(5));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.consecutive_failures(), 2);

        cb.record_success();
        assert_eq!(cb.consecutive_failures(), 0);
        assert_eq!(cb.check_state(), BreakerState::Closed);

        // The streak restarts from zero, so two more failures do not trip.
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.check_state(), BreakerState::Closed);
    }

    #[test]
    fn open_stays_open_until_the_cooldown_elapses() {
        let reset = Duration::from_secs(5);
        let (cb, clock) = breaker(1, reset);

        cb.record_failure();
        assert_eq!(cb.check_state(), BreakerState::Open);

        clock.advance(reset - Duration::from_millis(1));
        assert_eq!(cb.check_state(), BreakerState::Open);

        clock.advance(Duration::from_millis(1));
        assert_eq!(cb.check_state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_failure_reopens_and_restamps_the_cooldown() {
        let reset = Duration::from_secs(5);
        let (cb, clock) = breaker(1, reset);

        cb.record_failure();
        clock.advance(reset);
        assert_eq!(cb.check_state(), BreakerState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.check_state(), BreakerState::Open);

        // The cooldown restarted at the probe failure: almost-a-full-reset
        // later it is still open, one more tick and it probes again.
        clock.advance(reset - Duration::from_millis(1));
        assert_eq!(cb.check_state(), BreakerState::Open);
        clock.advance(Duration::from_millis(1));
        assert_eq!(cb.check_state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_success_closes_and_clears_failures() {
        let reset = Duration::from_secs(5);
        let (cb, clock) = breaker(2, reset);

        cb.record_failure();
        cb.record_failure();
        clock.advance(reset);
        assert_eq!(cb.check_state(), BreakerState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.check_state(), BreakerState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn success_while_open_does_not_close_the_circuit() {
        let (cb, _clock) = breaker(1, Duration::from_secs(5));

        cb.record_failure();
        assert_eq!(cb.check_state(), BreakerState::Open);

        // A straggling attempt from before the trip finishes late.
        cb.record_success();
        assert_eq!(cb.check_state(), BreakerState::Open);
    }

    #[test]
    fn concurrent_records_do_not_corrupt_state() {
        let (cb, _clock) = breaker(5, Duration::from_secs(60));
        let cb = Arc::new(cb);

        let mut handles = Vec::new();
        for worker in 0..8 {
            let cb = Arc::clone(&cb);
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    if (worker + i) % 3 == 0 {
                        cb.record_success();
                    } else {
                        cb.record_failure();
                    }
                    let _ = cb.check_state();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // No poisoned lock, and the observed state is one of the three
        // legal values with a coherent failure count.
        let state = cb.check_state();
        assert!(matches!(
            state,
            BreakerState::Closed | BreakerState::Open | BreakerState::HalfOpen
        ));
        let _ = cb.consecutive_failures();
    }
}
