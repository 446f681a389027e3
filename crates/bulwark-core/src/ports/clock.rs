//! Clock port - monotonic time abstraction.
//!
//! The circuit breaker decides Open -> HalfOpen transitions by comparing
//! elapsed time against its cooldown. Injecting the clock lets tests drive
//! those transitions without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Provider of monotonic "now".
///
/// Implementations must be monotonic: the breaker's bookkeeping assumes time
/// never goes backwards between calls.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
///
/// Cloning shares the underlying instant, so the clock handed to a breaker
/// can be advanced from the test body.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("manual clock lock");
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("manual clock lock")
    }
}
