//! Outcome model: the result shapes of one job run.
//!
//! This module is transport-agnostic: it does not assume queues, pools, or
//! any particular operation. It only defines the "shape" of what a run can
//! produce so callers can route the job afterwards.

use std::time::Duration;

use thiserror::Error;

/// Why a single attempt failed.
///
/// A timeout is deliberately the same kind of thing as an operation error:
/// both count against the retry budget and the circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    /// The operation itself reported an error.
    #[error("operation failed: {0}")]
    Operation(String),

    /// The attempt exceeded the per-attempt timeout.
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
}

/// Terminal result of running one job through the retry executor.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// An attempt succeeded; the value is whatever the operation returned.
    Success(serde_json::Value),

    /// All allowed attempts were consumed (or retries were aborted by
    /// shutdown). The final attempt's error is preserved for dead-lettering.
    Exhausted {
        attempts: u32,
        last_error: AttemptFailure,
    },

    /// The circuit breaker was open at dispatch time; no attempt was made and
    /// nothing was recorded against the breaker or the retry budget.
    Rejected,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, RunOutcome::Rejected)
    }
}
