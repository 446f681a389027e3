//! RetryExecutor - drives one job through its attempt budget.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::timeout;

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::domain::{AttemptFailure, Job, RunOutcome};
use crate::policy::{BackoffPolicy, RetryPolicy};
use crate::ports::Operation;

/// Runs a job through up to `max_attempts` attempts, each bounded by the
/// per-attempt timeout, consulting the shared circuit breaker once at
/// dispatch and recording every attempt's result against it.
///
/// Per-invocation state only: one `run` call owns its attempt counter and
/// nothing survives between jobs. The breaker is the only shared state, via
/// `Arc`.
pub struct RetryExecutor {
    policy: RetryPolicy,
    backoff: BackoffPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        let backoff = policy.backoff();
        Self {
            policy,
            backoff,
            breaker,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run one job to a terminal outcome, without external cancellation.
    pub async fn run(&self, job: &Job, operation: &dyn Operation) -> RunOutcome {
        // Keep the sender alive for the whole run; a dropped sender reads as
        // a shutdown signal in run_with_signal.
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.run_with_signal(job, operation, &mut shutdown_rx).await
    }

    /// Run one job, aborting pending retries when `shutdown` fires.
    ///
    /// Drain policy: the attempt in progress always finishes; a signal
    /// observed between attempts (or during the backoff sleep) stops
    /// retrying and returns `Exhausted` with the last error, so the caller
    /// dead-letters the job instead of leaving it half-done. A dropped
    /// sender counts as a signal.
    pub async fn run_with_signal(
        &self,
        job: &Job,
        operation: &dyn Operation,
        shutdown: &mut watch::Receiver<bool>,
    ) -> RunOutcome {
        // Circuit open at dispatch: immediate rejection. No attempt, no
        // delay, nothing recorded against breaker or budget.
        if self.breaker.check_state() == BreakerState::Open {
            tracing::debug!(job_id = %job.job_id(), "circuit open, rejecting job");
            return RunOutcome::Rejected;
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let failure = match timeout(
                self.policy.per_attempt_timeout(),
                operation.execute(job),
            )
            .await
            {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    tracing::debug!(job_id = %job.job_id(), attempt = attempts, "attempt succeeded");
                    return RunOutcome::Success(value);
                }
                Ok(Err(message)) => AttemptFailure::Operation(message),
                Err(_elapsed) => AttemptFailure::TimedOut(self.policy.per_attempt_timeout()),
            };

            // Timeouts and operation errors are the same kind of failure.
            self.breaker.record_failure();
            tracing::debug!(
                job_id = %job.job_id(),
                attempt = attempts,
                error = %failure,
                "attempt failed"
            );

            if attempts >= self.policy.max_attempts() {
                return RunOutcome::Exhausted {
                    attempts,
                    last_error: failure,
                };
            }

            if *shutdown.borrow() {
                tracing::debug!(job_id = %job.job_id(), "shutdown signaled, aborting retries");
                return RunOutcome::Exhausted {
                    attempts,
                    last_error: failure,
                };
            }

            // Backoff indices are zero-based from the first retry.
            let delay = self.backoff.delay(attempts - 1);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    tracing::debug!(job_id = %job.job_id(), "shutdown during backoff, aborting retries");
                    return RunOutcome::Exhausted {
                        attempts,
                        last_error: failure,
                    };
                }
            }
        }
    }
}
