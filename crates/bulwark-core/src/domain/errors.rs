//! Engine error types.
//!
//! Two families, kept apart on purpose:
//! - [`EngineError`]: infrastructure faults at the collaborator boundary
//!   (source/sink). These mean the pool itself cannot make progress and must
//!   surface to the caller instead of being retried per-job.
//! - [`ConfigError`]: invalid construction parameters, reported fail-fast.
//!
//! Per-attempt failures are not errors at this level; they are part of the
//! run outcome (see [`AttemptFailure`](super::outcome::AttemptFailure)).

use thiserror::Error;

/// Collaborator-boundary failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The message source is closed or broken; the receive loop cannot
    /// continue.
    #[error("message source unavailable: {0}")]
    SourceUnavailable(String),

    /// Dead-letter delivery could not be recorded. Callers log and continue
    /// rather than crash the pool.
    #[error("dead letter sink unavailable: {0}")]
    SinkUnavailable(String),
}

/// Invalid configuration, caught at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_attempts must be >= 1 (got {0})")]
    MaxAttempts(u32),

    #[error("per_attempt_timeout must be > 0")]
    PerAttemptTimeout,

    #[error("failure_threshold must be >= 1 (got {0})")]
    FailureThreshold(u32),

    #[error("reset_timeout must be > 0")]
    ResetTimeout,

    #[error("concurrency must be >= 1 (got {0})")]
    Concurrency(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_name_the_broken_collaborator() {
        let e = EngineError::SourceUnavailable("channel closed".to_string());
        assert!(e.to_string().contains("source"));

        let e = EngineError::SinkUnavailable("broker down".to_string());
        assert!(e.to_string().contains("sink"));
    }

    #[test]
    fn config_errors_carry_the_bad_value() {
        assert!(ConfigError::MaxAttempts(0).to_string().contains("got 0"));
        assert!(ConfigError::Concurrency(0).to_string().contains("got 0"));
    }
}
