//! DeadLetterSink port - terminal routing for failed jobs.

use async_trait::async_trait;

use crate::domain::{EngineError, Job};

/// Destination for jobs that could not be completed within their retry
/// budget (or were rejected while the circuit was open, depending on
/// policy).
///
/// Delivery is best-effort: `Err(SinkUnavailable)` means the emission itself
/// could not be recorded. The pool logs such failures and keeps running; a
/// broken sink must not take the whole engine down.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Hand the job over for offline inspection/reprocessing.
    ///
    /// `reason` is a human-readable summary of why the job is terminal
    /// (last error, attempt count, "circuit open", ...).
    async fn dead_letter(&self, job: Job, reason: String) -> Result<(), EngineError>;
}
