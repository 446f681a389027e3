//! MessageSource port - where jobs come from.

use async_trait::async_trait;

use crate::domain::{EngineError, Job};

/// Abstract queue the pool pulls from.
///
/// Design intent:
/// - `receive` is a suspending pull; it resolves only when a job is
///   available. `Err(SourceUnavailable)` means the underlying channel is
///   closed or broken and the pool cannot make progress.
/// - `requeue` hands a job back to the source. The pool uses it for
///   circuit-open rejections under
///   [`RejectionPolicy::Requeue`](crate::app::RejectionPolicy); delivery
///   pacing (redelivery delay, ordering) is the source's concern, not the
///   pool's.
///
/// No ack method: receiving transfers ownership of the job to the caller, so
/// a successful job is acknowledged by dropping it.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next job.
    async fn receive(&self) -> Result<Job, EngineError>;

    /// Return a job to the source for later redelivery.
    async fn requeue(&self, job: Job) -> Result<(), EngineError>;
}
