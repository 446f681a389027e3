//! Operation port - the user-supplied unit of work.

use async_trait::async_trait;

use crate::domain::Job;

/// One unit of work the executor attempts per job.
///
/// The engine treats the operation as a black box: it may succeed with a
/// value, fail with any error message, or overrun the per-attempt timeout
/// (which the executor enforces from the outside; implementations do not
/// need their own deadline handling).
///
/// One operation instance is shared by every in-flight job, so
/// implementations hold their own synchronization for any mutable state.
#[async_trait]
pub trait Operation: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, String>;
}
