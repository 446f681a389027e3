//! Job: the opaque unit of work flowing through the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;

/// An opaque payload plus the identity used for acknowledgement and
/// dead-lettering.
///
/// Ownership model:
/// - the [`MessageSource`](crate::ports::MessageSource) owns the job until it
///   is received;
/// - the pool hands it to exactly one executor at a time;
/// - on success the job is dropped (ack), on permanent failure ownership
///   transfers to the [`DeadLetterSink`](crate::ports::DeadLetterSink).
///
/// The engine never looks inside `payload`; only the user-supplied
/// [`Operation`](crate::ports::Operation) interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    job_id: JobId,
    payload: serde_json::Value,
    enqueued_at: DateTime<Utc>,
}

impl Job {
    /// Wrap a payload into a new job with a fresh identity.
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            job_id: JobId::new(),
            payload,
            enqueued_at: Utc::now(),
        }
    }

    /// Build a job with a caller-chosen identity (redelivery, tests).
    pub fn with_id(job_id: JobId, payload: serde_json::Value) -> Self {
        Self {
            job_id,
            payload,
            enqueued_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}
