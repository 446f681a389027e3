//! In-memory dead-letter sink for development and tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EngineError, Job};
use crate::ports::DeadLetterSink;

/// One dead-lettered job with its routing reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Dead-letter sink that just records entries, inspectable from tests.
#[derive(Debug, Default)]
pub struct InMemorySink {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries recorded so far.
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().expect("sink lock").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("sink lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterSink for InMemorySink {
    async fn dead_letter(&self, job: Job, reason: String) -> Result<(), EngineError> {
        let mut entries = self.entries.lock().map_err(|_| {
            EngineError::SinkUnavailable("sink state poisoned".to_string())
        })?;
        entries.push(DeadLetterEntry {
            job,
            reason,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_job_and_reason() {
        let sink = InMemorySink::new();
        let job = Job::new(serde_json::json!({"n": 1}));
        let id = job.job_id();

        sink.dead_letter(job, "exhausted after 3 attempt(s)".to_string())
            .await
            .unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].job.job_id(), id);
        assert!(entries[0].reason.contains("exhausted"));
    }

    #[tokio::test]
    async fn entries_accumulate_in_order_of_recording() {
        let sink = InMemorySink::new();
        for i in 0..3 {
            sink.dead_letter(Job::new(serde_json::json!(i)), format!("reason {i}"))
                .await
                .unwrap();
        }

        let reasons: Vec<_> = sink.entries().into_iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec!["reason 0", "reason 1", "reason 2"]);
    }
}
