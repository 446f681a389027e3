//! In-memory message source for development and tests.

use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{EngineError, Job};
use crate::ports::MessageSource;

/// Scheduled redelivery entry for the priority queue.
///
/// Ordering is reversed so the `BinaryHeap` acts as a min-heap (earliest
/// `ready_at` first). Only the timestamp participates in ordering; the job
/// payload is cargo.
#[derive(Debug)]
struct ScheduledJob {
    ready_at: Instant,
    job: Job,
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at
    }
}

impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering: earlier times have higher priority.
        other.ready_at.cmp(&self.ready_at)
    }
}

/// In-memory source state.
struct SourceState {
    /// Jobs deliverable right now.
    ready: VecDeque<Job>,

    /// Requeued jobs waiting out their redelivery delay.
    scheduled: BinaryHeap<ScheduledJob>,

    /// Once closed, pushes fail and receive drains the remainder before
    /// reporting the source unavailable.
    closed: bool,
}

impl SourceState {
    /// Move scheduled jobs to ready if their time has come.
    fn promote_scheduled(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.ready_at > now {
                break; // heap is sorted, nothing later is due either
            }
            let entry = self.scheduled.pop().expect("peeked entry exists");
            self.ready.push_back(entry.job);
        }
    }
}

/// In-memory queue implementing [`MessageSource`].
///
/// Mirrors the receive side of a broker:
/// - `push` is the producer API (a test or a demo feeding the pool)
/// - `receive` suspends until a job is ready
/// - `requeue` returns a job for redelivery, after the configured delay, so
///   circuit-open bounces do not spin hot
/// - `close` ends the stream: remaining jobs drain, then receive fails with
///   `SourceUnavailable`
pub struct InMemorySource {
    state: Mutex<SourceState>,
    notify: Arc<Notify>,
    redelivery_delay: Duration,
}

impl InMemorySource {
    /// Source with immediate redelivery on requeue.
    pub fn new() -> Self {
        Self::with_redelivery_delay(Duration::ZERO)
    }

    /// Source that holds requeued jobs back for `delay` before offering them
    /// again.
    pub fn with_redelivery_delay(delay: Duration) -> Self {
        Self {
            state: Mutex::new(SourceState {
                ready: VecDeque::new(),
                scheduled: BinaryHeap::new(),
                closed: false,
            }),
            notify: Arc::new(Notify::new()),
            redelivery_delay: delay,
        }
    }

    /// Enqueue a job for delivery.
    pub async fn push(&self, job: Job) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(EngineError::SourceUnavailable(
                    "source is closed".to_string(),
                ));
            }
            state.ready.push_back(job);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Close the source. Jobs already queued are still delivered; after the
    /// drain, `receive` reports `SourceUnavailable`.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            state.closed = true;
        }
        // Wake every parked receiver, and store one permit for a receiver
        // racing between its closed-check and its wait registration.
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Jobs currently held (ready + scheduled).
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.scheduled.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn receive(&self) -> Result<Job, EngineError> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled();

                if let Some(job) = state.ready.pop_front() {
                    return Ok(job);
                }

                if state.closed && state.scheduled.is_empty() {
                    // Cascade the wakeup so sibling receivers observe the
                    // closure too.
                    self.notify.notify_one();
                    return Err(EngineError::SourceUnavailable(
                        "source is closed and drained".to_string(),
                    ));
                }

                state.scheduled.peek().map(|entry| entry.ready_at)
            };

            // Wait for a push/requeue/close notification, or for the next
            // scheduled job to come due.
            if let Some(wake_at) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = tokio::time::sleep_until(wake_at.into()) => {}
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn requeue(&self, job: Job) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(EngineError::SourceUnavailable(
                    "source is closed".to_string(),
                ));
            }
            if self.redelivery_delay.is_zero() {
                state.ready.push_back(job);
            } else {
                state.scheduled.push(ScheduledJob {
                    ready_at: Instant::now() + self.redelivery_delay,
                    job,
                });
            }
        }
        self.notify.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_receive_roundtrip() {
        let source = InMemorySource::new();
        let job = Job::new(serde_json::json!({"n": 1}));
        let id = job.job_id();

        source.push(job).await.unwrap();
        let received = source.receive().await.unwrap();

        assert_eq!(received.job_id(), id);
        assert!(source.is_empty().await);
    }

    #[tokio::test]
    async fn receive_waits_until_a_push_arrives() {
        let source = Arc::new(InMemorySource::new());
        let job = Job::new(serde_json::json!("late"));
        let id = job.job_id();

        let receiver = tokio::spawn({
            let source = Arc::clone(&source);
            async move { source.receive().await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        source.push(job).await.unwrap();

        let received = receiver.await.unwrap();
        assert_eq!(received.job_id(), id);
    }

    #[tokio::test]
    async fn closed_source_drains_then_errors() {
        let source = InMemorySource::new();
        source.push(Job::new(serde_json::json!(1))).await.unwrap();
        source.close().await;

        // The queued job still comes out.
        assert!(source.receive().await.is_ok());

        // After the drain, receive reports the infrastructure fault.
        let err = source.receive().await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable(_)));

        // And pushes are refused.
        let err = source.push(Job::new(serde_json::json!(2))).await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn requeue_with_delay_holds_the_job_back() {
        let delay = Duration::from_millis(50);
        let source = InMemorySource::with_redelivery_delay(delay);
        let job = Job::new(serde_json::json!("bounced"));
        let id = job.job_id();

        source.requeue(job).await.unwrap();

        // Not deliverable before the delay elapses.
        let early = tokio::time::timeout(Duration::from_millis(10), source.receive()).await;
        assert!(early.is_err(), "job delivered before its redelivery delay");

        // Deliverable after.
        let received = tokio::time::timeout(Duration::from_secs(2), source.receive())
            .await
            .expect("job not redelivered")
            .unwrap();
        assert_eq!(received.job_id(), id);
    }

    #[tokio::test]
    async fn immediate_requeue_goes_to_the_back_of_the_line() {
        let source = InMemorySource::new();
        let first = Job::new(serde_json::json!(1));
        let second = Job::new(serde_json::json!(2));
        let second_id = second.job_id();

        source.push(first).await.unwrap();
        let bounced = source.receive().await.unwrap();
        source.push(second).await.unwrap();
        source.requeue(bounced.clone()).await.unwrap();

        assert_eq!(source.receive().await.unwrap().job_id(), second_id);
        assert_eq!(source.receive().await.unwrap().job_id(), bounced.job_id());
    }
}
