//! WorkerPool - bounded-concurrency driver from source to terminal outcome.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::app::executor::RetryExecutor;
use crate::app::status::{EngineCounters, EngineCounts};
use crate::domain::{ConfigError, EngineError, Job, RunOutcome};
use crate::ports::{DeadLetterSink, MessageSource, Operation};

/// What to do with a job rejected because the circuit is open.
///
/// A typed policy rather than a baked-in default: requeueing risks
/// reordering and duplication, immediate dead-lettering risks losing work
/// that would have succeeded after the cooldown. The operator chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionPolicy {
    /// Hand the job back to the source for later redelivery.
    Requeue,
    /// Route the job straight to the dead-letter sink.
    DeadLetterImmediately,
}

/// Pool configuration: concurrency cap plus the rejection policy.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    concurrency: usize,
    rejection_policy: RejectionPolicy,
}

impl WorkerPoolConfig {
    pub fn new(
        concurrency: usize,
        rejection_policy: RejectionPolicy,
    ) -> Result<Self, ConfigError> {
        if concurrency < 1 {
            return Err(ConfigError::Concurrency(concurrency));
        }
        Ok(Self {
            concurrency,
            rejection_policy,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn rejection_policy(&self) -> RejectionPolicy {
        self.rejection_policy
    }
}

/// Everything one job handler needs, cloned per spawn.
#[derive(Clone)]
struct JobContext {
    source: Arc<dyn MessageSource>,
    sink: Arc<dyn DeadLetterSink>,
    operation: Arc<dyn Operation>,
    executor: Arc<RetryExecutor>,
    counters: Arc<EngineCounters>,
    rejection_policy: RejectionPolicy,
}

/// Worker pool handle.
/// - `request_shutdown()` stops the receive loop; in-flight attempts finish,
///   pending retries abort (see [`RetryExecutor::run_with_signal`])
/// - `shutdown_and_join()` waits for the drain
/// - dropping the handle's sender also reads as shutdown
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    driver: JoinHandle<Result<(), EngineError>>,
    counters: Arc<EngineCounters>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl WorkerPool {
    /// Spawn the driver loop. Runs until shutdown is requested or the source
    /// becomes unavailable.
    pub fn spawn(
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn DeadLetterSink>,
        operation: Arc<dyn Operation>,
        executor: Arc<RetryExecutor>,
        config: WorkerPoolConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(EngineCounters::default());
        let semaphore = Arc::new(Semaphore::new(config.concurrency()));

        let ctx = JobContext {
            source,
            sink,
            operation,
            executor,
            counters: Arc::clone(&counters),
            rejection_policy: config.rejection_policy(),
        };

        let concurrency = config.concurrency();
        let driver = tokio::spawn(driver_loop(
            ctx,
            Arc::clone(&semaphore),
            shutdown_rx,
        ));

        Self {
            shutdown_tx,
            driver,
            counters,
            semaphore,
            concurrency,
        }
    }

    /// Live counters. `in_flight` is derived from the slots currently held.
    pub fn counts(&self) -> EngineCounts {
        let in_flight = (self.concurrency - self.semaphore.available_permits()) as u64;
        self.counters.snapshot(in_flight)
    }

    /// Ask the pool to stop receiving. Does not wait.
    pub fn request_shutdown(&self) {
        // ignore send error: the driver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Request shutdown and wait for in-flight jobs to drain.
    pub async fn shutdown_and_join(self) -> Result<(), EngineError> {
        self.request_shutdown();
        self.join().await
    }

    /// Wait for the driver without signaling shutdown (e.g. when the source
    /// is expected to close on its own).
    pub async fn join(self) -> Result<(), EngineError> {
        match self.driver.await {
            Ok(result) => result,
            Err(join_error) => {
                tracing::error!(error = %join_error, "pool driver panicked");
                Err(EngineError::SourceUnavailable(format!(
                    "pool driver task failed: {join_error}"
                )))
            }
        }
    }
}

async fn driver_loop(
    ctx: JobContext,
    semaphore: Arc<Semaphore>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), EngineError> {
    let mut inflight: JoinSet<()> = JoinSet::new();
    let mut result = Ok(());

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // receive は「待つ」ので select で shutdown と競合させる
        let job = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // handle dropped without an explicit shutdown
                    break;
                }
                continue;
            }
            received = ctx.source.receive() => match received {
                Ok(job) => job,
                Err(err) => {
                    // Infrastructure fault: the pool cannot make progress.
                    // Surface it instead of retrying the receive forever.
                    tracing::error!(error = %err, "message source unavailable, stopping pool");
                    result = Err(err);
                    break;
                }
            },
        };
        ctx.counters
            .received
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        // Backpressure: the receive loop parks here while all slots are
        // busy, so at most `concurrency` jobs are in flight.
        let permit = tokio::select! {
            changed = shutdown_rx.changed() => {
                // Shutdown won the race while we hold an undispatched job;
                // hand it back rather than dropping it on the floor.
                if let Err(err) = ctx.source.requeue(job).await {
                    tracing::warn!(error = %err, "could not requeue undispatched job at shutdown");
                }
                if changed.is_err() {
                    break;
                }
                continue;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_closed) => break,
            },
        };

        // Reap finished handlers so the set does not grow unbounded.
        while inflight.try_join_next().is_some() {}

        let job_ctx = ctx.clone();
        let mut job_shutdown = shutdown_rx.clone();
        inflight.spawn(async move {
            // The permit lives for the whole job: released only at the
            // terminal outcome.
            let _permit = permit;
            handle_job(job, job_ctx, &mut job_shutdown).await;
        });
    }

    // Drain: current attempts finish, pending retries abort via the shared
    // shutdown signal. No task is left behind.
    tracing::info!("worker pool draining {} in-flight job(s)", inflight.len());
    while inflight.join_next().await.is_some() {}

    result
}

/// Drive one job to its terminal outcome and route it.
async fn handle_job(job: Job, ctx: JobContext, shutdown: &mut watch::Receiver<bool>) {
    use std::sync::atomic::Ordering;

    let job_id = job.job_id();
    let outcome = ctx
        .executor
        .run_with_signal(&job, ctx.operation.as_ref(), shutdown)
        .await;

    match outcome {
        RunOutcome::Success(_) => {
            // Ack is ownership-based: dropping the job releases it.
            ctx.counters.succeeded.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(job_id = %job_id, "job succeeded");
        }
        RunOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            let reason = format!("exhausted after {attempts} attempt(s): {last_error}");
            tracing::warn!(job_id = %job_id, reason = %reason, "dead-lettering job");
            ctx.counters.dead_lettered.fetch_add(1, Ordering::SeqCst);
            if let Err(err) = ctx.sink.dead_letter(job, reason).await {
                // Sink faults must not take the pool down; the job is lost
                // to the sink but the loop keeps going.
                tracing::error!(job_id = %job_id, error = %err, "dead letter sink failed");
            }
        }
        RunOutcome::Rejected => {
            ctx.counters.rejected.fetch_add(1, Ordering::SeqCst);
            match ctx.rejection_policy {
                RejectionPolicy::Requeue => {
                    tracing::debug!(job_id = %job_id, "circuit open, requeueing job");
                    ctx.counters.requeued.fetch_add(1, Ordering::SeqCst);
                    if let Err(err) = ctx.source.requeue(job).await {
                        tracing::error!(job_id = %job_id, error = %err, "requeue failed, job dropped");
                    }
                }
                RejectionPolicy::DeadLetterImmediately => {
                    tracing::debug!(job_id = %job_id, "circuit open, dead-lettering job");
                    ctx.counters.dead_lettered.fetch_add(1, Ordering::SeqCst);
                    if let Err(err) = ctx
                        .sink
                        .dead_letter(job, "rejected: circuit open".to_string())
                        .await
                    {
                        tracing::error!(job_id = %job_id, error = %err, "dead letter sink failed");
                    }
                }
            }
        }
    }
}
