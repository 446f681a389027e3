//! Demo: run the engine against an in-memory queue with injected failures.
//!
//! The operation fails its first `--fail-first` attempts across all jobs,
//! which exercises the whole pipeline: retries with backoff, the breaker
//! tripping and cooling down, and (depending on `--on-rejection`) requeued
//! or dead-lettered circuit-open jobs.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use bulwark_core::app::{RejectionPolicy, RetryExecutor, WorkerPool, WorkerPoolConfig};
use bulwark_core::breaker::{CircuitBreaker, CircuitBreakerConfig};
use bulwark_core::domain::Job;
use bulwark_core::impls::{InMemorySink, InMemorySource};
use bulwark_core::policy::RetryPolicy;
use bulwark_core::ports::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RejectionMode {
    /// Hand circuit-open jobs back to the source for redelivery.
    Requeue,
    /// Route circuit-open jobs straight to the dead-letter sink.
    DeadLetter,
}

impl From<RejectionMode> for RejectionPolicy {
    fn from(mode: RejectionMode) -> Self {
        match mode {
            RejectionMode::Requeue => RejectionPolicy::Requeue,
            RejectionMode::DeadLetter => RejectionPolicy::DeadLetterImmediately,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "bulwark", about = "Retry/backoff/circuit-breaker engine demo")]
struct Args {
    /// Number of jobs to enqueue.
    #[arg(long, default_value_t = 8)]
    jobs: u32,

    /// Fail this many attempts (across all jobs) before succeeding.
    #[arg(long, default_value_t = 2)]
    fail_first: u32,

    /// Attempt budget per job (attempt 1 counts).
    #[arg(long, default_value_t = 4)]
    max_attempts: u32,

    /// Base backoff delay in milliseconds.
    #[arg(long, default_value_t = 500)]
    base_delay_ms: u64,

    /// Backoff jitter in milliseconds (uniform, +/-).
    #[arg(long, default_value_t = 100)]
    jitter_ms: u64,

    /// Per-attempt timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Consecutive failures before the circuit opens.
    #[arg(long, default_value_t = 3)]
    breaker_threshold: u32,

    /// Cooldown before the open circuit probes again, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    breaker_reset_ms: u64,

    /// Maximum number of jobs in flight.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// What to do with jobs rejected while the circuit is open.
    #[arg(long, value_enum, default_value_t = RejectionMode::DeadLetter)]
    on_rejection: RejectionMode,
}

#[derive(Debug, Deserialize)]
struct DemoPayload {
    n: u32,
    text: String,
}

/// Fails the first `remaining_failures` attempts, then succeeds after a
/// short simulated work delay. Shared across jobs, like a flaky downstream
/// dependency would be.
struct FlakyOperation {
    remaining_failures: AtomicU32,
}

impl FlakyOperation {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Operation for FlakyOperation {
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, String> {
        let payload: DemoPayload = serde_json::from_value(job.payload().clone())
            .map_err(|e| format!("json decode: {e}"))?;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(format!("injected failure (left={left})"));
        }

        // simulated work
        sleep(Duration::from_millis(100)).await;
        Ok(serde_json::json!({ "echo": payload.text, "n": payload.n }))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    let retry_policy = RetryPolicy::new(
        args.max_attempts,
        Duration::from_millis(args.base_delay_ms),
        Duration::from_millis(args.jitter_ms),
        Duration::from_millis(args.timeout_ms),
    )?;
    let breaker_config = CircuitBreakerConfig::new(
        args.breaker_threshold,
        Duration::from_millis(args.breaker_reset_ms),
    )?;
    let pool_config = WorkerPoolConfig::new(args.concurrency, args.on_rejection.into())?;

    // (A) collaborators: in-memory queue, dead-letter sink, flaky operation
    // Requeued jobs wait half the breaker cooldown before redelivery so they
    // meet a circuit that has had a chance to probe.
    let source = Arc::new(InMemorySource::with_redelivery_delay(
        Duration::from_millis(args.breaker_reset_ms / 2),
    ));
    let sink = Arc::new(InMemorySink::new());
    let operation = Arc::new(FlakyOperation::new(args.fail_first));
    let breaker = Arc::new(CircuitBreaker::new(breaker_config));
    let executor = Arc::new(RetryExecutor::new(retry_policy, Arc::clone(&breaker)));

    // (B) enqueue the demo jobs
    for n in 0..args.jobs {
        let job = Job::new(serde_json::json!({ "n": n, "text": format!("job #{n}") }));
        tracing::info!(job_id = %job.job_id(), n, "enqueued");
        source.push(job).await?;
    }

    // (C) run the pool
    let pool = WorkerPool::spawn(
        source.clone(),
        sink.clone(),
        operation,
        executor,
        pool_config,
    );

    // (D) 完了をポーリングで待つ（succeeded / dead-lettered のどちらか）
    let deadline = tokio::time::Instant::now() + Duration::from_secs(120);
    loop {
        let counts = pool.counts();
        if counts.terminal() >= u64::from(args.jobs) {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("deadline reached before all jobs settled");
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    let final_counts = pool.counts();
    pool.shutdown_and_join().await?;

    // (E) final summary
    println!("counts: {}", serde_json::to_string(&final_counts)?);
    println!("breaker: {}", breaker.check_state());
    for entry in sink.entries() {
        println!(
            "dead-letter: id={} reason={}",
            entry.job.job_id(),
            entry.reason
        );
    }

    Ok(())
}
