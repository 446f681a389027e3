//! bulwark-core
//!
//! Resilient message-processing engine: a bounded-concurrency worker pool
//! that pulls opaque jobs from a message source and runs each through a
//! failure-handling pipeline of per-attempt timeout, exponential backoff
//! with jitter, a shared circuit breaker, and dead-letter escalation.
//!
//! # Module layout
//! - **domain**: model types (ids, job, outcome, errors)
//! - **policy**: retry budget and backoff timing
//! - **breaker**: the circuit breaker state machine
//! - **ports**: seams to the outside world (MessageSource, DeadLetterSink,
//!   Operation, Clock)
//! - **app**: RetryExecutor, WorkerPool, status counters
//! - **impls**: in-memory port implementations for development and tests
//!
//! The engine knows nothing about transports, authentication, or what a job
//! actually does; those live behind the ports.

pub mod app;
pub mod breaker;
pub mod domain;
pub mod impls;
pub mod policy;
pub mod ports;
