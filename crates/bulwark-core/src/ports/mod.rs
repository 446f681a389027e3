//! Ports - the engine's seams to the outside world.
//!
//! Each trait hides a collaborator the core knows nothing about:
//! - [`MessageSource`] / [`DeadLetterSink`]: the queue/broker boundary
//! - [`Operation`]: what a job actually does
//! - [`Clock`]: monotonic time (injected so breaker timing is testable)
//!
//! Transport-specific implementations live outside the core; development
//! versions are in [`crate::impls`].

pub mod clock;
pub mod operation;
pub mod sink;
pub mod source;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::operation::Operation;
pub use self::sink::DeadLetterSink;
pub use self::source::MessageSource;
