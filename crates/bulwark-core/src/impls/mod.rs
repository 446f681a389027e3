//! Development implementations of the ports.
//!
//! These back the CLI demo and the test suite. Production deployments bind
//! the ports to a real broker instead.

pub mod inmem_sink;
pub mod inmem_source;

pub use self::inmem_sink::{DeadLetterEntry, InMemorySink};
pub use self::inmem_source::InMemorySource;
