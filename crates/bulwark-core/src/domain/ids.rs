//! Domain identifiers (strongly-typed IDs).
//!
//! IDs are ULID-backed:
//! - sortable by creation time (timestamp is the leading component)
//! - generatable without coordination across processes
//! - 128-bit, UUID-compatible

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a Job (the unit of receive/ack/dead-letter).
///
/// A newtype over [`Ulid`] so job identities cannot be confused with other
/// strings or numbers flowing through the engine.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Ulid);

impl JobId {
    /// Allocate a fresh JobId.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Build a JobId from an existing ULID (e.g. one carried on the wire).
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}
