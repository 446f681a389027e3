//! Status views over a running pool.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of what the pool has done so far.
///
/// `dead_lettered` counts emissions handed to the sink (exhausted jobs plus
/// circuit-open jobs under the immediate dead-letter policy). `rejected`
/// counts every circuit-open rejection regardless of how it was routed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineCounts {
    pub received: u64,
    pub succeeded: u64,
    pub dead_lettered: u64,
    pub rejected: u64,
    pub requeued: u64,
    pub in_flight: u64,
}

impl EngineCounts {
    /// Jobs that reached a terminal outcome (acked or dead-lettered).
    /// Requeued jobs are not terminal; they will come back.
    pub fn terminal(&self) -> u64 {
        self.succeeded + self.dead_lettered
    }
}

/// Shared atomic counters behind [`EngineCounts`].
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    pub(crate) received: AtomicU64,
    pub(crate) succeeded: AtomicU64,
    pub(crate) dead_lettered: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) requeued: AtomicU64,
}

impl EngineCounters {
    pub(crate) fn snapshot(&self, in_flight: u64) -> EngineCounts {
        EngineCounts {
            received: self.received.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            dead_lettered: self.dead_lettered.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            requeued: self.requeued.load(Ordering::SeqCst),
            in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let counters = EngineCounters::default();
        counters.received.fetch_add(3, Ordering::SeqCst);
        counters.succeeded.fetch_add(2, Ordering::SeqCst);
        counters.dead_lettered.fetch_add(1, Ordering::SeqCst);

        let counts = counters.snapshot(1);
        assert_eq!(counts.received, 3);
        assert_eq!(counts.succeeded, 2);
        assert_eq!(counts.dead_lettered, 1);
        assert_eq!(counts.in_flight, 1);
        assert_eq!(counts.terminal(), 3);
    }

    #[test]
    fn counts_serialize_for_status_endpoints() {
        let counts = EngineCounts {
            received: 5,
            succeeded: 4,
            ..Default::default()
        };
        let v = serde_json::to_value(&counts).unwrap();
        assert_eq!(v["received"], 5);
        assert_eq!(v["succeeded"], 4);
    }
}
