//! Broker connection statistics for `/api/health`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated from the receiver task and the publish path. Lock-free;
/// readers get a possibly slightly stale but never torn snapshot per field.
#[derive(Default)]
pub struct BridgeStats {
    pub reconnects: AtomicU64,
    pub messages_received: AtomicU64,
    pub commands_published: AtomicU64,
    pub publish_failures: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub reconnects: u64,
    pub messages_received: u64,
    pub commands_published: u64,
    pub publish_failures: u64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reconnects: self.reconnects.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            commands_published: self.commands_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
