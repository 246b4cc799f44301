use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Traffic counters for one gossip service.
///
/// All counters use [`Ordering::Relaxed`]; they are statistics, not
/// synchronization.
#[derive(Debug, Default)]
pub struct GossipStats {
    received: AtomicU64,
    rejected: AtomicU64,
    recv_errors: AtomicU64,
    sent: AtomicU64,
    send_errors: AtomicU64,
    cycles: AtomicU64,
}

/// Point-in-time copy of [`GossipStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Valid announcements ingested.
    pub received: u64,
    /// Datagrams dropped by validation (wrong size or non-IPv4 source).
    pub rejected: u64,
    pub recv_errors: u64,
    pub sent: u64,
    pub send_errors: u64,
    /// Completed broadcast sweeps.
    pub cycles: u64,
}

impl GossipStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }
}
