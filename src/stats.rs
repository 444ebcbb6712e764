//! Lock-light counters for the reactor's packet path, in the teacher's
//! `ahash` + `parking_lot` style (`src/statistics.rs`), scaled down to what
//! a library core needs: there is no HTTP surface here, so counters are
//! exposed programmatically via [`Statistics::snapshot`] rather than wired
//! to a Prometheus exporter (that belongs to the hosting binary, not the
//! mesh core).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Statistics {
    sent_packets: AtomicU64,
    received_packets: AtomicU64,
    auth_failures: AtomicU64,
    replay_drops: AtomicU64,
    unknown_sender_drops: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    pub sent_packets: u64,
    pub received_packets: u64,
    pub auth_failures: u64,
    pub replay_drops: u64,
    pub unknown_sender_drops: u64,
}

impl Statistics {
    pub fn record_sent(&self) {
        self.sent_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replay_drop(&self) {
        self.replay_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_sender(&self) {
        self.unknown_sender_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sent_packets: self.sent_packets.load(Ordering::Relaxed),
            received_packets: self.received_packets.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            replay_drops: self.replay_drops.load(Ordering::Relaxed),
            unknown_sender_drops: self.unknown_sender_drops.load(Ordering::Relaxed),
        }
    }
}
