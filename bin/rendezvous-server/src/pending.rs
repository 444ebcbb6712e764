//! Pending connection requests (spec §3): a `request-connection` is only
//! good for 30s — if the target never reports readiness within that
//! window the requester gets an error instead of waiting forever.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub struct PendingRequest {
    pub network_id: String,
    pub requester_peer_id: String,
    pub target_peer_id: String,
    pub created_at: Instant,
}

#[derive(Default)]
pub struct PendingRequests {
    inner: Mutex<Vec<PendingRequest>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, network_id: String, requester_peer_id: String, target_peer_id: String) {
        self.inner.lock().push(PendingRequest {
            network_id,
            requester_peer_id,
            target_peer_id,
            created_at: Instant::now(),
        });
    }

    pub fn take_matching(&self, network_id: &str, target_peer_id: &str) -> Option<PendingRequest> {
        let mut pending = self.inner.lock();
        let index = pending
            .iter()
            .position(|p| p.network_id == network_id && p.target_peer_id == target_peer_id)?;
        Some(pending.remove(index))
    }

    pub fn sweep_expired(&self, ttl: Duration) {
        let now = Instant::now();
        self.inner.lock().retain(|p| now.duration_since(p.created_at) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_matching_only_matches_network_and_target() {
        let pending = PendingRequests::new();
        pending.insert("net-a".into(), "requester".into(), "target".into());

        assert!(pending.take_matching("net-b", "target").is_none());
        assert!(pending.take_matching("net-a", "other-target").is_none());

        let found = pending.take_matching("net-a", "target").unwrap();
        assert_eq!(found.requester_peer_id, "requester");
        assert!(pending.take_matching("net-a", "target").is_none());
    }

    #[test]
    fn sweep_expired_drops_requests_past_the_ttl() {
        let pending = PendingRequests::new();
        pending.insert("net-a".into(), "requester".into(), "target".into());

        pending.sweep_expired(Duration::from_secs(0));

        assert!(pending.take_matching("net-a", "target").is_none());
    }
}
