//! Candidate-path scoring, promotion and roam handling (spec §4.6).

use std::{net::SocketAddr, sync::Arc, time::Duration};

use session::{ActivePath, EndpointSource, PeerId, PeerObserver, PeerRecord, PeerRegistry};

const PROBE_FAIL_DEMOTE_THRESHOLD: u32 = 3;
const EVICT_FAIL_THRESHOLD: u32 = 10;
const PROMOTE_SUCCESS_STREAK: u32 = 3;
const PROMOTE_RTT_RATIO: f64 = 0.8;

#[derive(Clone)]
pub struct PathManager<T> {
    registry: Arc<PeerRegistry<T>>,
}

impl<T: PeerObserver + Clone + Send + Sync + 'static> PathManager<T> {
    pub fn new(registry: Arc<PeerRegistry<T>>) -> Self {
        Self { registry }
    }

    /// Spec's probe timeout: `2 * srtt + 500ms`, clamped to `[500ms, 5s]`.
    pub fn probe_timeout(srtt: Option<Duration>) -> Duration {
        let base = srtt.unwrap_or(Duration::from_millis(250)) * 2 + Duration::from_millis(500);
        base.clamp(Duration::from_millis(500), Duration::from_secs(5))
    }

    pub fn add_candidate(&self, peer_id: &PeerId, address: SocketAddr, source: EndpointSource) {
        self.registry.with_mut(peer_id, |record| {
            record.add_candidate(address, source);
            if record.active_path.is_none() && !matches!(source, EndpointSource::Relay) {
                record.active_path = Some(ActivePath::Candidate(address));
            }
        });
    }

    /// Always-valid lowest-priority candidate, per spec ("the relay is
    /// always a valid candidate tagged `via-relay`").
    pub fn add_relay_candidate(&self, peer_id: &PeerId, relay_endpoint: SocketAddr) {
        self.add_candidate(peer_id, relay_endpoint, EndpointSource::Relay);
    }

    pub fn record_probe_success(&self, peer_id: &PeerId, address: SocketAddr, rtt: Duration) {
        self.registry.with_mut(peer_id, |record| {
            let active_rtt = record.active_candidate().and_then(|c| c.smoothed_rtt);

            if let Some(candidate) = record.candidates.iter_mut().find(|c| c.address == address) {
                candidate.smoothed_rtt = Some(match candidate.smoothed_rtt {
                    Some(prev) => (prev * 7 + rtt) / 8,
                    None => rtt,
                });
                candidate.last_success = Some(std::time::Instant::now());
                candidate.probe_fail_count = 0;
                candidate.success_streak += 1;
                candidate.needs_probe = false;
            }

            self.maybe_promote(record, address, active_rtt);
        });
    }

    /// Promote a non-active direct candidate once it has beaten the active
    /// path's RTT by the configured ratio for three consecutive probes.
    fn maybe_promote(&self, record: &mut PeerRecord, address: SocketAddr, active_rtt: Option<Duration>) {
        let is_active = matches!(record.active_path, Some(ActivePath::Candidate(a)) if a == address);
        if is_active {
            return;
        }

        let Some(candidate) = record.candidates.iter().find(|c| c.address == address) else {
            return;
        };
        if candidate.is_relay() {
            return;
        }
        if candidate.success_streak < PROMOTE_SUCCESS_STREAK {
            return;
        }

        let promote = match (candidate.smoothed_rtt, active_rtt) {
            (Some(rtt), Some(active)) => {
                (rtt.as_secs_f64()) < PROMOTE_RTT_RATIO * active.as_secs_f64()
            }
            // No active direct path yet (e.g. only a relay candidate so far).
            (Some(_), None) => true,
            _ => false,
        };

        if promote {
            record.active_path = Some(ActivePath::Candidate(address));
        }
    }

    pub fn record_probe_failure(&self, peer_id: &PeerId, address: SocketAddr) {
        self.registry.with_mut(peer_id, |record| {
            let is_active = matches!(record.active_path, Some(ActivePath::Candidate(a)) if a == address);

            if let Some(candidate) = record.candidates.iter_mut().find(|c| c.address == address) {
                candidate.probe_fail_count += 1;
                candidate.success_streak = 0;
            }

            if is_active {
                record.probe_fail_streak += 1;

                let fail_count = record
                    .candidates
                    .iter()
                    .find(|c| c.address == address)
                    .map(|c| c.probe_fail_count)
                    .unwrap_or(0);
                if fail_count >= PROBE_FAIL_DEMOTE_THRESHOLD {
                    self.demote_locked(record);
                }
            }

            record.candidates.retain(|c| c.probe_fail_count < EVICT_FAIL_THRESHOLD);
        });
    }

    /// Switches the active path to the best alternate, preferring direct
    /// candidates over relay, falling back to the warm relay if no direct
    /// alternate exists.
    fn demote_locked(&self, record: &mut PeerRecord) {
        let current = match record.active_path {
            Some(ActivePath::Candidate(addr)) => Some(addr),
            _ => None,
        };

        let best_direct = record
            .candidates
            .iter()
            .filter(|c| !c.is_relay() && Some(c.address) != current)
            .min_by_key(|c| c.smoothed_rtt.unwrap_or(Duration::from_secs(3600)));

        if let Some(candidate) = best_direct {
            record.active_path = Some(ActivePath::Candidate(candidate.address));
            return;
        }

        if let Some(token) = record.warm_relay {
            record.active_path = Some(ActivePath::ViaRelay(token));
        }
    }

    /// Handles an authenticated inbound packet from an address that is not
    /// the active path. Per spec §4.6's roam-detection policy, the new
    /// address is added as a candidate and queued for a probe; the active
    /// path is never switched until that probe round-trips.
    pub fn handle_roam(&self, peer_id: &PeerId, observed: SocketAddr) {
        self.registry.with_mut(peer_id, |record| {
            record.add_candidate(observed, EndpointSource::HolePunchObserved);
            if let Some(c) = record.candidates.iter_mut().find(|c| c.address == observed) {
                c.needs_probe = true;
            }
        });
    }

    /// Candidates flagged by `handle_roam` that still need a confirming
    /// probe before they are eligible for promotion.
    pub fn pending_probes(&self, peer_id: &PeerId) -> Vec<SocketAddr> {
        self.registry
            .get(peer_id)
            .map(|record| {
                record
                    .candidates
                    .iter()
                    .filter(|c| c.needs_probe)
                    .map(|c| c.address)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::PeerRegistry;

    #[derive(Clone, Default)]
    struct NoopObserver;
    impl PeerObserver for NoopObserver {}

    #[test]
    fn better_direct_candidate_eventually_promotes() {
        let registry = PeerRegistry::new(NoopObserver);
        let manager = PathManager::new(registry.clone());
        let peer_id = [9u8; 32];
        let slow: SocketAddr = "127.0.0.1:1111".parse().unwrap();
        let fast: SocketAddr = "127.0.0.1:2222".parse().unwrap();

        manager.add_candidate(&peer_id, slow, EndpointSource::StunReflexive);
        manager.record_probe_success(&peer_id, slow, Duration::from_millis(200));

        manager.add_candidate(&peer_id, fast, EndpointSource::HolePunchObserved);
        for _ in 0..3 {
            manager.record_probe_success(&peer_id, fast, Duration::from_millis(10));
        }

        let record = registry.get(&peer_id).unwrap();
        assert_eq!(record.active_path, Some(ActivePath::Candidate(fast)));
    }

    #[test]
    fn three_failures_on_active_path_demotes_to_relay() {
        let registry = PeerRegistry::new(NoopObserver);
        let manager = PathManager::new(registry.clone());
        let peer_id = [10u8; 32];
        let direct: SocketAddr = "127.0.0.1:3333".parse().unwrap();
        let relay: SocketAddr = "127.0.0.1:4444".parse().unwrap();

        manager.add_candidate(&peer_id, direct, EndpointSource::StunReflexive);
        manager.add_relay_candidate(&peer_id, relay);
        registry.with_mut(&peer_id, |r| r.warm_relay = Some([1u8; 16]));

        for _ in 0..3 {
            manager.record_probe_failure(&peer_id, direct);
        }

        let record = registry.get(&peer_id).unwrap();
        assert_eq!(record.active_path, Some(ActivePath::ViaRelay([1u8; 16])));
    }

    #[test]
    fn roam_adds_candidate_without_switching_active_path() {
        let registry = PeerRegistry::new(NoopObserver);
        let manager = PathManager::new(registry.clone());
        let peer_id = [11u8; 32];
        let original: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let roamed: SocketAddr = "127.0.0.1:6666".parse().unwrap();

        manager.add_candidate(&peer_id, original, EndpointSource::StunReflexive);
        manager.handle_roam(&peer_id, roamed);

        let record = registry.get(&peer_id).unwrap();
        assert_eq!(record.active_path, Some(ActivePath::Candidate(original)));
        assert!(record.candidates.iter().any(|c| c.address == roamed));
        assert_eq!(manager.pending_probes(&peer_id), vec![roamed]);
    }
}
