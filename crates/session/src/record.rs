use std::{net::SocketAddr, time::Duration, time::Instant};

use codec::replay::Window;

use crate::{PeerId, RelayToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    Local,
    StunReflexive,
    RendezvousReported,
    HolePunchObserved,
    Relay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Unknown,
    Probing,
    Live,
    Stale,
    Dead,
}

#[derive(Debug, Clone)]
pub struct CandidateEndpoint {
    pub address: SocketAddr,
    pub source: EndpointSource,
    pub last_success: Option<Instant>,
    pub smoothed_rtt: Option<Duration>,
    pub probe_fail_count: u32,
    pub success_streak: u32,
    pub needs_probe: bool,
}

impl CandidateEndpoint {
    pub fn new(address: SocketAddr, source: EndpointSource) -> Self {
        Self {
            address,
            source,
            last_success: None,
            smoothed_rtt: None,
            probe_fail_count: 0,
            success_streak: 0,
            needs_probe: false,
        }
    }

    pub fn is_relay(&self) -> bool {
        matches!(self.source, EndpointSource::Relay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivePath {
    Candidate(SocketAddr),
    ViaRelay(RelayToken),
}

/// Everything the mesh knows about one remote peer in one network.
pub struct PeerRecord {
    pub peer_id: PeerId,
    pub candidates: Vec<CandidateEndpoint>,
    pub active_path: Option<ActivePath>,
    pub replay_window: Window,
    pub send_counter: u64,
    pub liveness: Liveness,
    pub warm_relay: Option<RelayToken>,
    pub last_inbound: Option<Instant>,
    pub probe_fail_streak: u32,
}

impl PeerRecord {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            candidates: Vec::new(),
            active_path: None,
            replay_window: Window::new(),
            send_counter: 0,
            liveness: Liveness::Unknown,
            warm_relay: None,
            last_inbound: None,
            probe_fail_streak: 0,
        }
    }

    /// Adds or refreshes a candidate endpoint. Existing candidates with the
    /// same address keep their RTT/fail-count history.
    pub fn add_candidate(&mut self, address: SocketAddr, source: EndpointSource) {
        if let Some(existing) = self.candidates.iter_mut().find(|c| c.address == address) {
            existing.source = source;
        } else {
            self.candidates.push(CandidateEndpoint::new(address, source));
        }
    }

    pub fn active_candidate(&self) -> Option<&CandidateEndpoint> {
        match &self.active_path {
            Some(ActivePath::Candidate(addr)) => {
                self.candidates.iter().find(|c| &c.address == addr)
            }
            _ => None,
        }
    }
}
