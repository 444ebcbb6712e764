//! Per-network peer directory, grounded on the teacher's signaling
//! `Router` (session map keyed by user id, broadcast-by-removal on a dead
//! channel) but split one level deeper: a directory per `network_id`, and
//! richer per-peer state (endpoint, NAT class) than a bare channel.

use std::{collections::HashMap, net::SocketAddr, time::Instant};

use mesh::nat::NatClass;
use mesh::signaling::ServerMessage;
use parking_lot::RwLock;
use tokio::sync::mpsc;

pub struct PeerEntry {
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    pub pubkey: String,
    pub endpoint: Option<SocketAddr>,
    pub nat_class: Option<NatClass>,
    pub last_seen: Instant,
}

#[derive(Default)]
struct Network {
    peers: HashMap<String, PeerEntry>,
}

/// The server's whole world: one `Network` per `network_id`, never shared
/// across networks (spec §3: "network_key scopes every peer record").
#[derive(Default)]
pub struct Registry {
    networks: RwLock<HashMap<String, Network>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        network_id: &str,
        peer_id: String,
        pubkey: String,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let mut networks = self.networks.write();
        let network = networks.entry(network_id.to_string()).or_default();

        if let Some(old) = network.peers.get(&peer_id) {
            log::info!("registry: peer {peer_id} reconnected, evicting previous session");
            let _ = old.tx.send(ServerMessage::Error {
                msg: "replaced by a new connection".into(),
            });
        }

        network.peers.insert(
            peer_id,
            PeerEntry {
                tx,
                pubkey,
                endpoint: None,
                nat_class: None,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn report_endpoint(&self, network_id: &str, peer_id: &str, endpoint: SocketAddr, nat_class: NatClass) {
        let mut networks = self.networks.write();
        if let Some(peer) = networks.get_mut(network_id).and_then(|n| n.peers.get_mut(peer_id)) {
            peer.endpoint = Some(endpoint);
            peer.nat_class = Some(nat_class);
            peer.last_seen = Instant::now();
        }
    }

    pub fn touch(&self, network_id: &str, peer_id: &str) {
        let mut networks = self.networks.write();
        if let Some(peer) = networks.get_mut(network_id).and_then(|n| n.peers.get_mut(peer_id)) {
            peer.last_seen = Instant::now();
        }
    }

    pub fn send_to(&self, network_id: &str, peer_id: &str, msg: ServerMessage) -> bool {
        let networks = self.networks.read();
        let Some(peer) = networks.get(network_id).and_then(|n| n.peers.get(peer_id)) else {
            return false;
        };
        peer.tx.send(msg).is_ok()
    }

    /// A snapshot good enough to decide a hole-punch strategy: endpoint,
    /// NAT class and public key, or `None` if the peer hasn't reported
    /// an endpoint yet.
    pub fn snapshot(&self, network_id: &str, peer_id: &str) -> Option<(SocketAddr, NatClass, String)> {
        let networks = self.networks.read();
        let peer = networks.get(network_id)?.peers.get(peer_id)?;
        Some((peer.endpoint?, peer.nat_class?, peer.pubkey.clone()))
    }

    pub fn remove(&self, network_id: &str, peer_id: &str) {
        let mut networks = self.networks.write();
        if let Some(network) = networks.get_mut(network_id) {
            network.peers.remove(peer_id);
        }
    }

    /// Evicts peers that haven't reported an endpoint or sent any message
    /// within `stale_after`, closing their channel so the connection task
    /// notices and exits.
    pub fn sweep_stale(&self, stale_after: std::time::Duration) {
        let now = Instant::now();
        let mut networks = self.networks.write();
        for network in networks.values_mut() {
            network.peers.retain(|peer_id, peer| {
                let alive = now.duration_since(peer.last_seen) < stale_after;
                if !alive {
                    log::info!("registry: evicting stale peer {peer_id}");
                }
                alive
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_tx() -> (mpsc::UnboundedSender<ServerMessage>, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn snapshot_is_none_until_an_endpoint_is_reported() {
        let registry = Registry::new();
        let (tx, _rx) = entry_tx();
        registry.register("net-a", "peer-1".into(), "pubkey-1".into(), tx);

        assert!(registry.snapshot("net-a", "peer-1").is_none());

        registry.report_endpoint("net-a", "peer-1", "127.0.0.1:4000".parse().unwrap(), NatClass::Cone);
        let (endpoint, nat_class, pubkey) = registry.snapshot("net-a", "peer-1").unwrap();
        assert_eq!(endpoint, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(nat_class, NatClass::Cone);
        assert_eq!(pubkey, "pubkey-1");
    }

    #[test]
    fn networks_never_see_each_others_peers() {
        let registry = Registry::new();
        let (tx, _rx) = entry_tx();
        registry.register("net-a", "peer-1".into(), "pubkey-1".into(), tx);

        assert!(registry.snapshot("net-b", "peer-1").is_none());
        assert!(!registry.send_to("net-b", "peer-1", ServerMessage::Pong));
    }

    #[test]
    fn re_registering_a_peer_evicts_the_previous_session() {
        let registry = Registry::new();
        let (tx1, mut rx1) = entry_tx();
        let (tx2, _rx2) = entry_tx();

        registry.register("net-a", "peer-1".into(), "pubkey-1".into(), tx1);
        registry.register("net-a", "peer-1".into(), "pubkey-1".into(), tx2);

        match rx1.try_recv().unwrap() {
            ServerMessage::Error { .. } => {}
            other => panic!("expected an eviction error, got {other:?}"),
        }
    }

    #[test]
    fn sweep_stale_evicts_peers_past_the_threshold_and_keeps_fresh_ones() {
        let registry = Registry::new();
        let (tx_stale, _rx1) = entry_tx();
        let (tx_fresh, _rx2) = entry_tx();
        registry.register("net-a", "stale".into(), "pk".into(), tx_stale);
        registry.register("net-a", "fresh".into(), "pk".into(), tx_fresh);

        registry.sweep_stale(std::time::Duration::from_secs(0));

        assert!(registry.snapshot("net-a", "stale").is_none());
        registry.touch("net-a", "fresh");
        assert!(!registry.send_to("net-a", "stale", ServerMessage::Pong));
    }

    #[test]
    fn removed_peers_stop_receiving_messages() {
        let registry = Registry::new();
        let (tx, _rx) = entry_tx();
        registry.register("net-a", "peer-1".into(), "pubkey-1".into(), tx);
        registry.remove("net-a", "peer-1");

        assert!(!registry.send_to("net-a", "peer-1", ServerMessage::Pong));
    }
}
