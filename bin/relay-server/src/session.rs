//! Relay session table: a token binds up to two peer slots, each
//! identified by the endpoint it last registered or sent traffic from
//! (spec §3's "Relay session" / §4.5).

use std::{collections::HashMap, net::SocketAddr, time::Instant};

use parking_lot::RwLock;

pub type RelayToken = [u8; 16];
pub type PeerId = [u8; 32];

#[derive(Clone, Copy)]
struct Slot {
    peer_id: PeerId,
    endpoint: SocketAddr,
}

struct Session {
    slots: [Option<Slot>; 2],
    last_active: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            slots: [None, None],
            last_active: Instant::now(),
        }
    }

    fn slot_for_endpoint(&self, endpoint: SocketAddr) -> Option<usize> {
        self.slots.iter().position(|s| matches!(s, Some(slot) if slot.endpoint == endpoint))
    }
}

#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<RelayToken, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `endpoint` to the slot for `peer_id` under `token`, creating
    /// the session on first use. Rejects a third distinct peer id.
    pub fn register(&self, token: RelayToken, peer_id: PeerId, endpoint: SocketAddr) {
        let mut sessions = self.sessions.write();
        let session = sessions.entry(token).or_insert_with(Session::new);
        session.last_active = Instant::now();

        if let Some(slot) = session.slots.iter_mut().flatten().find(|s| s.peer_id == peer_id) {
            slot.endpoint = endpoint;
            return;
        }

        if let Some(empty) = session.slots.iter_mut().find(|s| s.is_none()) {
            *empty = Some(Slot { peer_id, endpoint });
        } else {
            log::warn!("relay: session already has two peers, rejecting a third registration");
        }
    }

    /// Looks up the session for `token`, finds which slot `from` belongs
    /// to, and returns the other slot's endpoint to forward to.
    pub fn forward_target(&self, token: RelayToken, from: SocketAddr) -> Option<SocketAddr> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&token)?;
        session.last_active = Instant::now();

        let from_slot = session.slot_for_endpoint(from)?;
        let other_slot = 1 - from_slot;
        session.slots[other_slot].map(|s| s.endpoint)
    }

    pub fn touch(&self, token: RelayToken) {
        if let Some(session) = self.sessions.write().get_mut(&token) {
            session.last_active = Instant::now();
        }
    }

    pub fn sweep_expired(&self, ttl: std::time::Duration) {
        let now = Instant::now();
        self.sessions.write().retain(|_, session| now.duration_since(session.last_active) < ttl);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn forwards_to_the_other_slot_once_both_peers_register() {
        let table = SessionTable::new();
        let token = [1u8; 16];

        table.register(token, [1u8; 32], addr(1000));
        assert!(table.forward_target(token, addr(1000)).is_none());

        table.register(token, [2u8; 32], addr(2000));
        assert_eq!(table.forward_target(token, addr(1000)), Some(addr(2000)));
        assert_eq!(table.forward_target(token, addr(2000)), Some(addr(1000)));
    }

    #[test]
    fn a_peer_re_registering_from_a_new_endpoint_updates_its_slot() {
        let table = SessionTable::new();
        let token = [2u8; 16];

        table.register(token, [1u8; 32], addr(1000));
        table.register(token, [2u8; 32], addr(2000));
        table.register(token, [1u8; 32], addr(1500));

        assert_eq!(table.forward_target(token, addr(2000)), Some(addr(1500)));
    }

    #[test]
    fn a_third_distinct_peer_is_rejected() {
        let table = SessionTable::new();
        let token = [3u8; 16];

        table.register(token, [1u8; 32], addr(1000));
        table.register(token, [2u8; 32], addr(2000));
        table.register(token, [3u8; 32], addr(3000));

        assert!(table.forward_target(token, addr(3000)).is_none());
        assert_eq!(table.forward_target(token, addr(1000)), Some(addr(2000)));
    }

    #[test]
    fn unknown_tokens_forward_nowhere() {
        let table = SessionTable::new();
        assert!(table.forward_target([9u8; 16], addr(1000)).is_none());
    }

    #[test]
    fn sweep_expired_removes_idle_sessions() {
        let table = SessionTable::new();
        table.register([4u8; 16], [1u8; 32], addr(1000));
        assert_eq!(table.len(), 1);

        table.sweep_expired(std::time::Duration::from_secs(0));
        assert_eq!(table.len(), 0);
    }
}
