//! Channel multiplexer (spec §4.7): named logical channels layered over the
//! envelope. Channel 0 is reserved for the name→id handshake; every other
//! channel id is a 1-byte prefix inside the sealed payload.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use session::PeerId;

use crate::observer::ChannelHandler;

pub const HANDSHAKE_CHANNEL: u8 = 0;

pub struct ChannelMux {
    ids: RwLock<HashMap<String, u8>>,
    next_id: RwLock<u8>,
    handlers: RwLock<HashMap<u8, Arc<dyn ChannelHandler>>>,
}

impl Default for ChannelMux {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMux {
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(HashMap::new()),
            next_id: RwLock::new(HANDSHAKE_CHANNEL + 1),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a receiving handler for `channel`, assigning it an id on
    /// first use if it doesn't have one yet.
    pub fn on_channel(&self, channel: &str, handler: impl ChannelHandler + 'static) {
        let id = self.channel_id(channel);
        self.handlers.write().insert(id, Arc::new(handler));
    }

    /// Returns the id for `channel`, assigning a fresh one if this is the
    /// first time it has been named locally.
    pub fn channel_id(&self, channel: &str) -> u8 {
        if let Some(&id) = self.ids.read().get(channel) {
            return id;
        }

        let mut ids = self.ids.write();
        if let Some(&id) = ids.get(channel) {
            return id;
        }

        let mut next = self.next_id.write();
        let id = *next;
        *next = next.wrapping_add(1).max(HANDSHAKE_CHANNEL + 1);
        ids.insert(channel.to_string(), id);
        id
    }

    pub fn encode_payload(channel_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + payload.len());
        buf.push(channel_id);
        buf.extend_from_slice(payload);
        buf
    }

    pub fn decode_payload(bytes: &[u8]) -> Option<(u8, &[u8])> {
        bytes.split_first().map(|(id, rest)| (*id, rest))
    }

    /// Delivers an already-authenticated, already-demultiplexed payload to
    /// whichever handler is installed for its channel. Silently drops it
    /// if no handler was ever registered — there is nowhere authoritative
    /// to report an unroutable-but-authentic payload (spec §7: the
    /// `on_channel` handler never receives malformed or inauthentic
    /// packets, but an unrecognized channel id is neither).
    pub fn dispatch(&self, peer_id: PeerId, channel_id: u8, payload: &[u8]) {
        if let Some(handler) = self.handlers.read().get(&channel_id) {
            handler.on_message(peer_id, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn channel_ids_are_stable_and_distinct() {
        let mux = ChannelMux::new();
        let a = mux.channel_id("heartbeat");
        let b = mux.channel_id("vm-request");
        let a_again = mux.channel_id("heartbeat");

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert!(a > HANDSHAKE_CHANNEL);
        assert!(b > HANDSHAKE_CHANNEL);
    }

    #[test]
    fn dispatch_invokes_installed_handler() {
        let mux = ChannelMux::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        mux.on_channel("echo", move |_peer: PeerId, _payload: &[u8]| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let id = mux.channel_id("echo");
        mux.dispatch([0u8; 32], id, b"hi");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
