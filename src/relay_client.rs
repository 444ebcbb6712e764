//! Relay client: wire format for the relay server's UDP protocol, plus warm-
//! relay session bookkeeping and keepalives (spec §4.5).

use std::{net::SocketAddr, time::Duration};

use session::RelayToken;
use tokio::time::interval;

pub const TYPE_REGISTER: u8 = 0x01;
pub const TYPE_DATA: u8 = 0x02;
pub const TYPE_KEEPALIVE: u8 = 0x03;

pub const WARM_RELAY_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub enum RelayError {
    InvalidFormat,
}

/// `type(1) | token(16) | payload`.
pub fn encode(kind: u8, token: &RelayToken, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 16 + payload.len());
    buf.push(kind);
    buf.extend_from_slice(token);
    buf.extend_from_slice(payload);
    buf
}

pub fn decode(bytes: &[u8]) -> Result<(u8, RelayToken, &[u8]), RelayError> {
    if bytes.len() < 17 {
        return Err(RelayError::InvalidFormat);
    }
    let kind = bytes[0];
    let token: RelayToken = bytes[1..17].try_into().map_err(|_| RelayError::InvalidFormat)?;
    Ok((kind, token, &bytes[17..]))
}

/// One peer's warm-relay session: opened as soon as the peer joins the
/// network and kept alive even while a direct path is active, so a broken
/// direct path can fail over without a signaling round trip.
pub struct WarmRelaySession {
    pub relay_endpoint: SocketAddr,
    pub token: RelayToken,
}

/// Sends a `keepalive` through every registered warm-relay session on a
/// fixed interval. Takes a generic sender so it never touches the UDP
/// socket directly, matching the reactor's exclusive-ownership policy.
pub async fn run_keepalive_loop(
    sessions: std::sync::Arc<parking_lot::RwLock<Vec<WarmRelaySession>>>,
    send: impl Fn(SocketAddr, &[u8]),
) {
    let mut ticker = interval(WARM_RELAY_KEEPALIVE_INTERVAL);
    loop {
        ticker.tick().await;
        let sessions = sessions.read();
        for session in sessions.iter() {
            let packet = encode(TYPE_KEEPALIVE, &session.token, &[]);
            send(session.relay_endpoint, &packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_wire_format() {
        let token = [7u8; 16];
        let encoded = encode(TYPE_DATA, &token, b"hello");
        let (kind, decoded_token, payload) = decode(&encoded).unwrap();
        assert_eq!(kind, TYPE_DATA);
        assert_eq!(decoded_token, token);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn rejects_short_packets() {
        assert!(matches!(decode(&[1, 2, 3]), Err(RelayError::InvalidFormat)));
    }
}
