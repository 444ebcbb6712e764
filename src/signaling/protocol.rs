//! Wire types for the rendezvous signaling protocol (spec §4.3): JSON
//! objects, one per WebSocket text frame, tagged on `"type"`.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::nat::NatClass;

fn nat_class_as_str(class: &NatClass) -> &'static str {
    class.as_str()
}

/// Hole-punch strategy the server assigns to one side of a pair (spec
/// §4.3's strategy table). The server always hands out complementary roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Simultaneous,
    YouInitiate,
    PeerInitiates,
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Register {
        peer_id: String,
        network_id: String,
        auth_proof: String,
    },
    ReportEndpoint {
        endpoint: SocketAddr,
        #[serde(with = "nat_class_serde")]
        nat_class: NatClass,
    },
    RequestConnection {
        target_peer_id: String,
        requester_pubkey: String,
    },
    HolePunchReady,
    HolePunchSent {
        new_endpoint: SocketAddr,
    },
    HolePunchResult {
        target: String,
        success: bool,
        observed_endpoint: Option<SocketAddr>,
    },
    RequestRelay {
        target_peer_id: String,
    },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Registered {
        server_time: u64,
    },
    Error {
        msg: String,
    },
    PeerEndpoint {
        peer_id: String,
        endpoint: SocketAddr,
        #[serde(with = "nat_class_serde")]
        nat_class: NatClass,
        pubkey: String,
    },
    HolePunchStrategy {
        strategy: Strategy,
    },
    HolePunchNow {
        target_endpoint: SocketAddr,
    },
    HolePunchInitiate {
        target: String,
    },
    HolePunchWait,
    HolePunchContinue {
        new_endpoint: SocketAddr,
    },
    RelayAssigned {
        relay_endpoint: SocketAddr,
        session_token: String,
    },
    Pong,
}

mod nat_class_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::nat::NatClass;

    pub fn serialize<S: Serializer>(class: &NatClass, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(super::nat_class_as_str(class))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NatClass, D::Error> {
        let value = String::deserialize(d)?;
        Ok(match value.as_str() {
            "public" => NatClass::Public,
            "cone" => NatClass::Cone,
            "symmetric" => NatClass::Symmetric,
            other => {
                return Err(serde::de::Error::custom(format!(
                    "unknown nat class: {other}"
                )));
            }
        })
    }
}

/// Server-side strategy assignment (spec §4.3's table), returning the
/// complementary pair `(requester_strategy, target_strategy)`.
pub fn assign_strategy(requester: NatClass, target: NatClass) -> (Strategy, Strategy) {
    use NatClass::*;
    use Strategy::*;

    match (requester, target) {
        (Symmetric, Symmetric) => (Relay, Relay),
        (Symmetric, _) => (YouInitiate, PeerInitiates),
        (_, Symmetric) => (PeerInitiates, YouInitiate),
        _ => (Simultaneous, Simultaneous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NatClass::*;

    #[test]
    fn strategies_are_always_complementary() {
        let classes = [Public, Cone, Symmetric];
        for &a in &classes {
            for &b in &classes {
                let (sa, sb) = assign_strategy(a, b);
                let ok = matches!(
                    (sa, sb),
                    (Strategy::Simultaneous, Strategy::Simultaneous)
                        | (Strategy::Relay, Strategy::Relay)
                        | (Strategy::YouInitiate, Strategy::PeerInitiates)
                        | (Strategy::PeerInitiates, Strategy::YouInitiate)
                );
                assert!(ok, "not complementary for ({a:?}, {b:?}): ({sa:?}, {sb:?})");
            }
        }
    }
}
