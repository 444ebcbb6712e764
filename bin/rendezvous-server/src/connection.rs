//! One WebSocket connection, grounded on the teacher's `bin/signaling`
//! `Connection` actor: a per-socket task that owns an outbound mpsc queue
//! and a `tokio::select!` loop between that queue and the socket itself.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use futures_util::{SinkExt, StreamExt};
use mesh::signaling::{ClientMessage, ServerMessage, Strategy, assign_strategy};
use rand::RngCore;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{WebSocketStream, tungstenite::Message as WsMessage};

use crate::{config::Config, pending::PendingRequests, registry::Registry};

pub struct Connection {
    ws: WebSocketStream<TcpStream>,
    registry: Arc<Registry>,
    pending: Arc<PendingRequests>,
    config: Arc<Config>,
    outbound_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<ServerMessage>,
    network_id: String,
    peer_id: String,
}

impl Connection {
    pub async fn accept(
        stream: TcpStream,
        peer_addr: SocketAddr,
        registry: Arc<Registry>,
        pending: Arc<PendingRequests>,
        config: Arc<Config>,
    ) -> anyhow::Result<()> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        log::info!("rendezvous: connection accepted from {peer_addr}");

        let mut connection = Self {
            ws,
            registry,
            pending,
            config,
            outbound_rx,
            outbound_tx,
            network_id: String::new(),
            peer_id: String::new(),
        };

        connection.poll().await;

        if !connection.peer_id.is_empty() {
            connection.registry.remove(&connection.network_id, &connection.peer_id);
            log::info!("rendezvous: peer {} disconnected", connection.peer_id);
        }

        Ok(())
    }

    async fn poll(&mut self) {
        loop {
            tokio::select! {
                outbound = self.outbound_rx.recv() => {
                    let Some(msg) = outbound else { return };
                    let Ok(text) = serde_json::to_string(&msg) else { continue };
                    if self.ws.send(WsMessage::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                inbound = self.ws.next() => {
                    match inbound {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(msg) => self.handle(msg).await,
                                Err(e) => log::warn!("rendezvous: malformed client message: {e}"),
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => return,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::warn!("rendezvous: read error: {e}");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::Register { peer_id, network_id, auth_proof: _ } => {
                self.network_id = network_id;
                self.peer_id = peer_id;
                self.registry.register(
                    &self.network_id,
                    self.peer_id.clone(),
                    String::new(),
                    self.outbound_tx.clone(),
                );
                let server_time = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
                let _ = self.outbound_tx.send(ServerMessage::Registered { server_time });
            }
            ClientMessage::ReportEndpoint { endpoint, nat_class } => {
                if self.peer_id.is_empty() {
                    return;
                }
                self.registry.report_endpoint(&self.network_id, &self.peer_id, endpoint, nat_class);
                if let Some(request) = self.pending.take_matching(&self.network_id, &self.peer_id) {
                    self.attempt_connect(&request.requester_peer_id, &request.target_peer_id);
                }
            }
            ClientMessage::RequestConnection { target_peer_id, requester_pubkey: _ } => {
                if self.peer_id.is_empty() {
                    return;
                }
                self.attempt_connect(&self.peer_id.clone(), &target_peer_id);
            }
            ClientMessage::HolePunchResult { target, success, observed_endpoint } => {
                if success {
                    if let Some(observed) = observed_endpoint {
                        self.registry.send_to(
                            &self.network_id,
                            &target,
                            ServerMessage::HolePunchContinue { new_endpoint: observed },
                        );
                    }
                }
            }
            ClientMessage::RequestRelay { target_peer_id: _ } => {
                let mut token_bytes = [0u8; 16];
                rand::rng().fill_bytes(&mut token_bytes);
                let session_token = hex_encode(&token_bytes);
                let _ = self.outbound_tx.send(ServerMessage::RelayAssigned {
                    relay_endpoint: self.config.relay_endpoint,
                    session_token,
                });
            }
            ClientMessage::Ping => {
                let _ = self.outbound_tx.send(ServerMessage::Pong);
            }
            ClientMessage::HolePunchReady | ClientMessage::HolePunchSent { .. } => {
                self.registry.touch(&self.network_id, &self.peer_id);
            }
        }
    }

    /// Runs the strategy table (spec §4.3) for one `(requester, target)`
    /// pair once both sides have a known endpoint and NAT class. If the
    /// target hasn't reported one yet, the request is queued and retried
    /// the next time that target does.
    fn attempt_connect(&self, requester: &str, target: &str) {
        let Some((requester_endpoint, requester_nat, requester_pubkey)) =
            self.registry.snapshot(&self.network_id, requester)
        else {
            return;
        };

        let Some((target_endpoint, target_nat, target_pubkey)) = self.registry.snapshot(&self.network_id, target)
        else {
            self.pending
                .insert(self.network_id.clone(), requester.to_string(), target.to_string());
            return;
        };

        let (requester_strategy, target_strategy) = assign_strategy(requester_nat, target_nat);

        self.registry.send_to(
            &self.network_id,
            requester,
            ServerMessage::PeerEndpoint {
                peer_id: target.to_string(),
                endpoint: target_endpoint,
                nat_class: target_nat,
                pubkey: target_pubkey,
            },
        );
        self.registry.send_to(
            &self.network_id,
            target,
            ServerMessage::PeerEndpoint {
                peer_id: requester.to_string(),
                endpoint: requester_endpoint,
                nat_class: requester_nat,
                pubkey: requester_pubkey,
            },
        );

        self.registry
            .send_to(&self.network_id, requester, ServerMessage::HolePunchStrategy { strategy: requester_strategy });
        self.registry
            .send_to(&self.network_id, target, ServerMessage::HolePunchStrategy { strategy: target_strategy });

        match (requester_strategy, target_strategy) {
            (Strategy::Simultaneous, Strategy::Simultaneous) => {
                self.registry.send_to(
                    &self.network_id,
                    requester,
                    ServerMessage::HolePunchNow { target_endpoint },
                );
                self.registry.send_to(
                    &self.network_id,
                    target,
                    ServerMessage::HolePunchNow { target_endpoint: requester_endpoint },
                );
            }
            (Strategy::Relay, Strategy::Relay) => {
                let mut token_bytes = [0u8; 16];
                rand::rng().fill_bytes(&mut token_bytes);
                let session_token = hex_encode(&token_bytes);
                let relay_endpoint = self.config.relay_endpoint;
                self.registry.send_to(
                    &self.network_id,
                    requester,
                    ServerMessage::RelayAssigned { relay_endpoint, session_token: session_token.clone() },
                );
                self.registry.send_to(
                    &self.network_id,
                    target,
                    ServerMessage::RelayAssigned { relay_endpoint, session_token },
                );
            }
            (Strategy::YouInitiate, Strategy::PeerInitiates) => {
                self.registry
                    .send_to(&self.network_id, requester, ServerMessage::HolePunchInitiate { target: target.to_string() });
                self.registry.send_to(&self.network_id, target, ServerMessage::HolePunchWait);
            }
            (Strategy::PeerInitiates, Strategy::YouInitiate) => {
                self.registry.send_to(&self.network_id, requester, ServerMessage::HolePunchWait);
                self.registry
                    .send_to(&self.network_id, target, ServerMessage::HolePunchInitiate { target: requester.to_string() });
            }
            _ => unreachable!("assign_strategy always returns a complementary pair"),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
