//! The rendezvous client: a WebSocket signaling session with a rendezvous
//! server (spec §4.3), grounded on the teacher lineage's per-connection
//! actor pattern (`bin/signaling/src/socket.rs`'s `Connection::poll`), but
//! reversed to the client side and wrapped in an exponential-backoff
//! reconnect loop (spec §4.9: "Signaling disconnect: exponential-backoff
//! reconnect; peer records stay ...").

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use super::protocol::{ClientMessage, ServerMessage};
use crate::error::{Error, Result};

const EVENTS_CAPACITY: usize = 256;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RendezvousClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events: broadcast::Sender<ServerMessage>,
    connected: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl RendezvousClient {
    /// Spawns the supervisor task and returns immediately; the first
    /// connection attempt happens in the background.
    pub fn spawn(url: Url) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENTS_CAPACITY);
        let connected = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        let client = Self {
            outbound: outbound_tx,
            events: events_tx.clone(),
            connected: connected.clone(),
        };

        tokio::spawn(supervisor(url, outbound_rx, events_tx, connected));
        client
    }

    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        self.outbound
            .send(msg)
            .map_err(|_| Error::SignalingUnavailable)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::Relaxed)
    }
}

async fn supervisor(
    url: Url,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    events_tx: broadcast::Sender<ServerMessage>,
    connected: std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let mut backoff = Duration::from_millis(250);

    loop {
        connected.store(false, std::sync::atomic::Ordering::Relaxed);

        let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                log::warn!("rendezvous: connect to {url} failed: {e}, retrying in {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        log::info!("rendezvous: connected to {url}");
        connected.store(true, std::sync::atomic::Ordering::Relaxed);
        backoff = Duration::from_millis(250);

        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => {
                    let Some(msg) = outbound else {
                        log::info!("rendezvous: client handle dropped, shutting down");
                        return;
                    };
                    let Ok(text) = serde_json::to_string(&msg) else {
                        log::error!("rendezvous: failed to serialize outbound message");
                        continue;
                    };
                    if write.send(WsMessage::Text(text.into())).await.is_err() {
                        log::warn!("rendezvous: send failed, reconnecting");
                        break;
                    }
                }
                inbound = read.next() => {
                    match inbound {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(msg) => {
                                    let _ = events_tx.send(msg);
                                }
                                Err(e) => log::warn!("rendezvous: malformed server message: {e}"),
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            log::warn!("rendezvous: connection closed, reconnecting");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::warn!("rendezvous: read error: {e}, reconnecting");
                            break;
                        }
                    }
                }
            }
        }

        connected.store(false, std::sync::atomic::Ordering::Relaxed);
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
