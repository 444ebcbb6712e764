//! The embedded host interface (spec §6): the single type a hosting
//! process constructs and holds onto. Everything it exposes is a message
//! sent to the reactor task and a reply awaited on a oneshot channel —
//! the instance itself never touches peer state directly.

use std::{fs, sync::Arc, time::Duration};

use session::PeerId;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    channel::ChannelMux,
    config::Config,
    error::{Error, Result},
    observer::{ChannelHandler, MeshObserver},
    reactor::{Command, ConnectInfo, KnownPeerInfo, MeshStatus, PingResult, Reactor},
    stats::{Snapshot, Statistics},
};

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// A running mesh instance. Dropping the last clone does not stop the
/// reactor; call [`MeshInstance::stop`] explicitly, matching the teacher's
/// explicit-shutdown convention over drop-glue.
#[derive(Clone)]
pub struct MeshInstance {
    peer_id: PeerId,
    commands: mpsc::Sender<Command>,
    channels: Arc<ChannelMux>,
    stats: Arc<Statistics>,
    cancellation: CancellationToken,
}

impl MeshInstance {
    /// Reads the identity key, binds the UDP socket and spawns the reactor
    /// task. Returns as soon as the socket is bound; NAT classification and
    /// rendezvous registration continue in the background.
    pub async fn start(config: Config, observer: Arc<dyn MeshObserver>) -> Result<Self> {
        let key_bytes = fs::read(&config.identity.private_key_path).map_err(Error::Io)?;
        let peer_id: PeerId = key_bytes
            .get(..32)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| Error::Config("identity key must be at least 32 bytes".into()))?;

        let channels = Arc::new(ChannelMux::new());
        let stats = Arc::new(Statistics::default());
        let cancellation = CancellationToken::new();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let reactor = Reactor::bind(
            &config,
            peer_id,
            observer,
            channels.clone(),
            stats.clone(),
            commands_rx,
            cancellation.clone(),
        )
        .await?;

        tokio::spawn(reactor.run());

        Ok(Self {
            peer_id,
            commands: commands_tx,
            channels,
            stats,
            cancellation,
        })
    }

    /// Cancels the reactor task. In-flight sends are dropped; peer state is
    /// discarded, matching spec §5's "no persistence across restarts".
    pub fn stop(&self) {
        self.cancellation.cancel();
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn stats(&self) -> Snapshot {
        self.stats.snapshot()
    }

    /// Installs a handler for inbound traffic on a named channel.
    pub fn on_channel(&self, channel: &str, handler: impl ChannelHandler + 'static) {
        self.channels.on_channel(channel, handler);
    }

    pub async fn send_on_channel(&self, peer_id: PeerId, channel: &str, payload: &[u8]) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Send {
                peer_id,
                channel: channel.to_string(),
                payload: payload.to_vec(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::SignalingUnavailable)?;

        reply_rx.await.map_err(|_| Error::SignalingUnavailable)?
    }

    pub async fn connect(&self, peer_id: PeerId) -> Result<ConnectInfo> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { peer_id, reply: reply_tx })
            .await
            .map_err(|_| Error::SignalingUnavailable)?;

        reply_rx.await.map_err(|_| Error::SignalingUnavailable)?
    }

    pub async fn ping(&self, peer_id: PeerId, timeout: Duration) -> Option<PingResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Ping {
                peer_id,
                timeout,
                reply: reply_tx,
            })
            .await
            .ok()?;

        reply_rx.await.ok().flatten()
    }

    pub async fn known_peers_with_info(&self) -> Vec<KnownPeerInfo> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::KnownPeers { reply: reply_tx }).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub async fn get_status(&self) -> Option<MeshStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands.send(Command::Status { reply: reply_tx }).await.ok()?;
        reply_rx.await.ok()
    }
}
