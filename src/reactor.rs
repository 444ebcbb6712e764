//! Single-threaded cooperative reactor (spec §4.8, §5): owns the UDP
//! socket, the peer registry and the path manager; everything else talks to
//! it through [`Command`]s or the rendezvous client's broadcast channel.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use codec::envelope::{self, Direction, Flags};
use parking_lot::RwLock;
use session::{ActivePath, EndpointSource, PeerId, PeerObserver, PeerRecord, PeerRegistry};
use tokio::{net::UdpSocket, sync::{mpsc, oneshot}, time::interval};
use tokio_util::sync::CancellationToken;

use crate::{
    channel::ChannelMux,
    config::{Config, TimeoutsConfig},
    error::{Error, Result},
    holepunch::{self, InboundProbe},
    nat::{self, NatClass},
    observer::MeshObserver,
    path::PathManager,
    relay_client::{self, WarmRelaySession},
    signaling::{ClientMessage, RendezvousClient, ServerMessage, Strategy},
    stats::Statistics,
};

#[derive(Clone)]
pub(crate) struct RegistryBridge(pub Arc<dyn MeshObserver>);

impl PeerObserver for RegistryBridge {
    fn on_live(&self, peer_id: &PeerId) {
        self.0.on_peer_live(peer_id);
    }

    fn on_dead(&self, peer_id: &PeerId) {
        self.0.on_peer_dead(peer_id);
    }
}

pub struct ConnectInfo {
    pub endpoint: SocketAddr,
    pub is_direct: bool,
    pub method: &'static str,
    pub rtt_ms: u64,
}

pub struct PingResult {
    pub endpoint: Option<SocketAddr>,
    pub latency_ms: Option<u64>,
    pub sent_peers: usize,
    pub received_peers: usize,
    pub new_peers: usize,
}

pub struct KnownPeerInfo {
    pub peer_id: PeerId,
    pub endpoint: Option<SocketAddr>,
}

pub struct MeshStatus {
    pub peer_id: PeerId,
    pub nat_class: Option<NatClass>,
    pub public_endpoint: Option<SocketAddr>,
    pub peer_count: usize,
}

pub enum Command {
    Send {
        peer_id: PeerId,
        channel: String,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    Connect {
        peer_id: PeerId,
        reply: oneshot::Sender<Result<ConnectInfo>>,
    },
    Ping {
        peer_id: PeerId,
        timeout: Duration,
        reply: oneshot::Sender<Option<PingResult>>,
    },
    KnownPeers {
        reply: oneshot::Sender<Vec<KnownPeerInfo>>,
    },
    Status {
        reply: oneshot::Sender<MeshStatus>,
    },
}

pub struct Reactor {
    socket: Arc<UdpSocket>,
    peer_id: PeerId,
    network_id: String,
    send_key: [u8; 32],
    recv_key: [u8; 32],
    registry: Arc<PeerRegistry<RegistryBridge>>,
    path: PathManager<RegistryBridge>,
    channels: Arc<ChannelMux>,
    stats: Arc<Statistics>,
    rendezvous: RendezvousClient,
    warm_relay: Arc<RwLock<Vec<WarmRelaySession>>>,
    /// Inbound hole-punch probes are matched by the address the punch is
    /// aimed at, not by peer id: the strategy handshake only ever hands the
    /// reactor a `target_endpoint`, never an authenticated identity (that
    /// only exists once a probe has actually round-tripped).
    holepunch_inboxes: Arc<RwLock<HashMap<SocketAddr, mpsc::Sender<InboundProbe>>>>,
    /// Endpoints the rendezvous server has told us belong to a given peer,
    /// so a successful punch can be folded back into the path manager.
    endpoint_peers: Arc<RwLock<HashMap<SocketAddr, PeerId>>>,
    /// The reverse of `endpoint_peers`, needed to resolve a `target` peer id
    /// carried on `hole-punch-initiate`/`hole-punch-wait` into the endpoint
    /// `start_holepunch` actually punches toward.
    peer_endpoints: Arc<RwLock<HashMap<PeerId, SocketAddr>>>,
    /// Path-probe liveness waiters, keyed by `(peer_id, candidate address)`:
    /// resolved by the next authenticated inbound packet from that exact
    /// pair, or left to expire on timeout (spec §4.6's "Probe").
    probe_waiters: Arc<RwLock<HashMap<(PeerId, SocketAddr), oneshot::Sender<()>>>>,
    pending_strategy: Arc<RwLock<Strategy>>,
    nat_class: Arc<RwLock<Option<NatClass>>>,
    public_endpoint: Arc<RwLock<Option<SocketAddr>>>,
    stun_servers: Vec<SocketAddr>,
    timeouts: TimeoutsConfig,
    commands: mpsc::Receiver<Command>,
    cancellation: CancellationToken,
}

impl Reactor {
    pub async fn bind(
        config: &Config,
        identity: [u8; 32],
        observer: Arc<dyn MeshObserver>,
        channels: Arc<ChannelMux>,
        stats: Arc<Statistics>,
        commands: mpsc::Receiver<Command>,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        let socket = Arc::new(UdpSocket::bind(config.transport.bind).await?);

        let send_key = envelope::derive_key(&config.network.network_key.0, Direction::Outbound);
        let recv_key = envelope::derive_key(&config.network.network_key.0, Direction::Inbound);

        let registry = PeerRegistry::new(RegistryBridge(observer));
        let path = PathManager::new(registry.clone());

        let rendezvous_url = config
            .transport
            .rendezvous
            .first()
            .cloned()
            .ok_or_else(|| Error::Config("at least one rendezvous URL is required".into()))?;
        let rendezvous = RendezvousClient::spawn(rendezvous_url);

        Ok(Self {
            socket,
            peer_id: identity,
            network_id: config.network.network_id.clone(),
            send_key,
            recv_key,
            registry,
            path,
            channels,
            stats,
            rendezvous,
            warm_relay: Arc::new(RwLock::new(Vec::new())),
            holepunch_inboxes: Arc::new(RwLock::new(HashMap::new())),
            endpoint_peers: Arc::new(RwLock::new(HashMap::new())),
            peer_endpoints: Arc::new(RwLock::new(HashMap::new())),
            probe_waiters: Arc::new(RwLock::new(HashMap::new())),
            pending_strategy: Arc::new(RwLock::new(Strategy::Simultaneous)),
            nat_class: Arc::new(RwLock::new(None)),
            public_endpoint: Arc::new(RwLock::new(None)),
            stun_servers: config.transport.stun_servers.clone(),
            timeouts: config.timeouts.clone(),
            commands,
            cancellation,
        })
    }

    /// Runs until cancelled. See spec §5's shutdown ordering: this loop is
    /// cancellation-aware at every `select!` point, so a token cancellation
    /// unwinds it promptly without ever leaving peer-record mutation
    /// half-applied.
    pub async fn run(mut self) {
        self.classify_nat().await;
        self.register_with_rendezvous().await;

        let mut warm_relay_ticker = interval(self.timeouts_warm_relay());
        let mut path_probe_ticker = interval(Duration::from_secs(self.timeouts.path_probe_secs));
        let mut rendezvous_events = self.rendezvous.subscribe();
        let mut recv_buf = vec![0u8; 65536];

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    log::info!("reactor: shutdown requested");
                    break;
                }
                Some(command) = self.commands.recv() => {
                    self.handle_command(command).await;
                }
                recv = self.socket.recv_from(&mut recv_buf) => {
                    match recv {
                        Ok((len, from)) => self.handle_inbound(&recv_buf[..len], from).await,
                        Err(e) => log::warn!("reactor: udp recv error: {e}"),
                    }
                }
                event = rendezvous_events.recv() => {
                    if let Ok(event) = event {
                        self.handle_server_message(event).await;
                    }
                }
                _ = warm_relay_ticker.tick() => {
                    self.send_warm_relay_keepalives();
                }
                _ = path_probe_ticker.tick() => {
                    self.run_path_probes();
                }
            }
        }
    }

    fn timeouts_warm_relay(&self) -> Duration {
        Duration::from_secs(self.timeouts.warm_relay_keepalive_secs)
    }

    async fn classify_nat(&self) {
        if self.stun_servers.len() < 2 {
            log::warn!("reactor: fewer than two STUN servers configured, skipping classification");
            return;
        }

        match nat::classify(
            &self.socket,
            &self.stun_servers,
            self.timeouts.stun_probe_tries,
            Duration::from_secs(self.timeouts.stun_probe_secs),
        )
        .await
        {
            Ok((class, reflexive)) => {
                log::info!("reactor: classified local NAT as {}", class.as_str());
                *self.nat_class.write() = Some(class);
                if let Some(endpoint) = reflexive {
                    *self.public_endpoint.write() = Some(endpoint);
                }
            }
            Err(e) => log::warn!("reactor: NAT classification failed: {e}"),
        }
    }

    async fn register_with_rendezvous(&self) {
        let proof = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, self.peer_id);
        let _ = self.rendezvous.send(ClientMessage::Register {
            peer_id: hex_encode(&self.peer_id),
            network_id: self.network_id.clone(),
            auth_proof: proof,
        });

        if let (Some(endpoint), Some(nat_class)) = (*self.public_endpoint.read(), *self.nat_class.read()) {
            let _ = self.rendezvous.send(ClientMessage::ReportEndpoint { endpoint, nat_class });
        }
    }

    fn send_envelope(&self, to: SocketAddr, flags: Flags, counter: u64, plaintext: &[u8]) {
        let mut wire = Vec::new();
        if envelope::seal(&self.send_key, flags, &self.peer_id, counter, plaintext, &mut wire).is_ok() {
            let socket = self.socket.clone();
            self.stats.record_sent();
            tokio::spawn(async move {
                let _ = socket.send_to(&wire, to).await;
            });
        }
    }

    async fn handle_inbound(&self, bytes: &[u8], from: SocketAddr) {
        self.stats.record_received();

        let opened = match envelope::open(&self.recv_key, bytes) {
            Ok(opened) => opened,
            Err(codec::Error::AuthFail) => {
                self.stats.record_auth_failure();
                return;
            }
            Err(_) => return,
        };

        if !self.registry.accept_inbound(&opened.sender_id, opened.counter, from) {
            self.stats.record_replay_drop();
            return;
        }

        // Roam detection (spec §4.6): a packet from an address other than
        // the current active path is queued for a confirming probe rather
        // than switching the active path outright.
        let is_roam = self
            .registry
            .get(&opened.sender_id)
            .map(|record| matches!(&record.active_path, Some(ActivePath::Candidate(addr)) if *addr != from))
            .unwrap_or(false);

        if is_roam {
            self.path.handle_roam(&opened.sender_id, from);
        } else {
            self.path.add_candidate(&opened.sender_id, from, EndpointSource::Local);
        }

        if let Some(waiter) = self.probe_waiters.write().remove(&(opened.sender_id, from)) {
            let _ = waiter.send(());
        }

        match opened.flags {
            Flags::Data => {
                if let Some((channel_id, payload)) = ChannelMux::decode_payload(&opened.plaintext) {
                    self.channels.dispatch(opened.sender_id, channel_id, payload);
                }
            }
            Flags::Keepalive => {}
            Flags::ControlHolepunchProbe => {
                if opened.plaintext.len() == 16 {
                    let challenge: [u8; 16] = opened.plaintext.try_into().unwrap_or([0u8; 16]);
                    let inboxes = self.holepunch_inboxes.read();
                    if let Some(tx) = inboxes.get(&from) {
                        let _ = tx.try_send(InboundProbe { from, challenge });
                    } else if let Some(tx) = inboxes.values().next() {
                        // `you-initiate` probes a port window around the
                        // reported endpoint, so the reply may land from an
                        // address we never registered exactly.
                        let _ = tx.try_send(InboundProbe { from, challenge });
                    }
                }
            }
            Flags::ControlHandshake => {
                if let Some((channel_id, payload)) = ChannelMux::decode_payload(&opened.plaintext) {
                    self.channels.dispatch(opened.sender_id, channel_id, payload);
                }
            }
        }
    }

    async fn handle_server_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Registered { server_time } => {
                log::info!("reactor: registered with rendezvous server at {server_time}");
                // Per spec §4.5: a peer opens and keeps a relay session as
                // soon as it joins a network, even when the active path
                // ends up direct. `target_peer_id` is ignored server-side
                // for this request; we pass our own id as a placeholder.
                let _ = self.rendezvous.send(ClientMessage::RequestRelay {
                    target_peer_id: hex_encode(&self.peer_id),
                });
            }
            ServerMessage::PeerEndpoint {
                peer_id,
                endpoint,
                nat_class: _,
                pubkey: _,
            } => {
                if let Some(id) = decode_peer_id(&peer_id) {
                    self.path.add_candidate(&id, endpoint, EndpointSource::RendezvousReported);
                    self.endpoint_peers.write().insert(endpoint, id);
                    self.peer_endpoints.write().insert(id, endpoint);
                }
            }
            ServerMessage::HolePunchStrategy { strategy } => {
                log::debug!("reactor: assigned hole-punch strategy {strategy:?}");
                *self.pending_strategy.write() = strategy;
            }
            ServerMessage::HolePunchNow { target_endpoint } => {
                let strategy = *self.pending_strategy.read();
                self.start_holepunch(target_endpoint, strategy);
            }
            ServerMessage::HolePunchInitiate { target } => {
                if let Some(id) = decode_peer_id(&target) {
                    if let Some(&endpoint) = self.peer_endpoints.read().get(&id) {
                        self.start_holepunch(endpoint, Strategy::YouInitiate);
                    } else {
                        log::debug!("reactor: asked to initiate a punch toward an unknown peer");
                    }
                }
            }
            ServerMessage::HolePunchWait => {
                log::debug!("reactor: waiting for the peer to initiate the hole punch");
            }
            ServerMessage::RelayAssigned {
                relay_endpoint,
                session_token,
            } => {
                if let Some(token) = decode_token(&session_token) {
                    self.warm_relay.write().push(WarmRelaySession {
                        relay_endpoint,
                        token,
                    });
                }
            }
            ServerMessage::Error { msg } => log::warn!("reactor: rendezvous error: {msg}"),
            _ => {}
        }
    }

    fn start_holepunch(&self, target: SocketAddr, strategy: Strategy) {
        let (tx, mut rx) = mpsc::channel(32);
        self.holepunch_inboxes.write().insert(target, tx);

        let socket = self.socket.clone();
        let send_key = self.send_key;
        let local_id = self.peer_id;
        let inboxes = self.holepunch_inboxes.clone();
        let endpoint_peers = self.endpoint_peers.clone();
        let path_registry = self.path.clone();
        let rendezvous = self.rendezvous.clone();

        tokio::spawn(async move {
            let sender = move |to: SocketAddr, challenge: &[u8; 16]| {
                let mut wire = Vec::new();
                if envelope::seal(&send_key, Flags::ControlHolepunchProbe, &local_id, 1, challenge, &mut wire).is_ok() {
                    let socket = socket.clone();
                    tokio::spawn(async move {
                        let _ = socket.send_to(&wire, to).await;
                    });
                }
            };

            // The symmetric side reports progress as soon as it commits to
            // a burst, since it has no confirmed result yet to wait for
            // (spec §4.4's `you_initiate`: "... then reports hole_punch_sent").
            if strategy == Strategy::YouInitiate {
                let _ = rendezvous.send(ClientMessage::HolePunchSent { new_endpoint: target });
            }

            let started = Instant::now();
            let punched = holepunch::run(strategy, target, &sender, &mut rx).await;
            inboxes.write().remove(&target);

            let peer_id_hex = endpoint_peers.read().get(&target).map(|id| hex_encode(id));
            if let Some(target_hex) = peer_id_hex.clone() {
                let _ = rendezvous.send(ClientMessage::HolePunchResult {
                    target: target_hex,
                    success: punched.is_some(),
                    observed_endpoint: punched,
                });
            }

            let Some(observed) = punched else {
                log::info!("reactor: hole-punch to {target} timed out, falling back to relay");
                return;
            };

            let Some(&peer_id) = endpoint_peers.read().get(&target) else {
                log::debug!("reactor: punched {observed} but its peer id is unknown");
                return;
            };

            path_registry.add_candidate(&peer_id, observed, EndpointSource::HolePunchObserved);
            path_registry.record_probe_success(&peer_id, observed, started.elapsed());
        });
    }

    /// Drives the path manager's Probe/Demote/Roam-confirm operations (spec
    /// §4.6): for each known peer, sends an authenticated keepalive to its
    /// active candidate and to any candidate a roam queued for confirmation,
    /// then waits up to the RTT-scaled probe timeout for any authenticated
    /// reply from that exact `(peer, address)` pair.
    fn run_path_probes(&self) {
        for peer_id in self.registry.peer_ids() {
            let Some(record) = self.registry.get(&peer_id) else { continue };
            if record.liveness == session::Liveness::Dead {
                continue;
            }

            let active = match &record.active_path {
                Some(ActivePath::Candidate(addr)) => Some(*addr),
                _ => None,
            };
            let srtt = record.active_candidate().and_then(|c| c.smoothed_rtt);
            drop(record);

            let mut targets: Vec<SocketAddr> = self.path.pending_probes(&peer_id);
            if let Some(addr) = active {
                if !targets.contains(&addr) {
                    targets.push(addr);
                }
            }

            for address in targets {
                self.probe_one(peer_id, address, srtt);
            }
        }
    }

    fn probe_one(&self, peer_id: PeerId, address: SocketAddr, srtt: Option<Duration>) {
        let (tx, rx) = oneshot::channel();
        self.probe_waiters.write().insert((peer_id, address), tx);

        let challenge = {
            use rand::RngCore;
            let mut bytes = [0u8; 16];
            rand::rng().fill_bytes(&mut bytes);
            bytes
        };
        let mut wire = Vec::new();
        if envelope::seal(&self.send_key, Flags::Keepalive, &self.peer_id, 1, &challenge, &mut wire).is_ok() {
            self.udp_send(address, wire);
        }

        let waiters = self.probe_waiters.clone();
        let path = self.path.clone();
        let timeout = PathManager::<RegistryBridge>::probe_timeout(srtt);
        let started = Instant::now();

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(())) => {
                    path.record_probe_success(&peer_id, address, started.elapsed());
                }
                _ => {
                    waiters.write().remove(&(peer_id, address));
                    path.record_probe_failure(&peer_id, address);
                }
            }
        });
    }

    fn send_warm_relay_keepalives(&self) {
        let sessions = self.warm_relay.read();
        for session in sessions.iter() {
            let packet = relay_client::encode(relay_client::TYPE_KEEPALIVE, &session.token, &[]);
            let socket = self.socket.clone();
            let to = session.relay_endpoint;
            tokio::spawn(async move {
                let _ = socket.send_to(&packet, to).await;
            });
        }
    }

    async fn handle_command(&self, command: Command) {
        match command {
            Command::Send {
                peer_id,
                channel,
                payload,
                reply,
            } => {
                let result = self.send_on_channel(&peer_id, &channel, &payload);
                let _ = reply.send(result);
            }
            Command::Connect { peer_id, reply } => {
                self.spawn_connect(peer_id, reply);
            }
            Command::Ping {
                peer_id,
                timeout: _,
                reply,
            } => {
                let result = self.ping_status(&peer_id);
                let _ = reply.send(result);
            }
            Command::KnownPeers { reply } => {
                let peers = self
                    .registry
                    .peer_ids()
                    .into_iter()
                    .map(|peer_id| {
                        let endpoint = self.registry.get(&peer_id).and_then(|r| match &r.active_path {
                            Some(ActivePath::Candidate(addr)) => Some(*addr),
                            _ => None,
                        });
                        KnownPeerInfo { peer_id, endpoint }
                    })
                    .collect();
                let _ = reply.send(peers);
            }
            Command::Status { reply } => {
                let _ = reply.send(MeshStatus {
                    peer_id: self.peer_id,
                    nat_class: *self.nat_class.read(),
                    public_endpoint: *self.public_endpoint.read(),
                    peer_count: self.registry.len(),
                });
            }
        }
    }

    /// Drives `connect(peer_id)` (spec §6, §4.3): if a path already exists
    /// this resolves immediately, otherwise it asks the rendezvous server to
    /// coordinate one via `request-connection` and polls the registry until
    /// either a path appears or the hole-punch deadline elapses. Runs in its
    /// own task so it never blocks the reactor's own event loop.
    fn spawn_connect(&self, peer_id: PeerId, reply: oneshot::Sender<Result<ConnectInfo>>) {
        if let Ok(info) = self.connect_status(&peer_id) {
            let _ = reply.send(Ok(info));
            return;
        }

        let _ = self.rendezvous.send(ClientMessage::RequestConnection {
            target_peer_id: hex_encode(&peer_id),
            requester_pubkey: hex_encode(&self.peer_id),
        });

        let registry = self.registry.clone();
        let deadline = Duration::from_secs(self.timeouts.hole_punch_deadline_secs);

        tokio::spawn(async move {
            let started = Instant::now();
            loop {
                if let Some(info) = connect_info_from_registry(&registry, &peer_id) {
                    let _ = reply.send(Ok(info));
                    return;
                }
                if started.elapsed() >= deadline {
                    let _ = reply.send(Err(Error::PeerUnreachable("connect request timed out".into())));
                    return;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
    }

    fn send_on_channel(&self, peer_id: &PeerId, channel: &str, payload: &[u8]) -> Result<()> {
        let record = self
            .registry
            .get(peer_id)
            .ok_or_else(|| Error::PeerUnreachable("unknown peer".into()))?;

        if record.liveness == session::Liveness::Dead {
            return Err(Error::PeerUnreachable("peer is dead".into()));
        }

        let destination = match &record.active_path {
            Some(ActivePath::Candidate(addr)) => *addr,
            Some(ActivePath::ViaRelay(token)) => {
                let sessions = self.warm_relay.read();
                let Some(session) = sessions.iter().find(|s| &s.token == token) else {
                    return Err(Error::PeerUnreachable("relay session missing".into()));
                };
                let channel_id = self.channels.channel_id(channel);
                let sealed = self.seal_data(peer_id, channel_id, payload)?;
                let relay_packet = relay_client::encode(relay_client::TYPE_DATA, token, &sealed);
                self.udp_send(session.relay_endpoint, relay_packet);
                return Ok(());
            }
            None => return Err(Error::PeerUnreachable("no known path".into())),
        };
        drop(record);

        let channel_id = self.channels.channel_id(channel);
        let sealed = self.seal_data(peer_id, channel_id, payload)?;
        self.udp_send(destination, sealed);
        Ok(())
    }

    fn seal_data(&self, peer_id: &PeerId, channel_id: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let counter = self
            .registry
            .next_send_counter(peer_id)
            .ok_or(Error::ResourceExhausted)?;
        let framed = ChannelMux::encode_payload(channel_id, payload);
        let mut wire = Vec::new();
        envelope::seal(&self.send_key, Flags::Data, &self.peer_id, counter, &framed, &mut wire)
            .map_err(|_| Error::ResourceExhausted)?;
        Ok(wire)
    }

    fn udp_send(&self, to: SocketAddr, wire: Vec<u8>) {
        self.stats.record_sent();
        let socket = self.socket.clone();
        tokio::spawn(async move {
            let _ = socket.send_to(&wire, to).await;
        });
    }

    fn connect_status(&self, peer_id: &PeerId) -> Result<ConnectInfo> {
        connect_info_from_registry(&self.registry, peer_id)
            .ok_or_else(|| Error::PeerUnreachable("no active path".into()))
    }

    fn ping_status(&self, peer_id: &PeerId) -> Option<PingResult> {
        let record = self.registry.get(peer_id)?;
        let active = record.active_candidate();
        Some(PingResult {
            endpoint: active.map(|c| c.address),
            latency_ms: active.and_then(|c| c.smoothed_rtt).map(|d| d.as_millis() as u64),
            sent_peers: 0,
            received_peers: 0,
            new_peers: 0,
        })
    }
}

/// Shared by `connect_status` (fast path) and `spawn_connect`'s poll loop
/// (slow path, after a `request-connection` round trip).
fn connect_info_from_registry(registry: &PeerRegistry<RegistryBridge>, peer_id: &PeerId) -> Option<ConnectInfo> {
    let record = registry.get(peer_id)?;
    match &record.active_path {
        Some(ActivePath::Candidate(addr)) => Some(ConnectInfo {
            endpoint: *addr,
            is_direct: true,
            method: "direct",
            rtt_ms: record
                .active_candidate()
                .and_then(|c| c.smoothed_rtt)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }),
        Some(ActivePath::ViaRelay(_)) => Some(ConnectInfo {
            endpoint: *peer_id_placeholder(),
            is_direct: false,
            method: "relay",
            rtt_ms: 0,
        }),
        None => None,
    }
}

fn peer_id_placeholder() -> &'static SocketAddr {
    static UNSPECIFIED: std::sync::OnceLock<SocketAddr> = std::sync::OnceLock::new();
    UNSPECIFIED.get_or_init(|| "0.0.0.0:0".parse().unwrap())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_peer_id(hex: &str) -> Option<PeerId> {
    if hex.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte = u8::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
        out[i] = byte;
    }
    Some(out)
}

fn decode_token(hex: &str) -> Option<session::RelayToken> {
    if hex.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte = u8::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
        out[i] = byte;
    }
    Some(out)
}
