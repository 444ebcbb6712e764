//! Hole-punch engine (spec §4.4): runs the strategy the rendezvous server
//! assigned, against the target endpoint, over the same UDP socket that
//! carries data traffic so the NAT mapping it creates is the one the mesh
//! actually uses afterwards.

use std::{net::SocketAddr, time::Duration};

use rand::RngCore;
use tokio::{
    sync::mpsc,
    time::{interval, sleep},
};

use crate::signaling::Strategy;

pub const PROBE_INTERVAL: Duration = Duration::from_millis(50);
pub const DEADLINE: Duration = Duration::from_secs(8);
pub const PREDICTION_WINDOW: i32 = 8;

/// A demultiplexed `control-holepunch-probe` envelope, handed to the engine
/// by the reactor once it has already decrypted and authenticated it.
pub struct InboundProbe {
    pub from: SocketAddr,
    pub challenge: [u8; 16],
}

/// Sends a single probe envelope to `target`. Supplied by the reactor so
/// this module never touches the socket directly (spec §5's
/// shared-resource policy: only the reactor owns the UDP socket).
pub trait ProbeSender: Send + Sync {
    fn send_probe(&self, target: SocketAddr, challenge: &[u8; 16]);
}

impl<F: Fn(SocketAddr, &[u8; 16]) + Send + Sync> ProbeSender for F {
    fn send_probe(&self, target: SocketAddr, challenge: &[u8; 16]) {
        self(target, challenge)
    }
}

/// Runs the assigned strategy to completion (success) or deadline
/// (failure, caller should fall back to relay).
pub async fn run(
    strategy: Strategy,
    target: SocketAddr,
    sender: &dyn ProbeSender,
    inbound: &mut mpsc::Receiver<InboundProbe>,
) -> Option<SocketAddr> {
    let deadline = sleep(DEADLINE);
    tokio::pin!(deadline);

    match strategy {
        Strategy::Simultaneous => simultaneous(target, sender, inbound, &mut deadline).await,
        Strategy::YouInitiate => you_initiate(target, sender, inbound, &mut deadline).await,
        Strategy::PeerInitiates => peer_initiates(sender, inbound, &mut deadline).await,
        Strategy::Relay => None,
    }
}

fn random_challenge() -> [u8; 16] {
    let mut challenge = [0u8; 16];
    rand::rng().fill_bytes(&mut challenge);
    challenge
}

async fn simultaneous(
    target: SocketAddr,
    sender: &dyn ProbeSender,
    inbound: &mut mpsc::Receiver<InboundProbe>,
    deadline: &mut (impl std::future::Future<Output = ()> + Unpin),
) -> Option<SocketAddr> {
    let mut ticker = interval(PROBE_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut *deadline => return None,
            _ = ticker.tick() => {
                sender.send_probe(target, &random_challenge());
            }
            probe = inbound.recv() => {
                let Some(probe) = probe else { return None };
                return Some(probe.from);
            }
        }
    }
}

/// The symmetric side: sends a burst across a small prediction window of
/// candidate ports around the reported endpoint, since a symmetric NAT
/// assigns a fresh external port per destination and the real one may land
/// a few ports away from what the rendezvous server last observed.
async fn you_initiate(
    target: SocketAddr,
    sender: &dyn ProbeSender,
    inbound: &mut mpsc::Receiver<InboundProbe>,
    deadline: &mut (impl std::future::Future<Output = ()> + Unpin),
) -> Option<SocketAddr> {
    for delta in -PREDICTION_WINDOW..=PREDICTION_WINDOW {
        let port = (target.port() as i32 + delta).clamp(1, u16::MAX as i32) as u16;
        let candidate = SocketAddr::new(target.ip(), port);
        sender.send_probe(candidate, &random_challenge());
    }

    tokio::select! {
        _ = &mut *deadline => None,
        probe = inbound.recv() => probe.map(|p| p.from),
    }
}

/// The cone side: waits to receive first. The probe's arrival carries the
/// symmetric peer's real mapped endpoint, so replying on that observed
/// source address is enough to complete the punch.
async fn peer_initiates(
    sender: &dyn ProbeSender,
    inbound: &mut mpsc::Receiver<InboundProbe>,
    deadline: &mut (impl std::future::Future<Output = ()> + Unpin),
) -> Option<SocketAddr> {
    tokio::select! {
        _ = &mut *deadline => None,
        probe = inbound.recv() => {
            let probe = probe?;
            sender.send_probe(probe.from, &probe.challenge);
            Some(probe.from)
        }
    }
}
