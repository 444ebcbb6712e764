#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;
mod session;

use std::{io::ErrorKind::ConnectionReset, sync::Arc, time::Duration};

use config::Config;
use mesh::relay_client::{RelayError, TYPE_DATA, TYPE_KEEPALIVE, TYPE_REGISTER, decode};
use session::SessionTable;
use tokio::{net::UdpSocket, time::interval};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    let socket = Arc::new(UdpSocket::bind(config.listen).await?);
    let sessions = Arc::new(SessionTable::new());

    log::info!("relay server listening on {}", config.listen);

    for _ in 0..num_cpus::get() {
        tokio::spawn(worker(socket.clone(), sessions.clone()));
    }

    let mut ticker = interval(Duration::from_secs(30));
    let ttl = Duration::from_secs(config.session_ttl_secs);
    loop {
        ticker.tick().await;
        sessions.sweep_expired(ttl);
        log::debug!("relay: {} active sessions", sessions.len());
    }
}

/// One of `num_cpus::get()` identical workers sharing the same bound
/// socket, grounded on the teacher's `udp_server` worker-pool pattern.
async fn worker(socket: Arc<UdpSocket>, sessions: Arc<SessionTable>) {
    let mut buf = vec![0u8; 2048];

    loop {
        let (size, from) = match socket.recv_from(&mut buf).await {
            Ok(s) => s,
            Err(e) if e.kind() == ConnectionReset => continue,
            Err(e) => {
                log::error!("relay: socket recv error: {e}");
                break;
            }
        };

        let (kind, token, payload) = match decode(&buf[..size]) {
            Ok(parsed) => parsed,
            Err(RelayError::InvalidFormat) => continue,
        };

        match kind {
            TYPE_REGISTER => {
                let Some(peer_id) = payload.get(..32).and_then(|s| s.try_into().ok()) else {
                    continue;
                };
                sessions.register(token, peer_id, from);
            }
            TYPE_DATA => {
                // Forward the bare sealed envelope, not the relay framing:
                // the receiving peer's reactor sees identical bytes
                // whether a packet arrived directly or through a relay.
                if let Some(target) = sessions.forward_target(token, from) {
                    if let Err(e) = socket.send_to(payload, target).await {
                        if e.kind() != ConnectionReset {
                            log::warn!("relay: forward to {target} failed: {e}");
                        }
                    }
                }
            }
            TYPE_KEEPALIVE => {
                sessions.touch(token);
            }
            _ => {}
        }
    }
}
