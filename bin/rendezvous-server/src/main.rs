mod config;
mod connection;
mod pending;
mod registry;

use std::{sync::Arc, time::Duration};

use config::Config;
use connection::Connection;
use pending::PendingRequests;
use registry::Registry;
use tokio::{net::TcpListener, time::interval};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    let registry = Arc::new(Registry::new());
    let pending = Arc::new(PendingRequests::new());

    spawn_sweepers(registry.clone(), pending.clone(), config.clone());

    let listener = TcpListener::bind(config.listen).await?;
    log::info!("rendezvous server listening on {}", config.listen);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let registry = registry.clone();
        let pending = pending.clone();
        let config = config.clone();

        tokio::spawn(async move {
            if let Err(e) = Connection::accept(stream, peer_addr, registry, pending, config).await {
                log::warn!("rendezvous: connection from {peer_addr} ended with error: {e}");
            }
        });
    }
}

fn spawn_sweepers(registry: Arc<Registry>, pending: Arc<PendingRequests>, config: Arc<Config>) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(30));
        let stale_after = Duration::from_secs(config.stale_after_secs);
        let pending_ttl = Duration::from_secs(config.pending_request_ttl_secs);

        loop {
            ticker.tick().await;
            registry.sweep_stale(stale_after);
            pending.sweep_expired(pending_ttl);
        }
    });
}
