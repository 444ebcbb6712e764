//! A peer-to-peer NAT-traversal mesh transport.
//!
//! [`MeshInstance`] is the only type a hosting process needs: it binds a
//! UDP socket, classifies the local NAT, registers with a rendezvous
//! server and keeps every known peer's candidate paths warm. Traffic is
//! sent and received on named channels via [`observer::ChannelHandler`].

pub mod channel;
pub mod config;
pub mod error;
pub mod holepunch;
pub mod instance;
pub mod nat;
pub mod observer;
pub mod path;
pub mod reactor;
pub mod relay_client;
pub mod signaling;
pub mod stats;

pub use config::Config;
pub use error::{Error, Result};
pub use instance::MeshInstance;
pub use observer::{ChannelHandler, MeshObserver, NoopObserver};

use std::sync::Arc;

/// Loads configuration from the CLI-specified path and starts a mesh
/// instance, mirroring the teacher's top-level `startup` entry point for
/// hosting binaries that don't need finer control than "read a config
/// file and run".
pub async fn startup(observer: Arc<dyn MeshObserver>) -> anyhow::Result<MeshInstance> {
    let config = Config::load()?;
    simple_logger::init_with_level(config.log.level.as_level())?;
    Ok(MeshInstance::start(config, observer).await?)
}
