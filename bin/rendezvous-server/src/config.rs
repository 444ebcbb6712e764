use std::{fs::read_to_string, net::SocketAddr};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "Config::listen")]
    pub listen: SocketAddr,
    /// Address handed out in `relay-assigned` replies. The rendezvous
    /// server only brokers the handshake; it never runs relay traffic
    /// itself (that's `relay-server`'s job).
    pub relay_endpoint: SocketAddr,
    #[serde(default = "Config::stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "Config::pending_request_ttl_secs")]
    pub pending_request_ttl_secs: u64,
    #[serde(default)]
    pub log: mesh::config::LogConfig,
}

impl Config {
    fn listen() -> SocketAddr {
        "0.0.0.0:9000".parse().unwrap()
    }

    fn stale_after_secs() -> u64 {
        300
    }

    fn pending_request_ttl_secs() -> u64 {
        30
    }

    pub fn load() -> Result<Self> {
        Ok(toml::from_str::<Self>(&read_to_string(&Cli::parse().config)?)?)
    }
}

#[derive(Parser, Debug)]
#[command(about = "mesh rendezvous server", version)]
struct Cli {
    #[arg(long, short)]
    config: String,
}
