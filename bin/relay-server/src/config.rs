use std::{fs::read_to_string, net::SocketAddr};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "Config::listen")]
    pub listen: SocketAddr,
    #[serde(default = "Config::session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub log: mesh::config::LogConfig,
}

impl Config {
    fn listen() -> SocketAddr {
        "0.0.0.0:9100".parse().unwrap()
    }

    fn session_ttl_secs() -> u64 {
        300
    }

    pub fn load() -> Result<Self> {
        Ok(toml::from_str::<Self>(&read_to_string(&Cli::parse().config)?)?)
    }
}

#[derive(Parser, Debug)]
#[command(about = "mesh relay server", version)]
struct Cli {
    #[arg(long, short)]
    config: String,
}
