use std::{fs::read_to_string, net::SocketAddr, str::FromStr};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use url::Url;

/// A 32-byte network secret, shared by every member of a network.
#[derive(Clone)]
pub struct NetworkKey(pub [u8; 32]);

impl<'de> Deserialize<'de> for NetworkKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let encoded = String::deserialize(deserializer)?;
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &encoded)
            .map_err(D::Error::custom)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("network-key must decode to exactly 32 bytes"))?;
        Ok(Self(array))
    }
}

impl std::fmt::Debug for NetworkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NetworkKey(..)")
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    pub network_id: String,
    pub network_key: NetworkKey,
    #[serde(default)]
    pub bootstrap_peers: Vec<SocketAddr>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityConfig {
    ///
    /// Path to a raw 32-byte private key file. The core only ever reads
    /// this file; it never creates, rotates or persists identity material.
    ///
    pub private_key_path: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TransportConfig {
    #[serde(default = "TransportConfig::bind")]
    pub bind: SocketAddr,
    ///
    /// At least two STUN endpoints are required for NAT classification
    /// (spec §4.2 probes two different servers from the same socket).
    ///
    pub stun_servers: Vec<SocketAddr>,
    pub rendezvous: Vec<Url>,
    #[serde(default = "TransportConfig::max_frame")]
    pub max_frame: usize,
}

impl TransportConfig {
    fn bind() -> SocketAddr {
        "0.0.0.0:0".parse().unwrap()
    }

    fn max_frame() -> usize {
        1400
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TimeoutsConfig {
    #[serde(default = "TimeoutsConfig::signaling_request_secs")]
    pub signaling_request_secs: u64,
    #[serde(default = "TimeoutsConfig::stun_probe_secs")]
    pub stun_probe_secs: u64,
    #[serde(default = "TimeoutsConfig::stun_probe_tries")]
    pub stun_probe_tries: u32,
    #[serde(default = "TimeoutsConfig::hole_punch_deadline_secs")]
    pub hole_punch_deadline_secs: u64,
    #[serde(default = "TimeoutsConfig::warm_relay_keepalive_secs")]
    pub warm_relay_keepalive_secs: u64,
    #[serde(default = "TimeoutsConfig::relay_session_ttl_secs")]
    pub relay_session_ttl_secs: u64,
    #[serde(default = "TimeoutsConfig::stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "TimeoutsConfig::path_probe_secs")]
    pub path_probe_secs: u64,
}

impl TimeoutsConfig {
    fn signaling_request_secs() -> u64 {
        10
    }

    fn stun_probe_secs() -> u64 {
        3
    }

    fn stun_probe_tries() -> u32 {
        3
    }

    fn hole_punch_deadline_secs() -> u64 {
        8
    }

    fn warm_relay_keepalive_secs() -> u64 {
        15
    }

    fn relay_session_ttl_secs() -> u64 {
        300
    }

    fn stale_after_secs() -> u64 {
        30
    }

    /// Cadence of the path manager's probe ticker (spec §4.6's "send an
    /// authenticated keepalive"). Shorter than `stale_after_secs` so a
    /// broken active path demotes well before the peer is declared stale.
    fn path_probe_secs() -> u64 {
        5
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            signaling_request_secs: Self::signaling_request_secs(),
            stun_probe_secs: Self::stun_probe_secs(),
            stun_probe_tries: Self::stun_probe_tries(),
            hole_punch_deadline_secs: Self::hole_punch_deadline_secs(),
            warm_relay_keepalive_secs: Self::warm_relay_keepalive_secs(),
            relay_session_ttl_secs: Self::relay_session_ttl_secs(),
            stale_after_secs: Self::stale_after_secs(),
            path_probe_secs: Self::path_probe_secs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub network: NetworkConfig,
    pub identity: IdentityConfig,
    pub transport: TransportConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Parser, Debug)]
#[command(about = "mesh transport instance", version)]
struct Cli {
    ///
    /// Specify the configuration file path.
    ///
    /// Example: mesh-host --config /etc/mesh/config.toml
    ///
    #[arg(long, short)]
    config: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(toml::from_str::<Self>(&read_to_string(&Cli::parse().config)?)?)
    }

    pub fn from_path(path: &str) -> Result<Self> {
        Ok(toml::from_str::<Self>(&read_to_string(path)?)?)
    }
}
