use std::fmt;

/// Caller-facing error taxonomy (spec §7). Packet-path failures never reach
/// here — they are only observable through peer state transitions and
/// counters; this enum is for the results of `start`, `connect`, `ping` and
/// `send_on_channel`.
#[derive(Debug)]
pub enum Error {
    /// Signaling rejected a request, or the target peer is simply unknown.
    PeerUnreachable(String),
    /// The signaling connection is down and the caller's deadline expired.
    SignalingUnavailable,
    /// The peer is on an administrator block list.
    Blocked,
    /// A send buffer is full.
    Backpressure,
    /// Too many open peers, or another resource ceiling was hit.
    ResourceExhausted,
    /// Startup-time failure: bad config, bad identity, bind failure.
    Io(std::io::Error),
    Config(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerUnreachable(reason) => write!(f, "peer unreachable: {reason}"),
            Self::SignalingUnavailable => write!(f, "signaling unavailable"),
            Self::Blocked => write!(f, "peer blocked"),
            Self::Backpressure => write!(f, "backpressure"),
            Self::ResourceExhausted => write!(f, "resource exhausted"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
