use std::{net::SocketAddr, time::Duration};

use tokio::net::UdpSocket;

use super::{NatClass, stun_client::bind_request};
use crate::error::Result;

/// Probes two different STUN servers from the same local socket and
/// classifies the NAT. Misclassification is tolerated by every caller
/// (spec §4.2): this only drives a strategy *preference*. Also returns the
/// reflexive endpoint the first server observed, for `report-endpoint`.
pub async fn classify(
    socket: &UdpSocket,
    servers: &[SocketAddr],
    tries: u32,
    per_try_timeout: Duration,
) -> Result<(NatClass, Option<SocketAddr>)> {
    assert!(servers.len() >= 2, "NAT classification needs two STUN servers");

    let local_addr = socket.local_addr()?;

    let a = bind_request(socket, servers[0], tries, per_try_timeout).await?;
    let b = bind_request(socket, servers[1], tries, per_try_timeout).await?;
    let reflexive = a.or(b);

    let class = match (a, b) {
        (Some(a), Some(b)) if a == b && a.port() == local_addr.port() => NatClass::Public,
        (Some(a), Some(b)) if a == b => NatClass::Cone,
        (Some(_), Some(_)) => NatClass::Symmetric,
        // Either probe timed out; default to the conservative assumption so
        // the path manager always keeps a warm relay around.
        _ => NatClass::Symmetric,
    };

    Ok((class, reflexive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_labels_are_stable() {
        assert_eq!(NatClass::Public.as_str(), "public");
        assert_eq!(NatClass::Cone.as_str(), "cone");
        assert_eq!(NatClass::Symmetric.as_str(), "symmetric");
    }
}
