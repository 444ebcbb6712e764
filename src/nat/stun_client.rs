use std::{net::SocketAddr, time::Duration};

use codec::stun::{decode_binding_response, encode_binding_request};
use rand::RngCore;
use tokio::{net::UdpSocket, time::timeout};

use crate::error::{Error, Result};

/// Issues a Binding request to `server` from `socket`, retrying up to
/// `tries` times with `per_try_timeout`. Returns the reflexive endpoint the
/// server observed, or `None` if every try timed out.
pub async fn bind_request(
    socket: &UdpSocket,
    server: SocketAddr,
    tries: u32,
    per_try_timeout: Duration,
) -> Result<Option<SocketAddr>> {
    let mut transaction_id = [0u8; 12];

    for attempt in 0..tries {
        rand::rng().fill_bytes(&mut transaction_id);
        let request = encode_binding_request(&transaction_id);

        socket.send_to(&request, server).await?;

        let mut buf = [0u8; 512];
        let recv = timeout(per_try_timeout, socket.recv_from(&mut buf)).await;

        match recv {
            Ok(Ok((len, from))) if from == server => {
                if let Ok(addr) = decode_binding_response(&buf[..len], &transaction_id) {
                    return Ok(Some(addr));
                }
                log::debug!(
                    "stun: malformed binding response from {server} on attempt {attempt}"
                );
            }
            Ok(Ok((_, from))) => {
                log::debug!("stun: reply from unexpected source {from}, expected {server}");
            }
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => {
                log::debug!("stun: binding request to {server} timed out (attempt {attempt})");
            }
        }
    }

    Ok(None)
}
