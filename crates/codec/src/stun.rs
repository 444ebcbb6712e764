//! A minimal RFC 5389 Binding-transaction codec: just enough to issue a
//! Binding request and pull the `XOR-MAPPED-ADDRESS` out of the response.
//! Unlike a full STUN message library, this never needs to carry
//! authentication, fingerprints, or TURN attributes — the mesh's STUN usage
//! is a plain reflexive-address oracle (spec §4.2).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::Error;

const MAGIC_COOKIE: u32 = 0x2112_A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_RESPONSE: u16 = 0x0101;
const XOR_MAPPED_ADDRESS: u16 = 0x0020;

pub type TransactionId = [u8; 12];

/// Encodes a zero-attribute Binding request.
///
/// # Test
///
/// ```
/// use mesh_codec::stun::encode_binding_request;
///
/// let tx = [1u8; 12];
/// let req = encode_binding_request(&tx);
/// assert_eq!(req.len(), 20);
/// assert_eq!(&req[0..2], &[0x00, 0x01]);
/// ```
pub fn encode_binding_request(transaction_id: &TransactionId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(20);
    buf.extend_from_slice(&BINDING_REQUEST.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
    buf.extend_from_slice(transaction_id);
    buf
}

/// Decodes a Binding response, returning the reflexive endpoint carried in
/// its `XOR-MAPPED-ADDRESS` attribute.
///
/// # Test
///
/// ```
/// use mesh_codec::stun::{decode_binding_response, encode_binding_response_for_test};
///
/// let tx = [2u8; 12];
/// let addr = "203.0.113.9:51000".parse().unwrap();
/// let resp = encode_binding_response_for_test(&tx, addr);
///
/// let decoded = decode_binding_response(&resp, &tx).unwrap();
/// assert_eq!(decoded, addr);
/// ```
pub fn decode_binding_response(
    bytes: &[u8],
    transaction_id: &TransactionId,
) -> Result<SocketAddr, Error> {
    if bytes.len() < 20 {
        return Err(Error::InvalidFormat);
    }

    let msg_type = u16::from_be_bytes(bytes[0..2].try_into()?);
    if msg_type != BINDING_RESPONSE {
        return Err(Error::InvalidFormat);
    }

    let length = u16::from_be_bytes(bytes[2..4].try_into()?) as usize;
    let cookie = u32::from_be_bytes(bytes[4..8].try_into()?);
    if cookie != MAGIC_COOKIE {
        return Err(Error::InvalidFormat);
    }

    if &bytes[8..20] != transaction_id {
        return Err(Error::InvalidFormat);
    }

    if bytes.len() < 20 + length {
        return Err(Error::InvalidFormat);
    }

    let end = 20 + length;
    let mut pos = 20;

    while pos + 4 <= end {
        let attr_type = u16::from_be_bytes(bytes[pos..pos + 2].try_into()?);
        let attr_len = u16::from_be_bytes(bytes[pos + 2..pos + 4].try_into()?) as usize;
        let val_start = pos + 4;
        let val_end = val_start + attr_len;
        if val_end > end {
            return Err(Error::InvalidFormat);
        }

        if attr_type == XOR_MAPPED_ADDRESS {
            return parse_xor_mapped_address(&bytes[val_start..val_end], cookie, transaction_id);
        }

        let padding = (4 - attr_len % 4) % 4;
        pos = val_end + padding;
    }

    Err(Error::InvalidFormat)
}

fn parse_xor_mapped_address(
    buf: &[u8],
    cookie: u32,
    transaction_id: &TransactionId,
) -> Result<SocketAddr, Error> {
    if buf.len() < 4 {
        return Err(Error::InvalidFormat);
    }

    let family = buf[1];
    let xport = u16::from_be_bytes(buf[2..4].try_into()?);
    let port = xport ^ ((cookie >> 16) as u16);

    match family {
        0x01 => {
            if buf.len() < 8 {
                return Err(Error::InvalidFormat);
            }
            let xaddr = u32::from_be_bytes(buf[4..8].try_into()?);
            let addr = xaddr ^ cookie;
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(addr)), port))
        }
        0x02 => {
            if buf.len() < 20 {
                return Err(Error::InvalidFormat);
            }
            let mut xor_key = [0u8; 16];
            xor_key[0..4].copy_from_slice(&cookie.to_be_bytes());
            xor_key[4..16].copy_from_slice(transaction_id);

            let mut octets = [0u8; 16];
            for i in 0..16 {
                octets[i] = buf[4 + i] ^ xor_key[i];
            }
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => Err(Error::InvalidFormat),
    }
}

/// Test-only helper that builds a Binding response carrying a single
/// `XOR-MAPPED-ADDRESS` attribute, mirroring what a compliant STUN server
/// sends back. Exposed (not `#[cfg(test)]`) so the doctest above can use it
/// without depending on an external STUN server.
pub fn encode_binding_response_for_test(transaction_id: &TransactionId, addr: SocketAddr) -> Vec<u8> {
    let mut attr = Vec::new();
    attr.push(0);
    let family = match addr {
        SocketAddr::V4(_) => 0x01u8,
        SocketAddr::V6(_) => 0x02u8,
    };
    attr.push(family);

    let xport = addr.port() ^ ((MAGIC_COOKIE >> 16) as u16);
    attr.extend_from_slice(&xport.to_be_bytes());

    match addr {
        SocketAddr::V4(v4) => {
            let xaddr = u32::from_be_bytes(v4.ip().octets()) ^ MAGIC_COOKIE;
            attr.extend_from_slice(&xaddr.to_be_bytes());
        }
        SocketAddr::V6(v6) => {
            let mut xor_key = [0u8; 16];
            xor_key[0..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            xor_key[4..16].copy_from_slice(transaction_id);
            let octets = v6.ip().octets();
            for i in 0..16 {
                attr.push(octets[i] ^ xor_key[i]);
            }
        }
    }

    let mut buf = Vec::with_capacity(20 + 4 + attr.len());
    buf.extend_from_slice(&BINDING_RESPONSE.to_be_bytes());
    buf.extend_from_slice(&((4 + attr.len()) as u16).to_be_bytes());
    buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
    buf.extend_from_slice(transaction_id);
    buf.extend_from_slice(&XOR_MAPPED_ADDRESS.to_be_bytes());
    buf.extend_from_slice(&(attr.len() as u16).to_be_bytes());
    buf.extend_from_slice(&attr);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_transaction_id() {
        let tx = [3u8; 12];
        let other_tx = [4u8; 12];
        let resp = encode_binding_response_for_test(&tx, "198.51.100.1:4000".parse().unwrap());
        assert!(matches!(
            decode_binding_response(&resp, &other_tx),
            Err(Error::InvalidFormat)
        ));
    }

    #[test]
    fn round_trips_ipv6() {
        let tx = [5u8; 12];
        let addr: SocketAddr = "[2001:db8::1]:9999".parse().unwrap();
        let resp = encode_binding_response_for_test(&tx, addr);
        assert_eq!(decode_binding_response(&resp, &tx).unwrap(), addr);
    }
}
