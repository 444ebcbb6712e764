use chacha20poly1305::{
    AeadCore, ChaCha20Poly1305, KeyInit,
    aead::{Aead, Payload},
};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::{Error, NONCE_LEN, PEER_ID_LEN};

/// Header layout, in wire order.
const MAGIC: [u8; 2] = *b"ME";
const VERSION: u8 = 1;
const COUNTER_LEN: usize = 8;
const NONCE_SALT_LEN: usize = 4;
const HEADER_LEN: usize = MAGIC.len() + 1 + 1 + PEER_ID_LEN + COUNTER_LEN + NONCE_SALT_LEN;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flags {
    Data = 0,
    ControlHandshake = 1,
    ControlHolepunchProbe = 2,
    Keepalive = 3,
}

impl TryFrom<u8> for Flags {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Data,
            1 => Self::ControlHandshake,
            2 => Self::ControlHolepunchProbe,
            3 => Self::Keepalive,
            _ => return Err(Error::InvalidFormat),
        })
    }
}

/// Picks the HKDF info label so inbound and outbound traffic never share a
/// key, which rules out reflection attacks against a single peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn tag(&self) -> &'static [u8] {
        match self {
            Self::Outbound => b"out",
            Self::Inbound => b"in",
        }
    }

    /// The peer-local mirror of this direction: what I send, they receive.
    pub fn peer_side(&self) -> Self {
        match self {
            Self::Outbound => Self::Inbound,
            Self::Inbound => Self::Outbound,
        }
    }
}

/// Derives a 32-byte ChaCha20-Poly1305 key from the network's shared secret.
///
/// # Test
///
/// ```
/// use mesh_codec::envelope::{derive_key, Direction};
///
/// let network_key = [7u8; 32];
/// let out = derive_key(&network_key, Direction::Outbound);
/// let inb = derive_key(&network_key, Direction::Inbound);
///
/// assert_ne!(out, inb);
/// ```
pub fn derive_key(network_key: &[u8; 32], direction: Direction) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, network_key);
    let mut info = Vec::with_capacity(14 + 3);
    info.extend_from_slice(b"omerta-mesh-v1");
    info.extend_from_slice(direction.tag());

    let mut okm = [0u8; 32];
    hk.expand(&info, &mut okm)
        .expect("32 is a valid Sha256 HKDF output length");
    okm
}

pub struct Opened {
    pub flags: Flags,
    pub sender_id: [u8; PEER_ID_LEN],
    pub counter: u64,
    pub plaintext: Vec<u8>,
}

/// Seals `plaintext` into the wire envelope, appending it to `out`.
///
/// # Test
///
/// ```
/// use mesh_codec::envelope::{derive_key, open, seal, Direction, Flags};
///
/// let key = [1u8; 32];
/// let send_key = derive_key(&key, Direction::Outbound);
/// let recv_key = derive_key(&key, Direction::Outbound);
/// let sender = [9u8; 32];
///
/// let mut wire = Vec::new();
/// seal(&send_key, Flags::Data, &sender, 1, b"hello", &mut wire).unwrap();
///
/// let opened = open(&recv_key, &wire).unwrap();
/// assert_eq!(opened.plaintext, b"hello");
/// assert_eq!(opened.counter, 1);
/// assert_eq!(opened.sender_id, sender);
/// ```
pub fn seal(
    key: &[u8; 32],
    flags: Flags,
    sender_id: &[u8; PEER_ID_LEN],
    counter: u64,
    plaintext: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    out.clear();
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.push(flags as u8);
    out.extend_from_slice(sender_id);
    out.extend_from_slice(&counter.to_be_bytes());

    let nonce = ChaCha20Poly1305::generate_nonce();
    out.extend_from_slice(&nonce[..NONCE_SALT_LEN]);

    let cipher = ChaCha20Poly1305::new(key.into());
    let mut full_nonce = [0u8; NONCE_LEN];
    full_nonce[..NONCE_SALT_LEN].copy_from_slice(&nonce[..NONCE_SALT_LEN]);
    full_nonce[NONCE_SALT_LEN..].copy_from_slice(&counter.to_be_bytes());

    let ciphertext = cipher
        .encrypt(
            &full_nonce.into(),
            Payload {
                msg: plaintext,
                aad: &out[..],
            },
        )
        .map_err(|_| Error::AuthFail)?;

    out.extend_from_slice(&ciphertext);
    Ok(())
}

/// Opens a wire envelope, verifying magic/version/AEAD tag.
///
/// Replay is not this function's concern (see [`crate::replay::Window`]); the
/// codec only ever returns `InvalidFormat` or `AuthFail` here.
pub fn open(key: &[u8; 32], bytes: &[u8]) -> Result<Opened, Error> {
    if bytes.len() < HEADER_LEN + TAG_LEN {
        return Err(Error::InvalidFormat);
    }

    if bytes[0..2] != MAGIC {
        return Err(Error::InvalidFormat);
    }

    if bytes[2] != VERSION {
        return Err(Error::InvalidFormat);
    }

    let flags = Flags::try_from(bytes[3])?;
    let sender_id: [u8; PEER_ID_LEN] = bytes[4..4 + PEER_ID_LEN].try_into()?;

    let counter_off = 4 + PEER_ID_LEN;
    let counter = u64::from_be_bytes(bytes[counter_off..counter_off + COUNTER_LEN].try_into()?);

    let salt_off = counter_off + COUNTER_LEN;
    let nonce_salt: [u8; NONCE_SALT_LEN] = bytes[salt_off..salt_off + NONCE_SALT_LEN].try_into()?;

    let header = &bytes[..HEADER_LEN];
    let ciphertext = &bytes[HEADER_LEN..];

    let mut full_nonce = [0u8; NONCE_LEN];
    full_nonce[..NONCE_SALT_LEN].copy_from_slice(&nonce_salt);
    full_nonce[NONCE_SALT_LEN..].copy_from_slice(&counter.to_be_bytes());

    let cipher = ChaCha20Poly1305::new(key.into());
    let plaintext = cipher
        .decrypt(
            &full_nonce.into(),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| Error::AuthFail)?;

    Ok(Opened {
        flags,
        sender_id,
        counter,
        plaintext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = derive_key(&[3u8; 32], Direction::Outbound);
        let sender = [5u8; 32];
        let mut wire = Vec::new();
        seal(&key, Flags::Keepalive, &sender, 42, b"", &mut wire).unwrap();

        let opened = open(&key, &wire).unwrap();
        assert_eq!(opened.flags, Flags::Keepalive);
        assert_eq!(opened.counter, 42);
        assert!(opened.plaintext.is_empty());
    }

    #[test]
    fn bitflip_in_header_fails_auth() {
        let key = derive_key(&[3u8; 32], Direction::Outbound);
        let sender = [5u8; 32];
        let mut wire = Vec::new();
        seal(&key, Flags::Data, &sender, 1, b"payload", &mut wire).unwrap();

        wire[6] ^= 0x01;
        assert!(matches!(open(&key, &wire), Err(Error::AuthFail)));
    }

    #[test]
    fn bitflip_in_ciphertext_fails_auth() {
        let key = derive_key(&[3u8; 32], Direction::Outbound);
        let sender = [5u8; 32];
        let mut wire = Vec::new();
        seal(&key, Flags::Data, &sender, 1, b"payload", &mut wire).unwrap();

        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        assert!(matches!(open(&key, &wire), Err(Error::AuthFail)));
    }

    #[test]
    fn wrong_key_fails_auth() {
        let key_a = derive_key(&[3u8; 32], Direction::Outbound);
        let key_b = derive_key(&[4u8; 32], Direction::Outbound);
        let sender = [5u8; 32];
        let mut wire = Vec::new();
        seal(&key_a, Flags::Data, &sender, 1, b"payload", &mut wire).unwrap();

        assert!(matches!(open(&key_b, &wire), Err(Error::AuthFail)));
    }
}
