//! Envelope codec and a minimal STUN binding-transaction codec.
//!
//! The envelope is the only datagram shape the mesh ever puts on the wire,
//! whether it travels directly or through a relay:
//!
//! `magic(2) | version(1) | flags(1) | sender_id(32) | counter(8) | nonce_salt(4) | ciphertext+tag`
//!
//! AEAD is ChaCha20-Poly1305. The nonce is `nonce_salt || counter`, which is
//! exactly 12 bytes and therefore needs no truncation of either field. AAD is
//! the clear header (everything before the ciphertext).

pub mod envelope;
pub mod replay;
pub mod stun;

use std::{array::TryFromSliceError, fmt};

#[derive(Debug)]
pub enum Error {
    InvalidFormat,
    AuthFail,
    Replay,
    UnknownSender,
    BufferTooSmall,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(_: TryFromSliceError) -> Self {
        Self::InvalidFormat
    }
}

pub const PEER_ID_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
