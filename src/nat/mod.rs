//! STUN client and NAT classifier (spec §4.2).

pub mod classifier;
pub mod stun_client;

pub use classifier::classify;
pub use stun_client::bind_request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatClass {
    Public,
    Cone,
    Symmetric,
}

impl NatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Cone => "cone",
            Self::Symmetric => "symmetric",
        }
    }
}
