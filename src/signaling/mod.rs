pub mod client;
pub mod protocol;

pub use client::RendezvousClient;
pub use protocol::{ClientMessage, ServerMessage, Strategy, assign_strategy};
