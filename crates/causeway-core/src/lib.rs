//! causeway-core — shared types: wire format, configuration, id generation.
//! All other Causeway crates depend on this one.

pub mod config;
pub mod id;
pub mod wire;

pub use wire::{PeerMessage, PeerMessageType, ServerMessage, ServerMessageType};
