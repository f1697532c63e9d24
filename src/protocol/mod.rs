//! BitTorrent protocol module
//!
//! Handshake, message model and length-prefixed framing of the peer wire
//! protocol.

pub mod error;
pub mod handshake;
pub mod message;
pub mod wire;

pub use error::{HandshakeError, ProtocolError};
pub use handshake::{Handshake, HANDSHAKE_LENGTH, PROTOCOL_LENGTH, PROTOCOL_STRING};
pub use message::{Message, MessageId};
pub use wire::{read_handshake, read_message, write_handshake, write_message, MAX_FRAME_LENGTH};
