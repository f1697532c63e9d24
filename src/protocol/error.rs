//! Protocol errors
//!
//! Both kinds are fatal to a single peer connection only.

use thiserror::Error;

/// Failures while exchanging the 68-byte handshake.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The peer closed the connection or sent fewer than 68 bytes
    #[error("no handshake response from peer")]
    NoResponse,

    #[error("peer does not speak the BitTorrent protocol (pstrlen {0})")]
    InvalidProtocol(u8),

    #[error("info hash mismatch: expected {expected}, peer sent {received}")]
    InfoHashMismatch { expected: String, received: String },

    #[error("handshake i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Violations of the message-level wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid message id {0}")]
    InvalidMessageId(u8),

    #[error("{kind} message too short: expected {expected} payload bytes, got {actual}")]
    MessageTooShort {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("frame of {0} bytes exceeds the maximum frame length")]
    MessageTooLarge(usize),

    #[error("frame length prefix {declared} does not match {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("expected {expected} message, received {received}")]
    UnexpectedMessage {
        expected: &'static str,
        received: &'static str,
    },

    #[error("unsupported message {0} for a download-only client")]
    UnsupportedMessage(&'static str),

    #[error("received block for piece {index} which is not being downloaded")]
    UnsolicitedBlock { index: u32 },

    #[error("piece {index} has no block at offset {offset}")]
    UnknownBlock { index: u32, offset: u32 },

    #[error("block {index}/{offset} should be {expected} bytes, got {actual}")]
    BlockLengthMismatch {
        index: u32,
        offset: u32,
        expected: u32,
        actual: usize,
    },

    #[error("piece index {0} is out of range")]
    InvalidPieceIndex(u32),
}
