//! Bencode errors

use thiserror::Error;

/// Errors produced while decoding bencode input.
///
/// Every variant carries the byte offset at which decoding stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BencodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("invalid integer at byte {position}: {reason}")]
    InvalidInteger { position: usize, reason: String },

    #[error("invalid byte string length at byte {0}")]
    InvalidStringLength(usize),

    #[error("unexpected byte 0x{byte:02x} at byte {position}")]
    UnexpectedByte { byte: u8, position: usize },

    #[error("trailing data after value at byte {0}")]
    TrailingData(usize),

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("dictionary key at byte {0} is not a byte string")]
    NonStringKey(usize),
}
