//! Torrent parse errors

use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors raised while turning descriptor bytes into a [`TorrentFile`](super::TorrentFile).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed bencode: {0}")]
    Decode(#[from] BencodeError),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a valid {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("'pieces' length {0} is not a multiple of 20")]
    MalformedPieces(usize),

    #[error("expected {expected} pieces for the declared length, found {found} hashes")]
    PieceCountMismatch { expected: u64, found: usize },
}
