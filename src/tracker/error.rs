//! Tracker error types

use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors raised while announcing to a tracker
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("invalid announce url: {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("bencode error: {0}")]
    Decode(#[from] BencodeError),

    #[error("tracker returned failure: {0}")]
    Failure(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("compact peer list length {0} is not a multiple of 6")]
    MalformedPeerList(usize),
}
