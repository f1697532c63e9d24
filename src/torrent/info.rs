//! Torrent information structures
//!
//! The parsed `info` dictionary and the descriptor built around it.

use sha1::{Digest, Sha1};

use crate::torrent::error::ParseError;

/// Length of a SHA1 digest in bytes
pub const HASH_LENGTH: usize = 20;

/// Largest accepted `piece length` (1 GiB); keeps block offsets within the
/// 32-bit fields of REQUEST and PIECE messages
pub const MAX_PIECE_LENGTH: u64 = 1 << 30;

/// Contents of the `info` dictionary of a single-file torrent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    /// Suggested file name
    pub name: String,
    /// Size of each piece in bytes (the final piece may be shorter)
    pub piece_length: u64,
    /// Total file size in bytes
    pub length: u64,
    /// Expected SHA1 of every piece, in piece order
    pub piece_hashes: Vec<[u8; HASH_LENGTH]>,
}

impl TorrentInfo {
    /// Number of pieces
    pub fn piece_count(&self) -> usize {
        self.piece_hashes.len()
    }

    /// Expected hash of a piece
    pub fn piece_hash(&self, index: usize) -> Option<[u8; HASH_LENGTH]> {
        self.piece_hashes.get(index).copied()
    }

    /// Absolute byte offset of a piece in the output file
    pub fn piece_offset(&self, index: usize) -> u64 {
        index as u64 * self.piece_length
    }

    /// Exact size of a piece, accounting for a shorter final piece
    pub fn piece_size(&self, index: usize) -> Option<u64> {
        if index >= self.piece_hashes.len() {
            return None;
        }
        let start = self.piece_offset(index);
        Some(self.piece_length.min(self.length.saturating_sub(start)))
    }

    /// Number of pieces implied by the declared length and piece length
    pub fn expected_piece_count(&self) -> u64 {
        if self.piece_length == 0 {
            return 0;
        }
        self.length.div_ceil(self.piece_length)
    }

    /// Split the concatenated `pieces` string into 20-byte hashes
    pub fn parse_piece_hashes(pieces: &[u8]) -> Result<Vec<[u8; HASH_LENGTH]>, ParseError> {
        if pieces.len() % HASH_LENGTH != 0 {
            return Err(ParseError::MalformedPieces(pieces.len()));
        }

        Ok(pieces
            .chunks_exact(HASH_LENGTH)
            .map(|chunk| {
                let mut hash = [0u8; HASH_LENGTH];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect())
    }
}

/// A parsed torrent descriptor.
///
/// Created once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    /// Tracker announce URL
    pub announce: String,
    /// SHA1 of the bencoded `info` dictionary
    pub info_hash: [u8; HASH_LENGTH],
    /// The `info` dictionary
    pub info: TorrentInfo,
}

impl TorrentFile {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Total size of the content in bytes
    pub fn total_size(&self) -> u64 {
        self.info.length
    }

    pub fn piece_length(&self) -> u64 {
        self.info.piece_length
    }

    pub fn piece_count(&self) -> usize {
        self.info.piece_count()
    }

    pub fn piece_hash(&self, index: usize) -> Option<[u8; HASH_LENGTH]> {
        self.info.piece_hash(index)
    }

    pub fn piece_size(&self, index: usize) -> Option<u64> {
        self.info.piece_size(index)
    }

    /// Info hash as a hex string
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }

    /// SHA1 of the raw `info` dictionary bytes
    pub fn generate_info_hash(info_dict_bytes: &[u8]) -> [u8; HASH_LENGTH] {
        let mut hasher = Sha1::new();
        hasher.update(info_dict_bytes);
        hasher.finalize().into()
    }
}
