//! Torrent descriptor module
//!
//! Parses `.torrent` files into an immutable model and computes the info-hash.

pub mod error;
pub mod info;
pub mod parser;

pub use error::ParseError;
pub use info::{TorrentFile, TorrentInfo, HASH_LENGTH, MAX_PIECE_LENGTH};
pub use parser::TorrentParser;
