//! Torrent file parser
//!
//! Handles parsing of .torrent files and extracting metadata.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, error, info, trace};

use crate::bencode::{self, Value};
use crate::torrent::error::ParseError;
use crate::torrent::info::{TorrentFile, TorrentInfo, MAX_PIECE_LENGTH};

/// Parser for .torrent files
pub struct TorrentParser;

impl TorrentParser {
    /// Parse a .torrent file from bytes
    pub fn parse_bytes(data: &[u8]) -> Result<TorrentFile, ParseError> {
        info!("Parsing torrent descriptor from {} bytes", data.len());

        let root = bencode::decode(data).map_err(|e| {
            error!("Torrent descriptor is not valid bencode: {}", e);
            ParseError::Decode(e)
        })?;

        let announce = Self::string_field(&root, "announce")?;
        let info_value = root.get(b"info").ok_or(ParseError::MissingField("info"))?;
        if info_value.as_dict().is_none() {
            return Err(ParseError::InvalidField {
                field: "info",
                expected: "dictionary",
            });
        }

        let info = Self::parse_info(info_value)?;

        // Hash the bytes exactly as they appear in the file.
        let raw_info = bencode::find_raw_value(data, b"info")?.ok_or(ParseError::MissingField("info"))?;
        trace!("Raw info dictionary spans {} bytes", raw_info.len());
        let info_hash = TorrentFile::generate_info_hash(raw_info);

        debug!(
            "Parsed torrent '{}': {} bytes, {} pieces of {} bytes",
            info.name,
            info.length,
            info.piece_count(),
            info.piece_length
        );
        info!("Info hash: {}", hex::encode(info_hash));

        Ok(TorrentFile {
            announce,
            info_hash,
            info,
        })
    }

    /// Parse a .torrent file from a file path
    pub fn parse_file(path: &Path) -> Result<TorrentFile> {
        info!("Loading torrent file from: {}", path.display());

        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read torrent file '{}'", path.display()))?;

        debug!("Read {} bytes from torrent file", data.len());
        let torrent = Self::parse_bytes(&data)
            .with_context(|| format!("Failed to parse torrent file '{}'", path.display()))?;
        Ok(torrent)
    }

    fn parse_info(info: &Value) -> Result<TorrentInfo, ParseError> {
        let name = Self::string_field(info, "name")?;
        let length = Self::positive_field(info, "length")?;
        let piece_length = Self::positive_field(info, "piece length")?;
        if piece_length > MAX_PIECE_LENGTH {
            error!("Piece length {} exceeds the {} byte limit", piece_length, MAX_PIECE_LENGTH);
            return Err(ParseError::InvalidField {
                field: "piece length",
                expected: "piece length of at most 1 GiB",
            });
        }

        let pieces = info
            .get(b"pieces")
            .ok_or(ParseError::MissingField("pieces"))?
            .as_bytes()
            .ok_or(ParseError::InvalidField {
                field: "pieces",
                expected: "byte string",
            })?;
        let piece_hashes = TorrentInfo::parse_piece_hashes(pieces)?;

        let info = TorrentInfo {
            name,
            piece_length,
            length,
            piece_hashes,
        };

        let expected = info.expected_piece_count();
        if expected != info.piece_count() as u64 {
            error!(
                "Piece count mismatch: length implies {} pieces, found {} hashes",
                expected,
                info.piece_count()
            );
            return Err(ParseError::PieceCountMismatch {
                expected,
                found: info.piece_count(),
            });
        }

        Ok(info)
    }

    fn string_field(dict: &Value, field: &'static str) -> Result<String, ParseError> {
        let value = dict
            .get(field.as_bytes())
            .ok_or(ParseError::MissingField(field))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or(ParseError::InvalidField {
                field,
                expected: "UTF-8 string",
            })
    }

    fn positive_field(dict: &Value, field: &'static str) -> Result<u64, ParseError> {
        let value = dict
            .get(field.as_bytes())
            .ok_or(ParseError::MissingField(field))?;
        value
            .as_u64()
            .filter(|&n| n > 0)
            .ok_or(ParseError::InvalidField {
                field,
                expected: "positive integer",
            })
    }
}
