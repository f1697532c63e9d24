//! Error types for the leech client
//!
//! `TorrentError` is the crate-wide error that the orchestration layers
//! report. Each component also has a typed error (`BencodeError`,
//! `ParseError`, `TrackerError`, `HandshakeError`, `ProtocolError`,
//! `ManagerError`) which converts into it.

use std::fmt;

use crate::bencode::BencodeError;
use crate::protocol::{HandshakeError, ProtocolError};
use crate::storage::ManagerError;
use crate::tracker::TrackerError as AnnounceError;

/// Comprehensive error type for torrent operations
#[derive(Debug, Clone)]
pub enum TorrentError {
    /// Torrent file parsing errors
    ParseError {
        message: String,
        source: Option<String>,
    },

    /// BitTorrent protocol errors
    ProtocolError {
        message: String,
        source: Option<String>,
    },

    /// File I/O and storage errors
    StorageError {
        message: String,
        path: Option<String>,
        source: Option<String>,
    },

    /// Tracker announce errors
    TrackerError {
        message: String,
        url: Option<String>,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },

    /// Network errors
    NetworkError {
        message: String,
        address: Option<String>,
        source: Option<String>,
    },

    /// Caller sequencing errors, such as using a peer that was never registered
    ValidationError {
        message: String,
        field: Option<String>,
    },
}

impl TorrentError {
    /// Create a new ParseError
    pub fn parse_error(message: impl Into<String>) -> Self {
        TorrentError::ParseError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new ParseError with source
    pub fn parse_error_with_source(message: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::ParseError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new ProtocolError with source
    pub fn protocol_error_with_source(message: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::ProtocolError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new StorageError with path and source
    pub fn storage_error_full(message: impl Into<String>, path: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::StorageError {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        TorrentError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new NetworkError
    pub fn network_error(message: impl Into<String>) -> Self {
        TorrentError::NetworkError {
            message: message.into(),
            address: None,
            source: None,
        }
    }

    /// Create a new NetworkError with address and source
    pub fn network_error_full(message: impl Into<String>, address: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::NetworkError {
            message: message.into(),
            address: Some(address.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ValidationError with field
    pub fn validation_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        TorrentError::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = context.into();
        let chain = |source: &mut Option<String>| {
            *source = Some(source.as_ref().map_or_else(|| ctx.clone(), |s| format!("{}: {}", s, ctx)));
        };
        match &mut self {
            TorrentError::ParseError { source, .. }
            | TorrentError::ProtocolError { source, .. }
            | TorrentError::StorageError { source, .. }
            | TorrentError::TrackerError { source, .. }
            | TorrentError::NetworkError { source, .. } => chain(source),
            TorrentError::ConfigError { .. } | TorrentError::ValidationError { .. } => {}
        }
        self
    }
}

impl fmt::Display for TorrentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentError::ParseError { message, source } => match source {
                Some(src) => write!(f, "Parse error: {} (source: {})", message, src),
                None => write!(f, "Parse error: {}", message),
            },
            TorrentError::ProtocolError { message, source } => match source {
                Some(src) => write!(f, "Protocol error: {} (source: {})", message, src),
                None => write!(f, "Protocol error: {}", message),
            },
            TorrentError::StorageError { message, path, source } => match (path, source) {
                (Some(p), Some(s)) => write!(f, "Storage error: {} (path: {}, source: {})", message, p, s),
                (Some(p), None) => write!(f, "Storage error: {} (path: {})", message, p),
                (None, Some(s)) => write!(f, "Storage error: {} (source: {})", message, s),
                (None, None) => write!(f, "Storage error: {}", message),
            },
            TorrentError::TrackerError { message, url, source } => match (url, source) {
                (Some(u), Some(s)) => write!(f, "Tracker error: {} (url: {}, source: {})", message, u, s),
                (Some(u), None) => write!(f, "Tracker error: {} (url: {})", message, u),
                (None, Some(s)) => write!(f, "Tracker error: {} (source: {})", message, s),
                (None, None) => write!(f, "Tracker error: {}", message),
            },
            TorrentError::ConfigError { message, field } => match field {
                Some(field_val) => write!(f, "Config error: {} (field: {})", message, field_val),
                None => write!(f, "Config error: {}", message),
            },
            TorrentError::NetworkError { message, address, source } => match (address, source) {
                (Some(a), Some(s)) => write!(f, "Network error: {} (address: {}, source: {})", message, a, s),
                (Some(a), None) => write!(f, "Network error: {} (address: {})", message, a),
                (None, Some(s)) => write!(f, "Network error: {} (source: {})", message, s),
                (None, None) => write!(f, "Network error: {}", message),
            },
            TorrentError::ValidationError { message, field } => match field {
                Some(field_val) => write!(f, "Validation error: {} (field: {})", message, field_val),
                None => write!(f, "Validation error: {}", message),
            },
        }
    }
}

impl std::error::Error for TorrentError {}

impl From<std::io::Error> for TorrentError {
    fn from(err: std::io::Error) -> Self {
        TorrentError::storage_error_full(err.to_string(), "unknown", err.kind().to_string())
    }
}

impl From<BencodeError> for TorrentError {
    fn from(err: BencodeError) -> Self {
        TorrentError::parse_error_with_source("Failed to decode bencode data", err.to_string())
    }
}

impl From<crate::torrent::ParseError> for TorrentError {
    fn from(err: crate::torrent::ParseError) -> Self {
        TorrentError::parse_error_with_source("Invalid torrent descriptor", err.to_string())
    }
}

impl From<AnnounceError> for TorrentError {
    fn from(err: AnnounceError) -> Self {
        TorrentError::TrackerError {
            message: "Announce failed".to_string(),
            url: None,
            source: Some(err.to_string()),
        }
    }
}

impl From<HandshakeError> for TorrentError {
    fn from(err: HandshakeError) -> Self {
        TorrentError::protocol_error_with_source("Handshake failed", err.to_string())
    }
}

impl From<ProtocolError> for TorrentError {
    fn from(err: ProtocolError) -> Self {
        TorrentError::protocol_error_with_source("Peer violated the wire protocol", err.to_string())
    }
}

impl From<ManagerError> for TorrentError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::UnknownPeer(peer) => {
                TorrentError::validation_error_with_field("Peer is not registered with the piece manager", peer)
            }
            ManagerError::Protocol(e) => e.into(),
            ManagerError::Storage(e) => e,
        }
    }
}

impl From<std::net::AddrParseError> for TorrentError {
    fn from(err: std::net::AddrParseError) -> Self {
        TorrentError::network_error_full("Failed to parse address", "unknown", err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for TorrentError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TorrentError::network_error("Operation timed out")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = TorrentError::parse_error("Invalid torrent file");
        assert_eq!(err.to_string(), "Parse error: Invalid torrent file");
    }

    #[test]
    fn test_parse_error_with_source() {
        let err = TorrentError::parse_error_with_source("Invalid torrent file", "bencode error");
        assert!(err.to_string().contains("Parse error"));
        assert!(err.to_string().contains("bencode error"));
    }

    #[test]
    fn test_network_error_display() {
        let err = TorrentError::network_error_full("Connection failed", "127.0.0.1:6881", "refused");
        assert!(err.to_string().contains("Network error"));
        assert!(err.to_string().contains("127.0.0.1:6881"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_from_tracker_error() {
        let err: TorrentError = AnnounceError::Failure("torrent not registered".into()).into();
        assert!(err.to_string().contains("Tracker error"));
        assert!(err.to_string().contains("torrent not registered"));
        assert!(matches!(err, TorrentError::TrackerError { .. }));
    }

    #[test]
    fn test_with_context() {
        let err = TorrentError::parse_error("Invalid data").with_context("while parsing torrent");
        assert!(err.to_string().contains("while parsing torrent"));

        let err = TorrentError::config_error_with_field("bad", "port").with_context("ignored");
        assert!(!err.to_string().contains("ignored"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: TorrentError = io_err.into();
        assert!(matches!(err, TorrentError::StorageError { .. }));
    }

    #[test]
    fn test_from_bencode_error() {
        let err: TorrentError = BencodeError::TrailingData(3).into();
        assert!(matches!(err, TorrentError::ParseError { .. }));
        assert!(err.to_string().contains("trailing data"));
    }

    #[test]
    fn test_from_manager_error() {
        let err: TorrentError = ManagerError::UnknownPeer("-RL0100-000000000000".to_string()).into();
        assert!(matches!(err, TorrentError::ValidationError { .. }));

        let err: TorrentError = ManagerError::Protocol(ProtocolError::UnsolicitedBlock { index: 4 }).into();
        assert!(matches!(err, TorrentError::ProtocolError { .. }));
        assert!(err.to_string().contains("4"));
    }

    #[test]
    fn test_from_handshake_error() {
        let err: TorrentError = HandshakeError::NoResponse.into();
        assert!(err.to_string().contains("Handshake failed"));
    }

    #[test]
    fn test_config_error_with_field() {
        let err = TorrentError::config_error_with_field("Invalid value", "max_connections");
        assert!(err.to_string().contains("Config error"));
        assert!(err.to_string().contains("max_connections"));
    }
}
