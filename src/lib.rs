//! irony-leech
//!
//! A leech-only BitTorrent client for single-file torrents: bencode codec,
//! HTTP tracker announces, rarest-first piece scheduling and one async
//! session per peer.

pub mod bencode;
pub mod cli;
pub mod client;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod storage;
pub mod torrent;
pub mod tracker;

pub use error::TorrentError;

pub use bencode::{decode, encode, BencodeError, Value};
pub use cli::{CliArgs, Config, DownloadStats, ProgressDisplay};
pub use client::{ClientConfig, TorrentClient};
pub use peer::{Connector, PeerInfo, PeerMessage, PeerQueue, PeerSession, SessionConfig, SessionState, TcpConnector};
pub use protocol::{Handshake, Message, MessageId};
pub use storage::{BlockOutcome, BlockRequest, ManagerError, Piece, PieceManager, ProgressSnapshot};
pub use torrent::{ParseError, TorrentFile, TorrentInfo, TorrentParser};
#[cfg(feature = "http")]
pub use tracker::ReqwestHttp;
pub use tracker::{AnnounceRequest, AnnounceResponse, HttpGet, HttpResponse, TrackerClient, TrackerError};
