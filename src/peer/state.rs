//! Peer state module
//!
//! Defines peer information and session state tracking.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Size of one compact peer record: IPv4 address plus port
pub const COMPACT_PEER_LENGTH: usize = 6;

/// Position of a peer session in the wire-protocol lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection yet
    #[default]
    Disconnected,
    /// Handshake sent, waiting for the reply
    Handshaking,
    /// Waiting for the peer's bitfield
    BitfieldExchange,
    /// Bitfield registered, sending INTERESTED
    Interested,
    /// Main message loop
    Steady,
    /// Connection finished or aborted
    Closed,
}

impl SessionState {
    /// Check if the session has passed the handshake and is still open
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionState::BitfieldExchange | SessionState::Interested | SessionState::Steady
        )
    }

    /// Check if the session can issue block requests
    pub fn can_request(&self) -> bool {
        matches!(self, SessionState::Steady)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Handshaking => "handshaking",
            SessionState::BitfieldExchange => "bitfield-exchange",
            SessionState::Interested => "interested",
            SessionState::Steady => "steady",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Information about a peer announced by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub addr: SocketAddr,
    pub peer_id: Option<[u8; 20]>,
}

impl PeerInfo {
    /// Create a new peer info
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, peer_id: None }
    }

    /// Create a new peer info with peer ID
    pub fn with_peer_id(addr: SocketAddr, peer_id: [u8; 20]) -> Self {
        Self {
            addr,
            peer_id: Some(peer_id),
        }
    }

    /// Decode a 6-byte compact record (big-endian IPv4 then big-endian port)
    pub fn from_compact(record: &[u8; COMPACT_PEER_LENGTH]) -> Self {
        let ip = Ipv4Addr::new(record[0], record[1], record[2], record[3]);
        let port = u16::from_be_bytes([record[4], record[5]]);
        Self::new(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    }

    /// Get the peer ID as a hex string
    pub fn peer_id_hex(&self) -> Option<String> {
        self.peer_id.map(hex::encode)
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}
