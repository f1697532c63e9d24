//! Peer module
//!
//! Peer records, the queue feeding them to workers, and the per-connection
//! protocol session.

pub mod queue;
pub mod session;
pub mod state;
pub mod worker;

// Re-export main types
pub use queue::{PeerMessage, PeerQueue};
pub use session::{PeerSession, SessionConfig, DEFAULT_PIPELINE, DEFAULT_READ_TIMEOUT};
pub use state::{PeerInfo, SessionState, COMPACT_PEER_LENGTH};
pub use worker::{Connector, TcpConnector, Worker, WorkerContext, DEFAULT_CONNECT_TIMEOUT};
