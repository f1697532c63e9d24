//! Peer session
//!
//! Drives the wire protocol with one remote peer over any byte stream:
//! handshake, bitfield exchange, INTERESTED, then the steady message loop
//! that pipelines block requests from the piece manager.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::peer::state::{PeerInfo, SessionState};
use crate::protocol::{read_handshake, read_message, write_handshake, write_message, Handshake, Message, ProtocolError};
use crate::storage::{peer_label, BlockOutcome, PeerId, PieceManager};

/// Default number of block requests kept in flight per peer
pub const DEFAULT_PIPELINE: usize = 1;

/// Default bound on a single receive
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-connection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum requests in flight
    pub pipeline: usize,
    /// Bound on each handshake or message read
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pipeline: DEFAULT_PIPELINE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// One connection to one peer
pub struct PeerSession<S> {
    stream: S,
    peer: PeerInfo,
    info_hash: [u8; 20],
    our_peer_id: PeerId,
    manager: Arc<PieceManager>,
    config: SessionConfig,
    state: SessionState,
    remote_id: Option<PeerId>,
    registered: bool,
    choked: bool,
    in_flight: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> PeerSession<S> {
    pub fn new(
        stream: S,
        peer: PeerInfo,
        info_hash: [u8; 20],
        our_peer_id: PeerId,
        manager: Arc<PieceManager>,
        config: SessionConfig,
    ) -> Self {
        Self {
            stream,
            peer,
            info_hash,
            our_peer_id,
            manager,
            config,
            state: SessionState::Disconnected,
            remote_id: None,
            registered: false,
            choked: true,
            in_flight: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Peer id received in the remote handshake
    pub fn remote_peer_id(&self) -> Option<PeerId> {
        self.remote_id
    }

    pub fn is_choked(&self) -> bool {
        self.choked
    }

    /// Run the session until the download completes or the connection fails.
    ///
    /// The peer's bitfield is deregistered on every exit path.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.drive().await;

        if self.registered {
            if let Some(remote_id) = self.remote_id {
                if let Err(e) = self.manager.remove_peer(&remote_id).await {
                    warn!("Failed to deregister peer {}: {}", self.peer, e);
                }
            }
            self.registered = false;
        }
        self.state = SessionState::Closed;

        match &result {
            Ok(()) => debug!("Session with {} closed", self.peer),
            Err(e) => debug!("Session with {} aborted: {:#}", self.peer, e),
        }
        result
    }

    async fn drive(&mut self) -> Result<()> {
        self.handshake().await?;

        self.state = SessionState::BitfieldExchange;
        let bitfield = loop {
            match self.receive().await? {
                Message::KeepAlive => continue,
                Message::Bitfield { bitfield } => break bitfield,
                other => {
                    warn!("Peer {} sent {} before its bitfield", self.peer, other.name());
                    return Err(ProtocolError::UnexpectedMessage {
                        expected: "BITFIELD",
                        received: other.name(),
                    }
                    .into());
                }
            }
        };

        let remote_id = self.remote_id.context("handshake did not record a peer id")?;
        if !self.manager.add_peer(remote_id, bitfield).await {
            info!("Connection limit reached, dropping peer {}", self.peer);
            return Ok(());
        }
        self.registered = true;

        self.state = SessionState::Interested;
        self.send(&Message::Interested).await?;

        self.state = SessionState::Steady;
        self.steady(remote_id).await
    }

    async fn handshake(&mut self) -> Result<()> {
        self.state = SessionState::Handshaking;
        debug!("Sending handshake to peer: {}", self.peer);
        write_handshake(&mut self.stream, &Handshake::new(self.info_hash, self.our_peer_id)).await?;

        let reply = timeout(self.config.read_timeout, read_handshake(&mut self.stream))
            .await
            .with_context(|| format!("handshake with {} timed out", self.peer))??;
        reply.validate(&self.info_hash)?;

        self.remote_id = Some(reply.peer_id);
        debug!("Handshake completed with {} ({})", self.peer, peer_label(&reply.peer_id));
        Ok(())
    }

    async fn steady(&mut self, remote_id: PeerId) -> Result<()> {
        loop {
            if self.manager.is_complete().await {
                debug!("Download complete, leaving {}", self.peer);
                return Ok(());
            }

            match self.receive().await? {
                Message::KeepAlive => trace!("Keep-alive from {}", self.peer),
                Message::Choke => {
                    debug!("Choked by {}", self.peer);
                    self.choked = true;
                    self.in_flight = 0;
                }
                Message::Unchoke => {
                    debug!("Unchoked by {}", self.peer);
                    self.choked = false;
                }
                Message::Have { piece_index } => {
                    self.manager.update_peer(&remote_id, piece_index).await?;
                }
                Message::Piece { index, begin, block } => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    let outcome = self.manager.block_received(&remote_id, index, begin, block).await?;
                    if outcome == BlockOutcome::PieceVerified {
                        debug!("Piece {} verified from {}", index, self.peer);
                    }
                }
                other => {
                    warn!("Unsupported {} message from {}", other.name(), self.peer);
                    return Err(ProtocolError::UnsupportedMessage(other.name()).into());
                }
            }

            self.fill_pipeline(&remote_id).await?;
        }
    }

    async fn fill_pipeline(&mut self, remote_id: &PeerId) -> Result<()> {
        while !self.choked && self.in_flight < self.config.pipeline {
            let Some(request) = self.manager.next_request(remote_id).await? else {
                break;
            };
            trace!(
                "Requesting block {}/{} ({} bytes) from {}",
                request.piece_index,
                request.offset,
                request.length,
                self.peer
            );
            self.send(&Message::Request {
                index: request.piece_index,
                begin: request.offset,
                length: request.length,
            })
            .await?;
            self.in_flight += 1;
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<Message> {
        timeout(self.config.read_timeout, read_message(&mut self.stream))
            .await
            .with_context(|| format!("no message from {} within {:?}", self.peer, self.config.read_timeout))?
    }

    async fn send(&mut self, message: &Message) -> Result<()> {
        trace!("Sending {} to {}", message.name(), self.peer);
        write_message(&mut self.stream, message)
            .await
            .with_context(|| format!("failed to send {} to {}", message.name(), self.peer))
    }
}
