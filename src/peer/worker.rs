//! Download worker
//!
//! A worker takes peers off the shared queue one at a time and runs a
//! session with each until it is told to stop or the download completes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::TorrentError;
use crate::peer::queue::{PeerMessage, PeerQueue};
use crate::peer::session::{PeerSession, SessionConfig};
use crate::peer::state::PeerInfo;
use crate::storage::{ManagerError, PeerId, PieceManager};

/// Default bound on establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens byte streams to peers
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, addr: SocketAddr) -> Result<Self::Stream>;
}

/// [`Connector`] over TCP
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, addr: SocketAddr) -> Result<TcpStream> {
        info!("Connecting to peer: {}", addr);
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|e| {
                warn!("Connection timeout to {}", addr);
                TorrentError::network_error_full("Connection timeout", addr.to_string(), e.to_string())
            })?
            .map_err(|e| {
                debug!("Failed to connect to {}: {}", addr, e);
                TorrentError::network_error_full("Failed to connect", addr.to_string(), e.to_string())
            })?;
        Ok(stream)
    }
}

/// Identity shared by every worker of one download
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext {
    pub info_hash: [u8; 20],
    pub peer_id: PeerId,
    pub session: SessionConfig,
}

/// Pulls peers from the queue and downloads from them
pub struct Worker<C> {
    id: usize,
    queue: Arc<PeerQueue>,
    manager: Arc<PieceManager>,
    connector: Arc<C>,
    context: WorkerContext,
}

impl<C: Connector> Worker<C> {
    pub fn new(
        id: usize,
        queue: Arc<PeerQueue>,
        manager: Arc<PieceManager>,
        connector: Arc<C>,
        context: WorkerContext,
    ) -> Self {
        Self {
            id,
            queue,
            manager,
            connector,
            context,
        }
    }

    /// Serve peers until a `Stop` arrives or every piece is verified.
    ///
    /// Returns the number of sessions that ended cleanly.
    pub async fn run(self) -> usize {
        let mut completed = 0;
        loop {
            if self.manager.is_complete().await {
                debug!("Worker {} exiting: download complete", self.id);
                break;
            }

            let peer = match self.queue.pop().await {
                PeerMessage::Stop => {
                    debug!("Worker {} received stop", self.id);
                    break;
                }
                PeerMessage::Connect(peer) => peer,
            };

            match self.serve(&peer).await {
                Ok(()) => completed += 1,
                Err(e) => warn!("Worker {}: peer {} failed: {:#}", self.id, peer, e),
            }
        }
        completed
    }

    async fn serve(&self, peer: &PeerInfo) -> Result<()> {
        let stream = self.connector.connect(peer.addr).await?;
        let mut session = PeerSession::new(
            stream,
            peer.clone(),
            self.context.info_hash,
            self.context.peer_id,
            Arc::clone(&self.manager),
            self.context.session,
        );
        let result = session.run().await;
        if let Err(e) = &result {
            if let Some(ManagerError::Storage(storage)) = e.downcast_ref::<ManagerError>() {
                error!("Worker {}: storage failure while serving {}: {}", self.id, peer, storage);
            }
        }
        result
    }
}
