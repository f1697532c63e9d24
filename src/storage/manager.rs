//! Piece manager
//!
//! Owns every piece and block, the bitfield of each registered peer, the
//! pending-request list and the output file. Workers ask it which block to
//! request next and hand it every block they receive; all of that state sits
//! behind one lock.
//!
//! Pieces move through three pools:
//!
//! * `missing`: never selected
//! * `ongoing`: at least one block handed out; a piece that fails its hash
//!   check is reset in place and stays here
//! * `finished`: verified and written to disk

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::error::TorrentError;
use crate::protocol::ProtocolError;
use crate::storage::file::OutputFile;
use crate::storage::piece::Piece;
use crate::torrent::TorrentFile;

/// A peer is identified by the 20-byte id from its handshake
pub type PeerId = [u8; 20];

/// Age after which a pending request may be handed out again
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Printable form of a peer id for logs and errors
pub fn peer_label(peer_id: &PeerId) -> String {
    String::from_utf8_lossy(peer_id).into_owned()
}

/// Errors raised by the piece manager
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Caller sequencing bug: the peer was never registered or already removed
    #[error("peer {0} is not registered")]
    UnknownPeer(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Storage(#[from] TorrentError),
}

/// A block the caller should request from its peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRequest {
    pub piece_index: u32,
    pub offset: u32,
    pub length: u32,
}

/// In-flight request, used to detect stalls
#[derive(Debug, Clone, Copy)]
pub struct PendingRequest {
    pub piece: u32,
    pub offset: u32,
    pub length: u32,
    pub issued_at: Instant,
}

impl PendingRequest {
    fn as_request(&self) -> BlockRequest {
        BlockRequest {
            piece_index: self.piece,
            offset: self.offset,
            length: self.length,
        }
    }
}

/// What happened to a received block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Stored; the piece still misses blocks
    Stored,
    /// Completed a piece whose hash matched; it is on disk now
    PieceVerified,
    /// Completed a piece whose hash did not match; it will be downloaded again
    PieceRejected,
    /// Late block for a piece that is already verified
    AlreadyFinished,
}

/// Point-in-time progress figures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub finished: usize,
    pub total_pieces: usize,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub peers: usize,
    pub max_peers: usize,
}

impl ProgressSnapshot {
    /// Fraction of verified bytes, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.bytes_downloaded as f64 / self.total_bytes as f64
    }

    pub fn is_complete(&self) -> bool {
        self.finished == self.total_pieces
    }
}

#[derive(Debug)]
struct Inner {
    pieces: Vec<Piece>,
    missing: BTreeSet<usize>,
    ongoing: Vec<usize>,
    finished: BTreeSet<usize>,
    peers: HashMap<PeerId, Vec<u8>>,
    pending: Vec<PendingRequest>,
    bytes_downloaded: u64,
    file: OutputFile,
}

/// Shared download state; wrap it in an `Arc` to hand it to workers
#[derive(Debug)]
pub struct PieceManager {
    inner: Mutex<Inner>,
    piece_length: u64,
    total_pieces: usize,
    total_bytes: u64,
    max_peers: usize,
    request_timeout: Duration,
    output_path: PathBuf,
}

fn has_piece(bitfield: &[u8], index: usize) -> bool {
    bitfield
        .get(index / 8)
        .is_some_and(|byte| (byte >> (7 - index % 8)) & 1 == 1)
}

fn set_piece(bitfield: &mut Vec<u8>, index: usize) {
    let byte_index = index / 8;
    if byte_index >= bitfield.len() {
        bitfield.resize(byte_index + 1, 0);
    }
    bitfield[byte_index] |= 1 << (7 - index % 8);
}

impl PieceManager {
    /// Build all pieces and pre-allocate the output file at `output_path`
    pub async fn new(torrent: &TorrentFile, output_path: &Path, max_peers: usize) -> Result<Self, ManagerError> {
        let total_pieces = torrent.piece_count();
        let mut pieces = Vec::with_capacity(total_pieces);
        for index in 0..total_pieces {
            let length = torrent.piece_size(index).unwrap_or(0);
            let hash = torrent.piece_hash(index).unwrap_or([0u8; 20]);
            pieces.push(Piece::new(index as u32, length, hash));
        }

        let file = OutputFile::create(output_path, torrent.total_size()).await?;
        info!(
            "Piece manager ready: {} pieces of {} bytes, up to {} peers",
            total_pieces,
            torrent.piece_length(),
            max_peers
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                pieces,
                missing: (0..total_pieces).collect(),
                ongoing: Vec::new(),
                finished: BTreeSet::new(),
                peers: HashMap::new(),
                pending: Vec::new(),
                bytes_downloaded: 0,
                file,
            }),
            piece_length: torrent.piece_length(),
            total_pieces,
            total_bytes: torrent.total_size(),
            max_peers,
            request_timeout: REQUEST_TIMEOUT,
            output_path: output_path.to_path_buf(),
        })
    }

    /// Override the age after which pending requests are reissued
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn total_pieces(&self) -> usize {
        self.total_pieces
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Register a peer's bitfield.
    ///
    /// Returns `false` when the connection limit is reached. A peer that is
    /// already registered has its bitfield replaced.
    pub async fn add_peer(&self, peer_id: PeerId, bitfield: Vec<u8>) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.peers.contains_key(&peer_id) && inner.peers.len() >= self.max_peers {
            debug!("Not registering {}: {} peers already", peer_label(&peer_id), inner.peers.len());
            return false;
        }
        inner.peers.insert(peer_id, bitfield);
        info!("Number of connections: {} / {}", inner.peers.len(), self.max_peers);
        true
    }

    /// Drop a peer's bitfield.
    ///
    /// Removing an unknown peer is a caller bug, except once the download is
    /// complete.
    pub async fn remove_peer(&self, peer_id: &PeerId) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().await;
        if inner.finished.len() == self.total_pieces {
            inner.peers.remove(peer_id);
            return Ok(());
        }

        if inner.peers.remove(peer_id).is_none() {
            error!("Attempt to remove unregistered peer {}", peer_label(peer_id));
            return Err(ManagerError::UnknownPeer(peer_label(peer_id)));
        }
        info!("Number of connections: {} / {}", inner.peers.len(), self.max_peers);
        Ok(())
    }

    /// Record a HAVE announcement
    pub async fn update_peer(&self, peer_id: &PeerId, index: u32) -> Result<(), ManagerError> {
        if index as usize >= self.total_pieces {
            warn!("Peer {} announced invalid piece {}", peer_label(peer_id), index);
            return Err(ProtocolError::InvalidPieceIndex(index).into());
        }

        let mut inner = self.inner.lock().await;
        let bitfield = inner
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| ManagerError::UnknownPeer(peer_label(peer_id)))?;
        set_piece(bitfield, index as usize);
        trace!("Peer {} now has piece {}", peer_label(peer_id), index);
        Ok(())
    }

    /// Pick the next block to request from `peer_id`.
    ///
    /// In order: an expired request for a piece the peer has, the next missing
    /// block of an ongoing piece the peer has, the first block of the rarest
    /// missing piece the peer has. `Ok(None)` means nothing to request right
    /// now.
    pub async fn next_request(&self, peer_id: &PeerId) -> Result<Option<BlockRequest>, ManagerError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let bitfield = inner
            .peers
            .get(peer_id)
            .ok_or_else(|| ManagerError::UnknownPeer(peer_label(peer_id)))?;

        let now = Instant::now();
        if let Some(pending) = inner.pending.iter_mut().find(|p| {
            has_piece(bitfield, p.piece as usize) && now.duration_since(p.issued_at) >= self.request_timeout
        }) {
            info!("Block {} of piece {} has expired, re-requesting", pending.offset, pending.piece);
            pending.issued_at = now;
            let request = pending.as_request();
            inner.pieces[request.piece_index as usize].mark_pending(request.offset);
            return Ok(Some(request));
        }

        for &index in &inner.ongoing {
            if !has_piece(bitfield, index) {
                continue;
            }
            if let Some(block) = inner.pieces[index].next_missing_block() {
                let request = BlockRequest {
                    piece_index: block.piece_index,
                    offset: block.offset,
                    length: block.length,
                };
                inner.pending.push(PendingRequest {
                    piece: request.piece_index,
                    offset: request.offset,
                    length: request.length,
                    issued_at: now,
                });
                trace!("Requesting ongoing block {}/{}", request.piece_index, request.offset);
                return Ok(Some(request));
            }
        }

        let rarest = inner
            .missing
            .iter()
            .copied()
            .filter(|&index| has_piece(bitfield, index))
            .min_by_key(|&index| {
                let holders = inner.peers.values().filter(|b| has_piece(b, index)).count();
                (holders, index)
            });

        let Some(index) = rarest else {
            return Ok(None);
        };

        inner.missing.remove(&index);
        inner.ongoing.push(index);
        debug!("Selected rarest piece {}", index);

        let Some(block) = inner.pieces[index].next_missing_block() else {
            return Ok(None);
        };
        let request = BlockRequest {
            piece_index: block.piece_index,
            offset: block.offset,
            length: block.length,
        };
        inner.pending.push(PendingRequest {
            piece: request.piece_index,
            offset: request.offset,
            length: request.length,
            issued_at: now,
        });
        Ok(Some(request))
    }

    /// Store a received block, verifying and writing its piece once complete
    pub async fn block_received(
        &self,
        peer_id: &PeerId,
        piece_index: u32,
        offset: u32,
        data: Vec<u8>,
    ) -> Result<BlockOutcome, ManagerError> {
        trace!(
            "Received block {} of piece {} ({} bytes) from {}",
            offset,
            piece_index,
            data.len(),
            peer_label(peer_id)
        );

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let index = piece_index as usize;

        if inner.finished.contains(&index) {
            debug!("Piece {} already finished, dropping block {}", piece_index, offset);
            inner.pending.retain(|p| p.piece != piece_index);
            return Ok(BlockOutcome::AlreadyFinished);
        }
        if !inner.ongoing.contains(&index) {
            warn!("Block {} of piece {} does not belong to an ongoing piece", offset, piece_index);
            return Err(ProtocolError::UnsolicitedBlock { index: piece_index }.into());
        }

        let piece = &mut inner.pieces[index];
        piece.block_received(offset, data)?;
        inner
            .pending
            .retain(|p| !(p.piece == piece_index && p.offset == offset));

        if !piece.is_complete() {
            return Ok(BlockOutcome::Stored);
        }

        if !piece.is_hash_matching() {
            warn!("Hash mismatch for piece {}, downloading it again", piece_index);
            piece.reset();
            inner.pending.retain(|p| p.piece != piece_index);
            return Ok(BlockOutcome::PieceRejected);
        }

        let data = piece.data();
        let position = index as u64 * self.piece_length;
        if let Err(e) = inner.file.write_at(position, &data).await {
            error!("Failed to write piece {}: {}", piece_index, e);
            inner.pieces[index].reset();
            inner.pending.retain(|p| p.piece != piece_index);
            return Err(e.into());
        }

        inner.pieces[index].release_data();
        inner.ongoing.retain(|&i| i != index);
        inner.finished.insert(index);
        inner.bytes_downloaded += data.len() as u64;

        info!(
            "({:.2}%) {} / {} pieces downloaded",
            inner.finished.len() as f64 / self.total_pieces as f64 * 100.0,
            inner.finished.len(),
            self.total_pieces
        );

        if inner.finished.len() == self.total_pieces {
            inner.file.sync().await?;
            info!("All {} pieces verified", self.total_pieces);
        }
        Ok(BlockOutcome::PieceVerified)
    }

    /// True once every piece is verified
    pub async fn is_complete(&self) -> bool {
        self.inner.lock().await.finished.len() == self.total_pieces
    }

    /// Sum of the lengths of verified pieces
    pub async fn bytes_downloaded(&self) -> u64 {
        self.inner.lock().await.bytes_downloaded
    }

    pub async fn bytes_left(&self) -> u64 {
        self.total_bytes - self.bytes_downloaded().await
    }

    pub async fn peer_count(&self) -> usize {
        self.inner.lock().await.peers.len()
    }

    /// Copy of the in-flight requests
    pub async fn pending_requests(&self) -> Vec<PendingRequest> {
        self.inner.lock().await.pending.clone()
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock().await;
        ProgressSnapshot {
            finished: inner.finished.len(),
            total_pieces: self.total_pieces,
            bytes_downloaded: inner.bytes_downloaded,
            total_bytes: self.total_bytes,
            peers: inner.peers.len(),
            max_peers: self.max_peers,
        }
    }
}
