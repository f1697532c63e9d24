//! Download orchestrator
//!
//! Announces to the tracker, feeds peers to a pool of workers, re-announces
//! on a timer and reports progress until every piece is verified.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cli::{DownloadStats, ProgressDisplay};
use crate::error::TorrentError;
use crate::peer::{Connector, PeerMessage, PeerQueue, SessionConfig, Worker, WorkerContext};
use crate::protocol::Handshake;
use crate::storage::{PeerId, PieceManager, REQUEST_TIMEOUT};
use crate::torrent::TorrentFile;
use crate::tracker::{AnnounceRequest, AnnounceResponse, HttpGet, TrackerClient, TrackerError, RETRY_NEVER};

/// Period of the supervision loop and the progress line
pub const TICK: Duration = Duration::from_secs(1);

/// Settings for one download
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory the output file is created in
    pub output_dir: PathBuf,
    /// Port advertised to the tracker
    pub port: u16,
    /// Maximum number of registered peers
    pub max_peers: usize,
    /// Number of concurrent workers
    pub workers: usize,
    pub session: SessionConfig,
    /// Age after which an unanswered request is reissued
    pub request_timeout: Duration,
    /// Re-announce period used while the peer queue is empty
    pub reannounce: Duration,
    /// Supervision and progress period
    pub tick: Duration,
    /// How long workers get to exit after being stopped
    pub shutdown_grace: Duration,
    /// Suppress the progress line
    pub quiet: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./downloads"),
            port: 6881,
            max_peers: 50,
            workers: 8,
            session: SessionConfig::default(),
            request_timeout: REQUEST_TIMEOUT,
            reannounce: Duration::from_secs(90),
            tick: TICK,
            shutdown_grace: Duration::from_secs(5),
            quiet: false,
        }
    }
}

/// Downloads a single torrent
pub struct TorrentClient<H, C> {
    tracker: TrackerClient<H>,
    connector: Arc<C>,
    config: ClientConfig,
}

impl<H, C> TorrentClient<H, C>
where
    H: HttpGet,
    C: Connector + 'static,
{
    pub fn new(http: H, connector: C, config: ClientConfig) -> Self {
        Self {
            tracker: TrackerClient::new(http),
            connector: Arc::new(connector),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Download `torrent` into the output directory and return the file path
    pub async fn download(&self, torrent: &TorrentFile) -> Result<PathBuf> {
        let output_dir = &self.config.output_dir;
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            TorrentError::storage_error_full(
                "Failed to create output directory",
                output_dir.display().to_string(),
                e.to_string(),
            )
        })?;

        let output_path = output_dir.join(file_name(torrent));
        let manager = Arc::new(
            PieceManager::new(torrent, &output_path, self.config.max_peers)
                .await?
                .with_request_timeout(self.config.request_timeout),
        );
        info!(
            "Downloading {} ({} pieces) to {}",
            torrent.name(),
            torrent.piece_count(),
            output_path.display()
        );

        let peer_id = Handshake::generate_peer_id();
        let first = self.announce(torrent, &peer_id, &manager).await?;
        if first.peers.is_empty() {
            bail!("no peers available");
        }

        let queue = Arc::new(PeerQueue::new());
        let mut reannounce_after = first.interval;
        queue.replace(first.peers);

        let display = Arc::new(ProgressDisplay::new(self.config.quiet));
        let progress = (!self.config.quiet).then(|| {
            tokio::spawn(report_progress(
                Arc::clone(&manager),
                Arc::clone(&display),
                self.config.tick,
            ))
        });

        let context = WorkerContext {
            info_hash: torrent.info_hash,
            peer_id,
            session: self.config.session,
        };
        let mut workers: Vec<JoinHandle<usize>> = (0..self.config.workers)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&queue),
                    Arc::clone(&manager),
                    Arc::clone(&self.connector),
                    context,
                );
                tokio::spawn(worker.run())
            })
            .collect();
        debug!("Started {} workers", workers.len());

        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut announced_at = Instant::now();

        loop {
            ticker.tick().await;
            let idle = workers.iter().all(|w| w.is_finished());
            if manager.is_complete().await {
                break;
            }
            if idle {
                if let Some(task) = progress {
                    task.abort();
                }
                bail!("all workers exited before the download completed");
            }

            let elapsed = announced_at.elapsed();
            let starving = queue.is_empty() && elapsed >= self.config.reannounce;
            if elapsed < reannounce_after && !starving {
                continue;
            }

            announced_at = Instant::now();
            match self.announce(torrent, &peer_id, &manager).await {
                Ok(response) if response.is_unavailable() => {
                    reannounce_after = RETRY_NEVER;
                }
                Ok(response) => {
                    reannounce_after = response.interval;
                    if response.peers.is_empty() {
                        debug!("Tracker returned no peers, keeping current pool");
                    } else {
                        info!("Re-announce returned {} peers", response.peers.len());
                        queue.replace(response.peers);
                    }
                }
                Err(e) => {
                    warn!("Re-announce failed, keeping current pool: {}", e);
                    reannounce_after = RETRY_NEVER;
                }
            }
        }

        info!("All {} pieces verified", manager.total_pieces());
        self.shutdown(&queue, &mut workers).await;
        if let Some(task) = progress {
            task.abort();
        }

        let stats = DownloadStats::from_snapshot(&manager.snapshot().await, 0, display.elapsed());
        if let Err(e) = display.print_complete(&stats, &output_path) {
            debug!("Failed to print completion: {}", e);
        }
        Ok(output_path)
    }

    async fn announce(
        &self,
        torrent: &TorrentFile,
        peer_id: &PeerId,
        manager: &PieceManager,
    ) -> Result<AnnounceResponse, TrackerError> {
        let mut request = AnnounceRequest::new(
            torrent.info_hash,
            *peer_id,
            self.config.port,
            manager.bytes_left().await,
        );
        request.downloaded = manager.bytes_downloaded().await;
        self.tracker.announce(&torrent.announce, &request).await
    }

    /// Send one stop per worker and wait for them within the grace period
    async fn shutdown(&self, queue: &PeerQueue, workers: &mut [JoinHandle<usize>]) {
        for _ in 0..workers.len() {
            queue.push(PeerMessage::Stop);
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        let mut sessions = 0;
        for (id, handle) in workers.iter_mut().enumerate() {
            match timeout_at(deadline, &mut *handle).await {
                Ok(Ok(completed)) => sessions += completed,
                Ok(Err(e)) => error!("Worker {} panicked: {}", id, e),
                Err(_) => {
                    warn!("Worker {} did not stop in time", id);
                    handle.abort();
                }
            }
        }
        debug!("Workers finished {} sessions cleanly", sessions);
    }
}

/// Redraw the progress line every `period` until the download completes
async fn report_progress(manager: Arc<PieceManager>, display: Arc<ProgressDisplay>, period: Duration) {
    let mut ticker = interval(period);
    let mut previous = manager.bytes_downloaded().await;
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let snapshot = manager.snapshot().await;
        let stats = DownloadStats::from_snapshot(&snapshot, previous, last.elapsed());
        previous = snapshot.bytes_downloaded;
        last = Instant::now();

        if let Err(e) = display.print_progress(&stats) {
            debug!("Failed to draw progress: {}", e);
        }
        if snapshot.is_complete() {
            break;
        }
    }
}

/// Final path component of the torrent name, falling back to the info-hash
fn file_name(torrent: &TorrentFile) -> PathBuf {
    Path::new(torrent.name())
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(torrent.info_hash_hex()))
}
