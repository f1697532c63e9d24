//! Progress display module
//!
//! Handles displaying download progress in the CLI.

use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::storage::ProgressSnapshot;

const BAR_WIDTH: usize = 40;

/// Download statistics for progress display
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadStats {
    /// Verified bytes
    pub downloaded: u64,
    /// Size of the file
    pub total: u64,
    /// Download speed in bytes per second
    pub download_speed: f64,
    /// Number of registered peers
    pub peers: usize,
    /// Peer limit
    pub max_peers: usize,
    /// Verified pieces
    pub pieces_finished: usize,
    pub total_pieces: usize,
    /// Download progress (0.0 to 1.0)
    pub progress: f64,
}

impl DownloadStats {
    /// Create new download stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Build stats from a snapshot; speed is the byte delta over `elapsed`
    pub fn from_snapshot(snapshot: &ProgressSnapshot, previous_bytes: u64, elapsed: Duration) -> Self {
        let delta = snapshot.bytes_downloaded.saturating_sub(previous_bytes);
        let secs = elapsed.as_secs_f64();
        Self {
            downloaded: snapshot.bytes_downloaded,
            total: snapshot.total_bytes,
            download_speed: if secs > 0.0 { delta as f64 / secs } else { 0.0 },
            peers: snapshot.peers,
            max_peers: snapshot.max_peers,
            pieces_finished: snapshot.finished,
            total_pieces: snapshot.total_pieces,
            progress: snapshot.progress(),
        }
    }

    /// Format bytes to human readable string
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_index])
    }

    /// Format speed to human readable string
    pub fn format_speed(bytes_per_sec: f64) -> String {
        format!("{}/s", Self::format_bytes(bytes_per_sec as u64))
    }

    /// Format duration to human readable string
    pub fn format_duration(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Calculate ETA based on download speed and remaining bytes
    pub fn calculate_eta(downloaded: u64, total: u64, speed: f64) -> Option<Duration> {
        if speed <= 0.0 || downloaded >= total {
            return None;
        }

        let remaining = total.saturating_sub(downloaded) as f64;
        Some(Duration::from_secs_f64(remaining / speed))
    }

    /// Render the single progress line
    pub fn render_line(&self) -> String {
        let progress = self.progress.clamp(0.0, 1.0);
        let pos = (progress * BAR_WIDTH as f64) as usize;
        let bar: String = (0..BAR_WIDTH)
            .map(|i| match i.cmp(&pos) {
                std::cmp::Ordering::Less => '=',
                std::cmp::Ordering::Equal => '>',
                std::cmp::Ordering::Greater => ' ',
            })
            .collect();

        let eta = Self::calculate_eta(self.downloaded, self.total, self.download_speed)
            .map(Self::format_duration)
            .unwrap_or_else(|| "∞".to_string());

        format!(
            "[{}] {:.1}% | {} / {} | {} | Peers: {}/{} | Pieces: {}/{} | ETA: {}",
            bar,
            progress * 100.0,
            Self::format_bytes(self.downloaded),
            Self::format_bytes(self.total),
            Self::format_speed(self.download_speed),
            self.peers,
            self.max_peers,
            self.pieces_finished,
            self.total_pieces,
            eta,
        )
    }
}

/// Progress display for CLI
pub struct ProgressDisplay {
    /// Start time of the download
    start_time: Instant,
    /// Quiet mode (no progress output)
    quiet: bool,
}

impl ProgressDisplay {
    /// Create a new progress display
    pub fn new(quiet: bool) -> Self {
        Self {
            start_time: Instant::now(),
            quiet,
        }
    }

    /// Redraw the progress line in place
    pub fn print_progress(&self, stats: &DownloadStats) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut stdout = io::stdout().lock();
        write!(stdout, "\r\x1b[2K{}", stats.render_line())?;
        stdout.flush()
    }

    /// Print completion message
    pub fn print_complete(&self, stats: &DownloadStats, path: &Path) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut stdout = io::stdout().lock();
        write!(stdout, "\r\x1b[2K")?;
        writeln!(stdout, "{}", stats.render_line())?;
        writeln!(stdout, "Download complete")?;
        writeln!(stdout, "  Saved to: {}", path.display())?;
        writeln!(stdout, "  Size: {}", DownloadStats::format_bytes(stats.total))?;
        writeln!(
            stdout,
            "  Elapsed Time: {}",
            DownloadStats::format_duration(self.start_time.elapsed())
        )?;
        stdout.flush()
    }

    /// Print a status message
    pub fn print_status(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        println!("\r\x1b[2K{}", message);
        Ok(())
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) -> io::Result<()> {
        eprintln!("\r\x1b[2KError: {}", message);
        Ok(())
    }

    /// Get the elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
