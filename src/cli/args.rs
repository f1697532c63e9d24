//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the downloader
#[derive(Debug, Parser)]
#[command(name = "irony-leech")]
#[command(about = "A leech-only BitTorrent downloader", long_about = None)]
pub struct CliArgs {
    /// Path to the .torrent file
    #[arg(value_name = "TORRENT_FILE")]
    pub torrent_file: PathBuf,

    /// Download directory
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Port advertised to the tracker
    #[arg(short, long, default_value_t = 6881)]
    pub port: u16,

    /// Maximum number of registered peers
    #[arg(short, long, default_value_t = 50)]
    pub max_connections: usize,

    /// Number of concurrent peer workers
    #[arg(short, long, default_value_t = 8)]
    pub workers: usize,

    /// Outstanding block requests per peer
    #[arg(long, default_value_t = 1)]
    pub pipeline: usize,

    /// Seconds before an unanswered block request is reissued
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub request_timeout: u64,

    /// Seconds allowed for a peer connection to open
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Seconds to wait for a peer message before dropping the peer
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub read_timeout: u64,

    /// Seconds between re-announces when the peer queue runs dry
    #[arg(long, value_name = "SECS", default_value_t = 90)]
    pub reannounce: u64,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}
