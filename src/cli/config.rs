//! CLI configuration module
//!
//! Resolves command-line arguments into validated download settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::args::CliArgs;
use crate::client::{ClientConfig, TICK};
use crate::error::TorrentError;
use crate::peer::SessionConfig;

/// Default download directory
pub const DEFAULT_OUTPUT_DIR: &str = "./downloads";

/// Grace period for workers after the download completes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the downloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Download directory
    pub output_dir: PathBuf,
    /// Port advertised to the tracker
    pub port: u16,
    /// Maximum number of registered peers
    pub max_connections: usize,
    /// Number of concurrent peer workers
    pub workers: usize,
    /// Outstanding block requests per peer
    pub pipeline: usize,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Re-announce period while the peer queue is empty
    pub reannounce: Duration,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        let output_dir = args
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Self {
            output_dir,
            port: args.port,
            max_connections: args.max_connections,
            workers: args.workers,
            pipeline: args.pipeline,
            request_timeout: Duration::from_secs(args.request_timeout),
            connect_timeout: Duration::from_secs(args.connect_timeout),
            read_timeout: Duration::from_secs(args.read_timeout),
            reannounce: Duration::from_secs(args.reannounce),
            verbose: args.verbose,
            quiet: args.quiet,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), TorrentError> {
        if self.port == 0 {
            return Err(TorrentError::config_error_with_field("Port cannot be 0", "port"));
        }

        let counts = [
            (self.max_connections, "max_connections"),
            (self.workers, "workers"),
            (self.pipeline, "pipeline"),
        ];
        for (value, field) in counts {
            if value == 0 {
                return Err(TorrentError::config_error_with_field(
                    format!("{} must be at least 1", field),
                    field,
                ));
            }
        }

        let timeouts = [
            (self.request_timeout, "request_timeout"),
            (self.connect_timeout, "connect_timeout"),
            (self.read_timeout, "read_timeout"),
            (self.reannounce, "reannounce"),
        ];
        for (value, field) in timeouts {
            if value.is_zero() {
                return Err(TorrentError::config_error_with_field(
                    format!("{} must be positive", field),
                    field,
                ));
            }
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(TorrentError::config_error_with_field(
                "output_dir cannot be empty",
                "output_dir",
            ));
        }

        Ok(())
    }

    /// Settings for the download orchestrator
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            output_dir: self.output_dir.clone(),
            port: self.port,
            max_peers: self.max_connections,
            workers: self.workers,
            session: SessionConfig {
                pipeline: self.pipeline,
                read_timeout: self.read_timeout,
            },
            request_timeout: self.request_timeout,
            reannounce: self.reannounce,
            tick: TICK,
            shutdown_grace: SHUTDOWN_GRACE,
            quiet: self.quiet,
        }
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
