//! irony-leech - Main entry point
//!
//! Downloads the content of a single-file torrent from its swarm.

use anyhow::{Context, Result};
use irony_leech::tracker::HTTP_TIMEOUT;
use irony_leech::{CliArgs, Config, DownloadStats, ProgressDisplay, ReqwestHttp, TcpConnector, TorrentClient, TorrentFile, TorrentParser};
use tracing::{debug, error, info};

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();
        match panic_info.location() {
            Some(location) => error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            ),
            None => error!("PANIC occurred at an unknown location"),
        }

        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    info!("irony-leech starting");
    debug!("CLI arguments: {:?}", args);

    let config = Config::from_args(&args);
    config.validate().context("Invalid configuration")?;

    let torrent = TorrentParser::parse_file(&args.torrent_file)?;
    display_torrent_info(&torrent, &config);

    let http = ReqwestHttp::new(HTTP_TIMEOUT).context("Failed to build HTTP client")?;
    let connector = TcpConnector::new(config.connect_timeout);
    let client = TorrentClient::new(http, connector, config.client_config());

    let progress = ProgressDisplay::new(config.is_quiet());
    match client.download(&torrent).await {
        Ok(path) => {
            info!("Download finished: {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!("Download failed: {:#}", e);
            progress.print_error(&format!("Download failed: {:#}", e))?;
            Err(e)
        }
    }
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.verbose {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

/// Display torrent information
fn display_torrent_info(torrent: &TorrentFile, config: &Config) {
    if config.is_quiet() {
        return;
    }

    println!("Torrent Information:");
    println!("  Name: {}", torrent.name());
    println!(
        "  Size: {} ({})",
        torrent.total_size(),
        DownloadStats::format_bytes(torrent.total_size())
    );
    println!("  Pieces: {}", torrent.piece_count());
    println!("  Piece length: {}", DownloadStats::format_bytes(torrent.piece_length()));
    println!("  Info hash: {}", torrent.info_hash_hex());
    println!("  Tracker: {}", torrent.announce);
    println!();
    println!("Configuration:");
    println!("  Output directory: {}", config.output_dir.display());
    println!("  Advertised port: {}", config.port);
    println!("  Max peers: {}", config.max_connections);
    println!("  Workers: {}", config.workers);
    println!("  Pipeline depth: {}", config.pipeline);
    println!();
}
