//! scene-depot server binary
//!
//! Runs the HTTP front end over a file-backed depot.
//!
//! ```bash
//! scene-depot --listen 0.0.0.0:5000 --data-dir ./data --public-dir ./public
//! ```

use clap::Parser;
use scene_depot::depot::{Depot, DepotConfig, DEFAULT_MAX_UPLOAD_BYTES};
use scene_depot::server::{self, ServerConfig};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

/// File-backed storage backend for 3D model scenes
#[derive(Parser)]
#[command(name = "scene-depot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Upload, store, rename, share and zip-export 3D model scenes", long_about = None)]
struct Cli {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    listen: String,

    /// Directory holding the uploads/, scenes/ and original_images/ roots
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Directory with the static front-end files
    #[arg(short, long, default_value = "public")]
    public_dir: PathBuf,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Seconds an unfinished upload batch stays claimable
    #[arg(long, default_value = "1800")]
    session_ttl_secs: u64,

    /// Largest accepted upload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let depot = match Depot::open(DepotConfig {
        data_dir: cli.data_dir.clone(),
        max_upload_bytes: cli.max_upload_bytes,
        session_ttl: Duration::from_secs(cli.session_ttl_secs),
    }) {
        Ok(depot) => Arc::new(depot),
        Err(e) => {
            eprintln!("failed to open depot in {}: {}", cli.data_dir.display(), e);
            process::exit(1);
        }
    };

    log::info!("data directory: {}", cli.data_dir.display());
    log::info!("public directory: {}", cli.public_dir.display());

    let config = ServerConfig {
        listen: cli.listen,
        public_dir: cli.public_dir,
        workers: cli.workers,
    };
    if let Err(e) = server::run(depot, config) {
        eprintln!("server error: {}", e);
        process::exit(1);
    }
}
