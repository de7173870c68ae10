//! respkv Server Binary
//!
//! Replays the append-only log, then starts the TCP server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use respkv::network::Server;
use respkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// respkv Server
#[derive(Parser, Debug)]
#[command(name = "respkv-server")]
#[command(about = "In-memory key-value server with a Redis-style protocol")]
#[command(version)]
struct Args {
    /// Append-only log file
    #[arg(short, long, default_value = "database.aof")]
    aof: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Maximum concurrent connections (0 = unbounded)
    #[arg(short, long, default_value = "0")]
    max_connections: usize,

    /// Background fsync interval in milliseconds
    #[arg(short = 'f', long, default_value = "1000")]
    fsync_interval_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,respkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("respkv server v{}", respkv::VERSION);
    tracing::info!("AOF file: {}", args.aof);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .aof_path(&args.aof)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .fsync_interval(Duration::from_millis(args.fsync_interval_ms))
        .build();

    // Replay must finish before the listener accepts anyone
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close AOF: {}", e);
    }
    tracing::info!("Server stopped");
}
