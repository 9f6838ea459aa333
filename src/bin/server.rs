//! TetherKV Server Binary
//!
//! Serves an in-memory store (SHA-1 content-addressed keyspaces) over the
//! framed TCP transport.

use clap::Parser;
use tetherkv::rpc::tcp::TcpServer;
use tetherkv::store::MemStore;
use tetherkv::{Service, ServiceConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// TetherKV Server
#[derive(Parser, Debug)]
#[command(name = "tetherkv-server")]
#[command(about = "Hierarchical key-value store service over TCP")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7450")]
    listen: String,

    /// Prefix prepended to exported method names
    #[arg(short, long, default_value = "")]
    prefix: String,

    /// Default page size for list responses
    #[arg(long, default_value = "256")]
    page_size: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tetherkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("TetherKV Server v{}", tetherkv::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = ServiceConfig::builder()
        .prefix(&args.prefix)
        .list_page_size(args.page_size)
        .build();

    let store = MemStore::content_addressed();
    let service = Service::new(store, config);

    let server = match TcpServer::bind(&args.listen) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };
    service.register(&server);

    if let Err(e) = server.serve() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = service.close() {
        tracing::warn!("Session teardown: {}", e);
    }
    tracing::info!("Server stopped");
}
