//! Blossom Cache - local content-addressed blob cache for Blossom servers

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use blossom_api::{create_router, AppState, HttpServer};
use blossom_core::{spawn_eviction_task, CacheConfig, CacheManager};
use blossom_meta::{open_meta_backend, BackendKind};
use blossom_store::BlobStore;
use blossom_upstream::UpstreamClient;
use config::Config;

/// Blossom Cache - local caching proxy for Blossom blob servers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "BLOSSOM_CACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "BLOSSOM_CACHE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    init_logging(&config.logging.level);

    info!("Starting Blossom Cache v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = PathBuf::from(&config.storage.path);
    tokio::fs::create_dir_all(&data_dir).await?;

    let backend_kind = BackendKind::from_str(&config.storage.db_backend)
        .map_err(|e| anyhow::anyhow!(e))?;
    let meta = open_meta_backend(backend_kind, &data_dir).await?;

    let store = Arc::new(BlobStore::new(data_dir.clone(), meta).await?);

    let upstream = Arc::new(UpstreamClient::new(config.upstream.servers.clone()));

    let cache_config = CacheConfig {
        max_cache_bytes: config.cache.max_cache_size_mb as i64 * 1024 * 1024,
        max_blob_bytes: config.cache.max_blob_size_mb as i64 * 1024 * 1024,
        verify_hash: config.cache.verify_sha256,
    };
    let cache = Arc::new(CacheManager::new(store.clone(), upstream, cache_config));

    // Spec §6: the host brings the cache under its cap at startup, in case a
    // prior run used a larger `max-cache-size-mb`.
    let startup_evicted = cache.run_eviction().await;
    if startup_evicted > 0 {
        info!("startup eviction sweep evicted {} blobs", startup_evicted);
    }
    let _eviction_handle = spawn_eviction_task(cache.clone(), 300);

    let bind_addr = args.bind.unwrap_or_else(|| config.effective_listen_address().to_string());
    let port = args.port.unwrap_or(config.server.listen_port);
    let base_url = format!("http://{}:{}", bind_addr, port);

    let state = AppState::new(store, cache, base_url);

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Upstream servers: {:?}", config.upstream.servers);

    let server = HttpServer::new(addr, app);
    server.start(shutdown_signal()).await?;

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
