#![forbid(unsafe_code)]

//! HTTP server for video metadata, uploads and likes. All records live in
//! memory and are lost on shutdown.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, http::StatusCode};
use clap::Parser;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use videosvc::{
    VideoStore,
    config::{self, DEFAULT_CONFIG_PATH, Overrides},
    data::{FileDataManager, MemoryDataManager, VideoDataManager},
    http::{self, AppState},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve video metadata, uploads and likes.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Address to bind (default 127.0.0.1)")]
    host: Option<String>,
    #[arg(short = 'p', long = "port", value_name = "PORT", help = "Port to bind (default 8080)")]
    port: Option<u16>,
    #[arg(
        long = "data-root",
        value_name = "PATH",
        help = "Directory holding uploaded video data"
    )]
    data_root: Option<PathBuf>,
    #[arg(
        long = "public-url",
        value_name = "URL",
        help = "Base URL used when building dataUrl values"
    )]
    public_url: Option<String>,
    #[arg(
        long = "memory-data",
        help = "Keep uploaded video data in memory instead of on disk"
    )]
    memory_data: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(Cli::parse()).await {
        error!("video service exited with error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        host: cli.host,
        port: cli.port,
        data_root: cli.data_root,
        public_base_url: cli.public_url,
    };
    let config = config::load_server_config(&cli.config, overrides)?;
    info!(?config, "configuration loaded");

    let data: Arc<dyn VideoDataManager> = if cli.memory_data {
        info!("keeping video data in memory");
        Arc::new(MemoryDataManager::new())
    } else {
        let manager = FileDataManager::new(&config.data_root)
            .await
            .with_context(|| format!("creating data root {}", config.data_root.display()))?;
        info!(root = %manager.root().display(), "storing video data on disk");
        Arc::new(manager)
    };

    let state = AppState::new(Arc::new(VideoStore::new()), data, config.listen_base_url())
        .with_public_base_url(config.public_base_url.clone());

    let app = with_timeout(
        http::router(state, config.max_upload_bytes),
        config.request_timeout,
    );

    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("parsing bind address {}", config.host))?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    info!("API server stopped");
    Ok(())
}

/// Requests still running after `timeout` are answered with 408.
fn with_timeout(app: Router, timeout: Option<Duration>) -> Router {
    match timeout {
        Some(timeout) => app.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        )),
        None => app,
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(err) => {
            error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
