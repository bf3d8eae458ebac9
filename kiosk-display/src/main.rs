//! Kiosk display controller - main entry point
//!
//! Wires the media cache, playback engine and sync coordinator together
//! and serves display pages and update transports over HTTP/SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kiosk_common::config::KioskConfig;
use kiosk_common::events::EventBus;
use kiosk_display::api::{self, AppState, BroadcastCarousel};
use kiosk_display::media::{HttpMediaLoader, MediaReadinessCache};
use kiosk_display::playback::{PlaybackEngine, PlaybackPolicy};
use kiosk_display::sync::{JsonFileStore, SyncCoordinator};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Display commands buffered per page connection
const DISPLAY_CHANNEL_CAPACITY: usize = 64;

/// Update notifications buffered ahead of the coordinator
const UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Command-line arguments for kiosk-display
#[derive(Parser, Debug)]
#[command(name = "kiosk-display")]
#[command(about = "Slideshow playback controller for kiosk displays")]
#[command(version)]
struct Args {
    /// Config file (overrides KIOSK_CONFIG and default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "KIOSK_PORT")]
    port: Option<u16>,

    /// Display state file (overrides config)
    #[arg(short, long, env = "KIOSK_STORE")]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is resolved before tracing so its log level can apply;
    // resolution problems are reported once the subscriber is up
    let loaded = KioskConfig::load(args.config.as_deref());
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("kiosk_display={},tower_http=info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = loaded.context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(store) = args.store {
        config.store.path = store;
    }

    let session_id = Uuid::new_v4();
    info!("Starting kiosk display (session {})", session_id);
    info!("Display state: {}", config.store.path.display());

    let events = EventBus::default();

    let loader = HttpMediaLoader::new().context("Failed to create media loader")?;
    let cache = MediaReadinessCache::new(
        Arc::new(loader),
        events.clone(),
        config.media.preload_timeout(),
    );
    cache.spawn_sweeper(config.media.sweep_interval(), config.media.max_age());

    let carousel = Arc::new(BroadcastCarousel::new(DISPLAY_CHANNEL_CAPACITY));
    let engine = PlaybackEngine::spawn(
        carousel.clone(),
        cache.clone(),
        events.clone(),
        PlaybackPolicy::from(&config),
    );

    let store = Arc::new(JsonFileStore::new(config.store.path.clone()));
    let sync = Arc::new(SyncCoordinator::new(
        engine.clone(),
        cache.clone(),
        store,
        events.clone(),
        config.sync.quiet_window(),
    ));
    if let Err(e) = sync.bootstrap().await {
        // An unreadable store leaves the display idle until the next update
        warn!("Failed to load display state: {}", e);
    }

    let (updates, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
    sync.spawn(updates_rx);

    let app = api::create_router(AppState {
        engine: engine.clone(),
        sync,
        cache,
        events,
        carousel,
        updates,
        session_id,
    });

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if engine.shutdown().is_err() {
        warn!("Playback engine had already stopped");
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
