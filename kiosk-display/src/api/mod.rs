//! HTTP/SSE adapter
//!
//! Thin axum surface over the engine, coordinator and cache: update
//! notifications in, renderer callbacks in, telemetry and display
//! commands out over SSE.

pub mod carousel;
pub mod handlers;
pub mod sse;

use axum::{
    routing::{get, post},
    Router,
};
use kiosk_common::events::EventBus;
use kiosk_common::models::UpdateNotification;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::media::MediaReadinessCache;
use crate::playback::PlaybackEngine;
use crate::sync::SyncCoordinator;

pub use carousel::{BroadcastCarousel, DisplayCommand};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: PlaybackEngine,
    pub sync: Arc<SyncCoordinator>,
    pub cache: MediaReadinessCache,
    pub events: EventBus,
    pub carousel: Arc<BroadcastCarousel>,
    /// Transport side of the coordinator's update channel
    pub updates: mpsc::Sender<UpdateNotification>,
    /// Identifies this display process
    pub session_id: Uuid,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api",
            Router::new()
                .route("/status", get(handlers::get_status))
                .route("/updates", post(handlers::post_update))
                .route("/slides", post(handlers::post_slides))
                .route("/reload", post(handlers::force_reload))
                .route("/playback/next", post(handlers::playback_next))
                .route("/renderer/index", post(handlers::renderer_index))
                .route("/renderer/video-ended", post(handlers::renderer_video_ended))
                .route("/renderer/status", post(handlers::renderer_status))
                .route("/media", get(handlers::get_media))
                .route("/media/retry", post(handlers::media_retry)),
        )
        .route("/events", get(sse::event_stream))
        .route("/display/events", get(sse::display_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
