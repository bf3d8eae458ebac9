//! HTTP request handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use kiosk_common::models::{Slide, UpdateNotification};
use kiosk_common::Error;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::playback::{resolve_real_index, PlaybackSnapshot};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct DisplayStatusResponse {
    playback: PlaybackSnapshot,
    quiet_window: bool,
    media_entries: usize,
}

/// Renderer index report: a real index, or a loop-mode display index
#[derive(Debug, Deserialize)]
pub struct IndexReport {
    real_index: Option<usize>,
    display_index: Option<usize>,
    #[serde(default)]
    loop_padding: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlayingReport {
    slide_id: String,
    playing: bool,
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    url: String,
}

#[derive(Debug, Serialize)]
pub struct MediaEntryResponse {
    url: String,
    is_ready: bool,
    is_preloading: bool,
    idle_seconds: u64,
    duration_seconds: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MediaRetryResponse {
    url: String,
    ready: bool,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: message.into(),
        }),
    )
}

fn from_error(e: Error) -> ApiError {
    let status = match e {
        Error::EngineStopped => StatusCode::SERVICE_UNAVAILABLE,
        Error::InvalidInput(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, format!("error: {}", e))
}

// ============================================================================
// Health & Status
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "kiosk-display".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session_id: state.session_id,
    })
}

/// GET /api/status - engine snapshot plus sync state
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<DisplayStatusResponse>, ApiError> {
    let playback = state.engine.status().await.map_err(from_error)?;
    Ok(Json(DisplayStatusResponse {
        playback,
        quiet_window: state.sync.in_quiet_window().await,
        media_entries: state.cache.len(),
    }))
}

// ============================================================================
// Updates
// ============================================================================

/// POST /api/updates - hand a notification to the sync coordinator
///
/// Accepted, not applied: outcomes show up as telemetry.
pub async fn post_update(
    State(state): State<AppState>,
    Json(notification): Json<UpdateNotification>,
) -> Result<StatusCode, ApiError> {
    info!("Update notification: {} from {:?}", notification.kind, notification.source);
    state.updates.send(notification).await.map_err(|_| {
        error!("Sync coordinator is not running");
        api_error(StatusCode::SERVICE_UNAVAILABLE, "error: sync coordinator stopped")
    })?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/slides - local edit
pub async fn post_slides(
    State(state): State<AppState>,
    Json(slides): Json<Vec<Slide>>,
) -> Result<Json<StatusResponse>, ApiError> {
    info!("Local edit: {} slides", slides.len());
    state.sync.local_edit(slides).await.map_err(|e| {
        error!("Local edit failed: {}", e);
        from_error(e)
    })?;
    Ok(Json(StatusResponse {
        status: "applied".to_string(),
    }))
}

/// POST /api/reload - clear media and restart from the store
pub async fn force_reload(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.sync.force_reload("api").await.map_err(from_error)?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Playback & Renderer Callbacks
// ============================================================================

/// POST /api/playback/next - manual skip
pub async fn playback_next(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    info!("Skip next request");
    state.engine.next().map_err(from_error)?;
    Ok(StatusCode::OK)
}

/// POST /api/renderer/index - carousel moved on its own
pub async fn renderer_index(
    State(state): State<AppState>,
    Json(report): Json<IndexReport>,
) -> Result<StatusCode, ApiError> {
    let real_index = match (report.real_index, report.display_index) {
        (Some(index), _) => index,
        (None, Some(display_index)) => {
            let len = state.engine.status().await.map_err(from_error)?.rotation_len;
            resolve_real_index(display_index, len, report.loop_padding).ok_or_else(|| {
                api_error(StatusCode::CONFLICT, "error: rotation is empty")
            })?
        }
        (None, None) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "error: real_index or display_index required",
            ))
        }
    };

    state.engine.report_real_index(real_index).map_err(from_error)?;
    Ok(StatusCode::OK)
}

/// POST /api/renderer/video-ended
pub async fn renderer_video_ended(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.engine.on_video_ended().map_err(from_error)?;
    Ok(StatusCode::OK)
}

/// POST /api/renderer/status - playing flag for a video slide
pub async fn renderer_status(
    State(state): State<AppState>,
    Json(report): Json<PlayingReport>,
) -> StatusCode {
    if !report.playing {
        warn!("Renderer reports video {} not playing", report.slide_id);
    }
    state.carousel.set_playing(&report.slide_id, report.playing);
    StatusCode::OK
}

// ============================================================================
// Media
// ============================================================================

/// GET /api/media?url= - readiness entry for one URL
pub async fn get_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<MediaEntryResponse>, ApiError> {
    let entry = state
        .cache
        .entry(&query.url)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("error: {} not tracked", query.url)))?;

    Ok(Json(MediaEntryResponse {
        idle_seconds: entry.idle_for().as_secs(),
        url: entry.url,
        is_ready: entry.is_ready,
        is_preloading: entry.is_preloading,
        duration_seconds: entry.duration_seconds,
        error: entry.error,
    }))
}

/// POST /api/media/retry - reload a failed URL
pub async fn media_retry(
    State(state): State<AppState>,
    Json(query): Json<MediaQuery>,
) -> Json<MediaRetryResponse> {
    let ready = state.cache.retry(&query.url).await;
    Json(MediaRetryResponse {
        url: query.url,
        ready,
    })
}
