//! Server-Sent Events streams
//!
//! - `/events`: kiosk telemetry from the EventBus
//! - `/display/events`: carousel commands for display pages

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::carousel::DisplayCommand;
use super::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /events - telemetry stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New telemetry SSE client connected");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged subscriber; keep streaming
                warn!("Telemetry SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}

/// GET /display/events - carousel commands, current screen first
pub async fn display_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (catch_up, rx) = state.carousel.subscribe();
    debug!("Display page connected ({} catch-up commands)", catch_up.len());

    let live = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(command) => Some(command),
            Err(e) => {
                warn!("Display SSE stream error: {:?}", e);
                None
            }
        }
    });

    let stream = stream::iter(catch_up)
        .chain(live)
        .filter_map(|command| async move { to_event(&command) });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}

fn to_event(command: &DisplayCommand) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(command) {
        Ok(json) => Some(Ok(Event::default().event(command.name()).data(json))),
        Err(e) => {
            warn!("Failed to serialize display command: {}", e);
            None
        }
    }
}
