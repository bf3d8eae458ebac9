//! Sync coordinator
//!
//! **Rules:**
//! - A notification whose timestamp is not newer than the last one applied
//!   for the same class is stale.
//! - A payload whose content hash matches what the engine already has is a
//!   duplicate and never reaches the engine.
//! - For a quiet window after a local edit, server slide updates are held
//!   back. Only the newest held update survives, and it is applied when
//!   the window closes only if it is newer than the local edit.

use chrono::{DateTime, Utc};
use kiosk_common::events::{EventBus, KioskEvent};
use kiosk_common::hash::content_hash;
use kiosk_common::models::{DisplaySettings, DisplaySnapshot, Slide, UpdateKind, UpdateNotification};
use kiosk_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::store::DisplayStore;
use crate::media::MediaReadinessCache;
use crate::playback::PlaybackEngine;

/// What happened to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Reached the engine
    Applied,
    /// Content identical to what the engine has
    Duplicate,
    /// Older than what was already applied
    Stale,
    /// Held back by the local-edit quiet window
    Suppressed,
    /// Not relevant to playback
    Ignored,
    /// Hard reset performed
    Reloaded,
}

#[derive(Debug, Clone, Copy)]
struct LocalEdit {
    at: Instant,
    wall: DateTime<Utc>,
}

#[derive(Default)]
struct SyncState {
    last_slides_at: Option<DateTime<Utc>>,
    last_settings_at: Option<DateTime<Utc>>,
    last_reload_at: Option<DateTime<Utc>>,
    slides_hash: Option<String>,
    settings_hash: Option<String>,
    /// Last slides and settings handed to the engine
    current: DisplaySnapshot,
    local_edit: Option<LocalEdit>,
    /// Newest slide update held back by the quiet window
    pending: Option<UpdateNotification>,
}

/// Reconciles update notifications into engine calls
pub struct SyncCoordinator {
    engine: PlaybackEngine,
    cache: MediaReadinessCache,
    store: Arc<dyn DisplayStore>,
    events: EventBus,
    quiet_window: Duration,
    state: Mutex<SyncState>,
    /// Wakes the run loop when the quiet-window deadline may have changed
    wake: Notify,
}

impl SyncCoordinator {
    pub fn new(
        engine: PlaybackEngine,
        cache: MediaReadinessCache,
        store: Arc<dyn DisplayStore>,
        events: EventBus,
        quiet_window: Duration,
    ) -> Self {
        Self {
            engine,
            cache,
            store,
            events,
            quiet_window,
            state: Mutex::new(SyncState::default()),
            wake: Notify::new(),
        }
    }

    /// Hand the stored display state to the engine at startup
    pub async fn bootstrap(&self) -> Result<()> {
        let snapshot = self.store.load().await?;
        info!("Bootstrapping display with {} slides", snapshot.slides.len());

        let mut state = self.state.lock().await;
        state.settings_hash = Some(content_hash(&snapshot.settings)?);
        state.slides_hash = Some(content_hash(&snapshot.slides)?);
        self.engine.apply_settings(snapshot.settings.clone())?;
        self.engine.set_rotation_set(snapshot.slides.clone())?;
        state.current = snapshot;
        Ok(())
    }

    /// Reconcile one notification
    pub async fn apply(&self, notification: UpdateNotification) -> Result<SyncOutcome> {
        debug!(
            "Update {} from {:?} at {}",
            notification.kind, notification.source, notification.timestamp
        );

        match notification.kind {
            UpdateKind::ApiData => Ok(SyncOutcome::Ignored),
            UpdateKind::ForceReload => {
                let mut state = self.state.lock().await;
                if is_stale(state.last_reload_at, notification.timestamp) {
                    return Ok(SyncOutcome::Stale);
                }
                state.last_reload_at = Some(notification.timestamp);
                self.reload(&mut state, &notification.source).await?;
                Ok(SyncOutcome::Reloaded)
            }
            UpdateKind::Slides => {
                let mut state = self.state.lock().await;
                self.apply_slides(&mut state, notification).await
            }
            UpdateKind::Settings => {
                let mut state = self.state.lock().await;
                self.apply_settings(&mut state, &notification).await
            }
            UpdateKind::All => {
                let mut state = self.state.lock().await;
                let settings = self.apply_settings(&mut state, &notification).await?;
                let slides = self.apply_slides(&mut state, notification).await?;
                Ok(combine(slides, settings))
            }
        }
    }

    /// Apply slides edited on this display
    ///
    /// Takes effect immediately, opens the quiet window and persists.
    pub async fn local_edit(&self, mut slides: Vec<Slide>) -> Result<()> {
        for slide in &mut slides {
            slide.ensure_id();
        }

        let mut state = self.state.lock().await;
        let now = Utc::now();
        state.local_edit = Some(LocalEdit {
            at: Instant::now(),
            wall: now,
        });
        state.last_slides_at = Some(state.last_slides_at.map_or(now, |last| last.max(now)));

        let hash = content_hash(&slides)?;
        if state.slides_hash.as_deref() != Some(hash.as_str()) {
            self.engine.set_rotation_set(slides.clone())?;
            state.slides_hash = Some(hash);
        }
        state.current.slides = slides;
        info!(
            "Local edit applied ({} slides), quiet window {}s",
            state.current.slides.len(),
            self.quiet_window.as_secs()
        );

        self.store.save(&state.current).await?;
        drop(state);

        self.wake.notify_one();
        Ok(())
    }

    /// Clear media, reload from the store and restart playback
    pub async fn force_reload(&self, source: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.reload(&mut state, source).await
    }

    /// Last slides and settings handed to the engine
    pub async fn current(&self) -> DisplaySnapshot {
        self.state.lock().await.current.clone()
    }

    /// True while a local edit's quiet window is open
    pub async fn in_quiet_window(&self) -> bool {
        let state = self.state.lock().await;
        self.window_open(&state)
    }

    /// Consume notifications from a transport until it closes
    ///
    /// Also applies a held-back update when its quiet window closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<UpdateNotification>) {
        info!("Sync coordinator started");
        loop {
            let deadline = self.flush_deadline().await;
            tokio::select! {
                notification = rx.recv() => match notification {
                    Some(notification) => {
                        let kind = notification.kind;
                        match self.apply(notification).await {
                            Ok(outcome) => debug!("Update {} -> {:?}", kind, outcome),
                            Err(e) => warn!("Failed to apply {} update: {}", kind, e),
                        }
                    }
                    None => break,
                },

                _ = wait_until(deadline) => {
                    if let Err(e) = self.flush_pending().await {
                        warn!("Failed to apply held-back update: {}", e);
                    }
                }

                _ = self.wake.notified() => {}
            }
        }
        info!("Sync coordinator stopped (update channel closed)");
    }

    /// Spawn [`run`](Self::run) on the runtime
    pub fn spawn(self: &Arc<Self>, rx: mpsc::Receiver<UpdateNotification>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(rx))
    }

    /// Apply the held-back update if the quiet window has closed
    pub async fn flush_pending(&self) -> Result<Option<SyncOutcome>> {
        let mut state = self.state.lock().await;
        if self.window_open(&state) {
            return Ok(None);
        }
        let Some(pending) = state.pending.take() else {
            return Ok(None);
        };

        let newer_than_edit = state
            .local_edit
            .map_or(true, |edit| pending.timestamp > edit.wall);
        if !newer_than_edit {
            info!(
                "Dropping held-back {} update from {:?}: local edit is newer",
                pending.kind, pending.source
            );
            return Ok(None);
        }

        info!("Quiet window closed, applying held-back {} update", pending.kind);
        let outcome = self.apply_slides(&mut state, pending).await?;
        Ok(Some(outcome))
    }

    async fn apply_slides(
        &self,
        state: &mut SyncState,
        notification: UpdateNotification,
    ) -> Result<SyncOutcome> {
        if is_stale(state.last_slides_at, notification.timestamp) {
            debug!("Stale slides update at {}", notification.timestamp);
            return Ok(SyncOutcome::Stale);
        }

        if self.window_open(state) {
            self.hold_back(state, notification);
            return Ok(SyncOutcome::Suppressed);
        }

        let slides = match notification.data.as_ref().map(extract_slides).transpose()?.flatten() {
            Some(slides) => slides,
            None => self.store.load().await?.slides,
        };

        let hash = content_hash(&slides)?;
        if state.slides_hash.as_deref() == Some(hash.as_str()) {
            debug!("Slides unchanged (hash {})", &hash[..12]);
            state.last_slides_at = Some(notification.timestamp);
            return Ok(SyncOutcome::Duplicate);
        }

        // Marked applied only once the engine has it, so a redelivery is not stale
        self.engine.set_rotation_set(slides.clone())?;
        state.last_slides_at = Some(notification.timestamp);
        state.slides_hash = Some(hash);
        state.current.slides = slides;
        Ok(SyncOutcome::Applied)
    }

    async fn apply_settings(
        &self,
        state: &mut SyncState,
        notification: &UpdateNotification,
    ) -> Result<SyncOutcome> {
        if is_stale(state.last_settings_at, notification.timestamp) {
            debug!("Stale settings update at {}", notification.timestamp);
            return Ok(SyncOutcome::Stale);
        }

        let bare_ok = notification.kind == UpdateKind::Settings;
        let settings = match notification
            .data
            .as_ref()
            .map(|data| extract_settings(data, bare_ok))
            .transpose()?
            .flatten()
        {
            Some(settings) => settings,
            None => self.store.load().await?.settings,
        };

        let hash = content_hash(&settings)?;
        if state.settings_hash.as_deref() == Some(hash.as_str()) {
            state.last_settings_at = Some(notification.timestamp);
            return Ok(SyncOutcome::Duplicate);
        }

        self.engine.apply_settings(settings.clone())?;
        state.last_settings_at = Some(notification.timestamp);
        state.settings_hash = Some(hash);
        state.current.settings = settings;
        Ok(SyncOutcome::Applied)
    }

    fn hold_back(&self, state: &mut SyncState, notification: UpdateNotification) {
        info!(
            "Holding back {} update from {:?} during local-edit quiet window",
            notification.kind, notification.source
        );
        self.events.emit_lossy(KioskEvent::UpdateSuppressed {
            kind: notification.kind,
            source: notification.source.clone(),
            timestamp: Utc::now(),
        });

        let replace = state
            .pending
            .as_ref()
            .map_or(true, |held| notification.timestamp > held.timestamp);
        if replace {
            state.pending = Some(notification);
        }
        self.wake.notify_one();
    }

    async fn reload(&self, state: &mut SyncState, source: &str) -> Result<()> {
        warn!("Force reload requested by {:?}", source);
        self.events.emit_lossy(KioskEvent::ForceReload {
            source: source.to_string(),
            timestamp: Utc::now(),
        });

        self.cache.clear();
        let snapshot = self.store.load().await?;

        self.engine.apply_settings(snapshot.settings.clone())?;
        self.engine.set_rotation_set(snapshot.slides.clone())?;
        self.engine.reset()?;

        state.slides_hash = Some(content_hash(&snapshot.slides)?);
        state.settings_hash = Some(content_hash(&snapshot.settings)?);
        state.pending = None;
        state.current = snapshot;
        Ok(())
    }

    fn window_open(&self, state: &SyncState) -> bool {
        state
            .local_edit
            .map_or(false, |edit| edit.at.elapsed() < self.quiet_window)
    }

    async fn flush_deadline(&self) -> Option<Instant> {
        let state = self.state.lock().await;
        state.pending.as_ref()?;
        Some(
            state
                .local_edit
                .map_or_else(Instant::now, |edit| edit.at + self.quiet_window),
        )
    }
}

fn is_stale(last: Option<DateTime<Utc>>, timestamp: DateTime<Utc>) -> bool {
    last.map_or(false, |last| timestamp <= last)
}

fn combine(slides: SyncOutcome, settings: SyncOutcome) -> SyncOutcome {
    use SyncOutcome::*;
    match (slides, settings) {
        (Applied, _) | (_, Applied) => Applied,
        (Suppressed, _) => Suppressed,
        (Duplicate, _) | (_, Duplicate) => Duplicate,
        _ => Stale,
    }
}

/// Slides carried by an update payload: a bare array or a `slides` key
fn extract_slides(data: &Value) -> Result<Option<Vec<Slide>>> {
    let slides = match data {
        Value::Array(_) => data,
        Value::Object(map) => match map.get("slides") {
            Some(slides) => slides,
            None => return Ok(None),
        },
        Value::Null => return Ok(None),
        other => {
            return Err(Error::InvalidInput(format!(
                "slides payload must be an array or object, got {}",
                other
            )))
        }
    };
    Ok(Some(serde_json::from_value(slides.clone())?))
}

/// Settings carried by an update payload: a `settings` key, or (for pure
/// settings updates) the object itself
fn extract_settings(data: &Value, bare_ok: bool) -> Result<Option<DisplaySettings>> {
    let Value::Object(map) = data else {
        return Ok(None);
    };
    if let Some(settings) = map.get("settings") {
        return Ok(Some(serde_json::from_value(settings.clone())?));
    }
    if bare_ok && !map.contains_key("slides") {
        return Ok(Some(serde_json::from_value(data.clone())?));
    }
    Ok(None)
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
