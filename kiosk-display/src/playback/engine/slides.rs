//! Slide source and rotation maintenance
//!
//! **Responsibilities:**
//! - Replacing the slide source (in-place update vs. restart)
//! - Rebuilding the rotation when video readiness changes
//! - Starting and tracking preloads for eligible video slides

use chrono::Utc;
use kiosk_common::events::{AdvanceReason, KioskEvent};
use kiosk_common::models::Slide;
use tracing::{debug, info, warn};

use super::core::{EngineCommand, EngineTask};
use crate::playback::rotation::{RotationBuild, RotationSet};
use crate::playback::state::EnginePhase;

impl EngineTask {
    pub(super) fn build_rotation(&self) -> RotationBuild {
        let cache = &self.cache;
        RotationSet::build(&self.source, &self.policy.activation, |url| {
            cache.is_ready(url)
        })
    }

    /// Replace the slide source
    pub(super) fn set_source(&mut self, slides: Vec<Slide>) {
        self.source = slides;
        let build = self.build_rotation();
        if !build.malformed.is_empty() {
            warn!(
                "Skipped {} malformed slides: {}",
                build.malformed.len(),
                build.malformed.join(", ")
            );
        }
        self.pending = build.pending_videos;
        self.request_preloads();

        let in_place = self.phase == EnginePhase::Showing
            && !build.rotation.is_empty()
            && build.rotation.same_membership(&self.rotation);
        let both_empty = build.rotation.is_empty() && self.rotation.is_empty();

        if in_place {
            let content_changed = build.rotation != self.rotation;
            self.rotation = build.rotation;
            if content_changed {
                if let Some(index) = self.current {
                    debug!("Slide content changed, re-rendering at index {}", index);
                    self.carousel.render(self.rotation.slides(), index);
                }
            }
            info!(
                "Applied {} slides in place ({} in rotation)",
                self.source.len(),
                self.rotation.len()
            );
        } else if both_empty && self.phase == EnginePhase::Idle {
            debug!("Applied {} slides, rotation still empty", self.source.len());
        } else {
            self.rotation = build.rotation;
            info!(
                "Rotation changed ({} of {} slides eligible), restarting",
                self.rotation.len(),
                self.source.len()
            );
            self.restart(AdvanceReason::Reset);
        }

        self.events.emit_lossy(KioskEvent::SlidesApplied {
            slide_count: self.source.len(),
            rotation_len: self.rotation.len(),
            reset: !(in_place || both_empty),
            timestamp: Utc::now(),
        });
    }

    /// Re-evaluate the rotation after asset readiness changed
    ///
    /// Keeps the visible slide when it remains eligible, so an asset
    /// finishing its preload never interrupts what is on screen.
    pub(super) fn refresh_rotation(&mut self) {
        let build = self.build_rotation();
        self.pending = build.pending_videos;

        if build.rotation.same_membership(&self.rotation) {
            self.rotation = build.rotation;
            return;
        }

        let current_id = self
            .current
            .and_then(|i| self.rotation.get(i))
            .map(|s| s.id.clone());
        let kept = current_id
            .as_deref()
            .and_then(|id| build.rotation.position_of(id));

        self.rotation = build.rotation;

        match kept {
            Some(index) if self.phase == EnginePhase::Showing => {
                info!(
                    "Rotation now has {} slides, keeping current slide at index {}",
                    self.rotation.len(),
                    index
                );
                self.current = Some(index);
                self.carousel.render(self.rotation.slides(), index);
            }
            _ => {
                info!(
                    "Rotation now has {} slides, restarting",
                    self.rotation.len()
                );
                self.restart(AdvanceReason::Reset);
            }
        }
    }

    /// Start preloads for eligible video slides the cache is not tracking
    pub(super) fn request_preloads(&mut self) {
        let urls: Vec<String> = self
            .source
            .iter()
            .filter(|s| s.is_active(&self.policy.activation) && s.duration_secs() > 0)
            .filter_map(|s| s.video_url())
            .filter(|url| match self.cache.entry(url) {
                None => true,
                Some(entry) => entry.is_preloading,
            })
            .map(str::to_string)
            .collect();

        for url in urls {
            self.spawn_preload(&url);
        }
    }

    /// Preload `url` in the background and report back when it settles
    ///
    /// At most one waiter per URL; the cache shares the actual load.
    pub(super) fn spawn_preload(&mut self, url: &str) {
        if !self.awaiting.insert(url.to_string()) {
            return;
        }

        let cache = self.cache.clone();
        let notify = self.preload_tx.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            cache.preload(&url).await;
            if let Some(tx) = notify.upgrade() {
                let _ = tx.send(EngineCommand::PreloadSettled { url });
            }
        });
    }

    pub(super) fn on_preload_settled(&mut self, url: String) {
        self.awaiting.remove(&url);

        match self.cache.entry(&url) {
            // A newer load started after a cache clear
            Some(entry) if entry.is_preloading => self.spawn_preload(&url),
            Some(entry) if entry.is_ready => self.refresh_rotation(),
            Some(entry) => {
                let reason = entry.error.unwrap_or_else(|| "not ready".to_string());
                for slide in self.source.iter().filter(|s| s.video_url() == Some(url.as_str())) {
                    warn!(
                        "Excluding video slide {} from rotation: {} ({})",
                        slide.id, url, reason
                    );
                    self.events.emit_lossy(KioskEvent::VideoExcluded {
                        slide_id: slide.id.clone(),
                        url: url.clone(),
                        timestamp: Utc::now(),
                    });
                }
                // A reload of a video already in rotation can fail too
                self.refresh_rotation();
            }
            None => debug!("Preload of {} settled after cache clear", url),
        }
    }

    /// Number of rotation videos whose assets are not ready
    ///
    /// Queries every URL, which also marks in-use assets as accessed so the
    /// cache sweeper never evicts them.
    pub(super) fn unready_in_rotation(&self) -> usize {
        self.rotation
            .slides()
            .iter()
            .filter_map(|s| s.video_url())
            .filter(|url| !self.cache.is_ready(url))
            .count()
    }
}
