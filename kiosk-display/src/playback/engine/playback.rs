//! Showing and advancing
//!
//! **Responsibilities:**
//! - Arming the advance timer for the visible slide
//! - Advancing on timer expiry, video end, or manual skip
//! - Renderer callbacks and display settings
//! - Restart and idle transitions

use chrono::Utc;
use kiosk_common::events::{AdvanceReason, KioskEvent};
use kiosk_common::models::{DisplaySettings, TransitionEffect};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::core::EngineTask;
use crate::playback::state::{EnginePhase, SlideChange};
use crate::playback::timer::TimerKind;

impl EngineTask {
    /// Make `index` the visible slide and arm its timer
    ///
    /// Does not move the carousel; callers do that first (or the renderer
    /// already did).
    pub(super) fn show(&mut self, index: usize, reason: AdvanceReason) {
        let Some(slide) = self.rotation.get(index).cloned() else {
            warn!("Cannot show index {} of {}-slide rotation", index, self.rotation.len());
            return;
        };

        self.phase = EnginePhase::Showing;
        self.current = Some(index);
        self.shown_at = Some(Instant::now());
        self.stuck_checks = 0;
        self.arm_current();

        debug!(
            "Showing slide {} ({}/{}, {:?})",
            slide.id,
            index + 1,
            self.rotation.len(),
            reason
        );

        self.events.emit_lossy(KioskEvent::SlideChanged {
            slide_id: slide.id.clone(),
            index,
            rotation_len: self.rotation.len(),
            reason,
            timestamp: Utc::now(),
        });

        let change = SlideChange {
            is_video: slide.is_video(),
            slide_id: slide.id,
            index,
            rotation_len: self.rotation.len(),
            reason,
        };
        for observer in &self.observers {
            observer(&change);
        }
    }

    /// Arm the advance timer for the visible slide, replacing any armed timer
    pub(super) fn arm_current(&mut self) {
        let Some(slide) = self.current.and_then(|i| self.rotation.get(i)) else {
            self.timer.disarm();
            return;
        };

        let duration = self.policy.slide_duration(slide);
        if slide.is_video() {
            self.timer.arm(
                TimerKind::VideoGate,
                &slide.id,
                duration + self.policy.safety_buffer,
            );
        } else {
            self.timer.arm(TimerKind::Countdown, &slide.id, duration);
        }
    }

    /// Move to the next slide in the rotation
    pub(super) fn advance(&mut self, reason: AdvanceReason) {
        self.timer.disarm();

        if self.unready_in_rotation() > 0 {
            self.advance_pruned(reason);
            return;
        }

        let len = self.rotation.len();
        if len == 0 {
            self.go_idle();
            return;
        }

        let next = self.current.map(|i| (i + 1) % len).unwrap_or(0);
        self.prefetch_from(next);

        if len == 1 {
            // Nothing to transition to; replay the slide in place
            if let Some(slide) = self.rotation.get(0) {
                self.carousel.restart_media(&slide.id);
            }
        } else {
            self.carousel.slide_to(next);
        }

        self.show(next, reason);
    }

    /// Advance after dropping rotation videos that stopped being ready
    ///
    /// The next slide is the first one after the current slide (in the old
    /// order) that survives the rebuild.
    fn advance_pruned(&mut self, reason: AdvanceReason) {
        let old = std::mem::take(&mut self.rotation);
        let from = self.current.map(|i| i + 1).unwrap_or(0);

        let build = self.build_rotation();
        self.pending = build.pending_videos;
        self.rotation = build.rotation;
        self.request_preloads();
        info!(
            "Dropped {} unready videos from rotation ({} slides left)",
            old.len().saturating_sub(self.rotation.len()),
            self.rotation.len()
        );

        if self.rotation.is_empty() {
            self.go_idle();
            return;
        }

        let next = old
            .upcoming(from % old.len(), old.len())
            .find_map(|s| self.rotation.position_of(&s.id))
            .unwrap_or(0);
        self.prefetch_from(next);
        self.carousel.render(self.rotation.slides(), next);
        self.show(next, reason);
    }

    /// Warm the assets of the next `prefetch_window` slides
    fn prefetch_from(&mut self, from: usize) {
        let urls: Vec<String> = self
            .rotation
            .upcoming(from, self.policy.prefetch_window)
            .filter_map(|s| s.video_url())
            .filter(|url| !self.cache.is_ready(url))
            .map(str::to_string)
            .collect();

        for url in urls {
            debug!("Prefetching {}", url);
            self.spawn_preload(&url);
        }
    }

    /// Restart from the first slide, or go idle if nothing is eligible
    pub(super) fn restart(&mut self, reason: AdvanceReason) {
        self.timer.disarm();
        self.generation += 1;

        if self.rotation.is_empty() {
            self.go_idle();
            return;
        }

        self.carousel.render(self.rotation.slides(), 0);
        self.show(0, reason);
    }

    pub(super) fn go_idle(&mut self) {
        self.timer.disarm();
        self.current = None;
        self.shown_at = None;
        self.stuck_checks = 0;

        if self.phase != EnginePhase::Idle {
            info!("No eligible slides, display idle");
        }
        self.phase = EnginePhase::Idle;
        self.carousel.show_idle();
        self.events.emit_lossy(KioskEvent::RotationIdle {
            timestamp: Utc::now(),
        });
    }

    pub(super) fn on_timer_expired(&mut self) {
        let Some(expired) = self.timer.disarm() else {
            return;
        };

        match expired.kind {
            TimerKind::Countdown => self.advance(AdvanceReason::Timer),
            TimerKind::VideoGate => {
                let detail = format!(
                    "no video end signal within {}s safety deadline",
                    expired.deadline.duration_since(expired.armed_at).as_secs()
                );
                warn!("Video slide {}: {}, advancing", expired.slide_id, detail);
                self.events.emit_lossy(KioskEvent::TimingAnomaly {
                    slide_id: Some(expired.slide_id),
                    detail,
                    timestamp: Utc::now(),
                });
                self.advance(AdvanceReason::SafetyTimeout);
            }
        }
    }

    pub(super) fn on_video_ended(&mut self) {
        if self.timer.kind() != Some(TimerKind::VideoGate) {
            debug!("Ignoring video end signal (not gating on a video)");
            return;
        }
        self.advance(AdvanceReason::VideoEnded);
    }

    /// Renderer reports the carousel moved on its own
    pub(super) fn report_real_index(&mut self, index: usize) {
        if index >= self.rotation.len() {
            warn!(
                "Ignoring renderer index {} outside {}-slide rotation",
                index,
                self.rotation.len()
            );
            return;
        }
        if self.phase == EnginePhase::Showing && self.current == Some(index) {
            return;
        }
        self.show(index, AdvanceReason::Manual);
    }

    /// Operator skip
    pub(super) fn skip(&mut self) {
        match self.phase {
            EnginePhase::Showing => self.advance(AdvanceReason::Manual),
            EnginePhase::Idle if !self.rotation.is_empty() => self.restart(AdvanceReason::Manual),
            EnginePhase::Idle => debug!("Ignoring skip while idle"),
        }
    }

    /// Rebuild from the current source and restart
    pub(super) fn reset(&mut self) {
        self.awaiting.clear();
        let build = self.build_rotation();
        self.rotation = build.rotation;
        self.pending = build.pending_videos;
        self.request_preloads();
        info!("Playback reset ({} slides in rotation)", self.rotation.len());
        self.restart(AdvanceReason::Reset);
    }

    pub(super) fn set_transition_effect(&mut self, effect: TransitionEffect) {
        if self.settings.transition_effect == effect {
            return;
        }
        info!("Transition effect: {}", effect);
        self.settings.transition_effect = effect;
        self.carousel.set_effect(effect);
        self.rerender_in_place();
    }

    pub(super) fn apply_settings(&mut self, settings: DisplaySettings) {
        let effect_changed = settings.transition_effect != self.settings.transition_effect;

        self.carousel.set_effect(settings.transition_effect);
        self.carousel
            .set_navigation(!settings.hide_arrows, !settings.hide_pagination);
        self.carousel.set_chrome(settings.show_clock, !settings.hide_logo);
        self.settings = settings;

        if effect_changed {
            self.rerender_in_place();
        }

        self.events.emit_lossy(KioskEvent::SettingsApplied {
            transition_effect: self.settings.transition_effect,
            timestamp: Utc::now(),
        });
    }

    /// Re-render at the visible slide without touching the timer
    fn rerender_in_place(&self) {
        if let (EnginePhase::Showing, Some(index)) = (self.phase, self.current) {
            self.carousel.render(self.rotation.slides(), index);
        }
    }
}
