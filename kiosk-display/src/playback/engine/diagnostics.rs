//! Health check and status
//!
//! The engine is event driven; the health check is the detection-only
//! safety net that catches what the events missed (a lost timer, a
//! renderer that silently stopped playing, readiness nobody reported).

use chrono::Utc;
use kiosk_common::events::{AdvanceReason, KioskEvent};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::core::EngineTask;
use crate::playback::state::{EnginePhase, PlaybackSnapshot};
use crate::playback::timer::TimerKind;

impl EngineTask {
    pub(super) fn health_check(&mut self) {
        self.request_preloads();

        // Readiness can change without a waiter (explicit retry, eviction, clear)
        let unready = self.unready_in_rotation();
        if unready > 0 {
            warn!("Health check: {} rotation videos no longer ready", unready);
            self.refresh_rotation();
        } else if self.pending.iter().any(|p| self.cache.is_ready(&p.url)) {
            debug!("Health check: pending video became ready");
            self.refresh_rotation();
        }

        if self.rotation.is_empty() {
            if self.phase != EnginePhase::Idle {
                warn!("Health check: showing with an empty rotation");
                self.go_idle();
            }
            return;
        }

        if self.phase == EnginePhase::Idle {
            warn!("Health check: idle with {} eligible slides, restarting", self.rotation.len());
            self.restart(AdvanceReason::HealthCheck);
            return;
        }

        let Some(armed) = self.timer.armed().cloned() else {
            let slide_id = self.current_slide_id();
            warn!("Health check: no advance timer armed for {:?}, re-arming", slide_id);
            self.events.emit_lossy(KioskEvent::TimingAnomaly {
                slide_id,
                detail: "no advance timer armed".to_string(),
                timestamp: Utc::now(),
            });
            self.arm_current();
            return;
        };

        if let Some(overdue) = self.timer.overdue_by(Instant::now()) {
            if overdue > self.policy.health_check_interval {
                let detail = format!("advance overdue by {}ms", overdue.as_millis());
                warn!("Health check: slide {} {}, forcing advance", armed.slide_id, detail);
                self.events.emit_lossy(KioskEvent::TimingAnomaly {
                    slide_id: Some(armed.slide_id),
                    detail,
                    timestamp: Utc::now(),
                });
                self.advance(AdvanceReason::HealthCheck);
                return;
            }
        }

        if armed.kind == TimerKind::VideoGate {
            if self.carousel.is_playing(&armed.slide_id) {
                self.stuck_checks = 0;
            } else {
                self.stuck_checks += 1;
                debug!(
                    "Health check: video {} not playing ({} consecutive)",
                    armed.slide_id, self.stuck_checks
                );
                if self.stuck_checks >= self.policy.stuck_checks_before_restart {
                    info!("Restarting stuck video on slide {}", armed.slide_id);
                    self.carousel.restart_media(&armed.slide_id);
                    self.stuck_checks = 0;
                    self.events.emit_lossy(KioskEvent::VideoStuckRecovered {
                        slide_id: armed.slide_id,
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    fn current_slide_id(&self) -> Option<String> {
        self.current
            .and_then(|i| self.rotation.get(i))
            .map(|s| s.id.clone())
    }

    /// Seconds left on the visible slide's display duration, rounded up
    fn remaining_seconds(&self) -> u32 {
        let (Some(slide), Some(shown_at)) = (
            self.current.and_then(|i| self.rotation.get(i)),
            self.shown_at,
        ) else {
            return 0;
        };

        let remaining = self
            .policy
            .slide_duration(slide)
            .saturating_sub(shown_at.elapsed());
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }

    pub(super) fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            phase: self.phase,
            current_index: self.current,
            current_slide_id: self.current_slide_id(),
            remaining_seconds: self.remaining_seconds(),
            is_video_gating: self.timer.kind() == Some(TimerKind::VideoGate),
            armed_timers: self.timer.armed_count(),
            timer_kind: self.timer.kind(),
            rotation_len: self.rotation.len(),
            source_len: self.source.len(),
            pending_video_ids: self.pending.iter().map(|p| p.slide_id.clone()).collect(),
            transition_effect: self.settings.transition_effect,
            settings: self.settings.clone(),
            generation: self.generation,
        }
    }
}
