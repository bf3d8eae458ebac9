//! Playback policy
//!
//! The knobs that distinguish one display profile from another. Everything
//! else about playback is fixed behavior of the engine.

use kiosk_common::config::KioskConfig;
use kiosk_common::models::{ActivationDefaults, Slide, DEFAULT_SLIDE_DURATION_SECS};
use std::time::Duration;

/// Engine tuning parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPolicy {
    /// Upcoming slides whose video assets are warmed on each advance
    pub prefetch_window: usize,
    /// Added to a video slide's duration to form its safety deadline
    pub safety_buffer: Duration,
    /// Interval of the self-healing health check
    pub health_check_interval: Duration,
    /// Consecutive "not playing" health checks before a gated video is restarted
    pub stuck_checks_before_restart: u32,
    /// Duration of slides that carry none
    pub default_duration: Duration,
    /// Activation for slides without an explicit `active` flag
    pub activation: ActivationDefaults,
}

impl PlaybackPolicy {
    /// How long `slide` stays on screen (before any video safety buffer)
    pub fn slide_duration(&self, slide: &Slide) -> Duration {
        slide
            .duration
            .map(|secs| Duration::from_secs(u64::from(secs)))
            .unwrap_or(self.default_duration)
    }
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self {
            prefetch_window: 2,
            safety_buffer: Duration::from_secs(10),
            health_check_interval: Duration::from_secs(8),
            stuck_checks_before_restart: 2,
            default_duration: Duration::from_secs(u64::from(DEFAULT_SLIDE_DURATION_SECS)),
            activation: ActivationDefaults::default(),
        }
    }
}

impl From<&KioskConfig> for PlaybackPolicy {
    fn from(config: &KioskConfig) -> Self {
        Self {
            prefetch_window: config.playback.prefetch_window,
            safety_buffer: Duration::from_secs(config.playback.safety_buffer_secs),
            // Zero would spin the health check
            health_check_interval: Duration::from_secs(
                config.playback.health_check_interval_secs.max(1),
            ),
            default_duration: Duration::from_secs(u64::from(
                config.playback.default_duration_secs.max(1),
            )),
            activation: config.slides.activation_defaults(),
            ..Self::default()
        }
    }
}
