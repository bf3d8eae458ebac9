//! Observable playback state

use kiosk_common::events::AdvanceReason;
use kiosk_common::models::{DisplaySettings, TransitionEffect};
use serde::Serialize;

use super::timer::TimerKind;

/// Coarse engine phase
///
/// Advancing is transient inside the engine task and never observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// Rotation set is empty; the idle fallback is on screen
    Idle,
    /// A slide is on screen with its advance timer armed
    Showing,
}

/// Point-in-time view of the engine, as returned by `PlaybackEngine::status`
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSnapshot {
    pub phase: EnginePhase,
    /// Real index into the rotation set
    pub current_index: Option<usize>,
    pub current_slide_id: Option<String>,
    /// Seconds left on the current slide's display duration (display only)
    pub remaining_seconds: u32,
    pub is_video_gating: bool,
    /// Always 0 or 1
    pub armed_timers: usize,
    pub timer_kind: Option<TimerKind>,
    pub rotation_len: usize,
    /// Slides in the source list before filtering
    pub source_len: usize,
    /// Eligible video slides waiting on their assets
    pub pending_video_ids: Vec<String>,
    pub transition_effect: TransitionEffect,
    pub settings: DisplaySettings,
    /// Bumped on every restart from the first slide
    pub generation: u64,
}

/// Delivered to slide observers whenever a slide becomes visible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideChange {
    pub slide_id: String,
    pub index: usize,
    pub rotation_len: usize,
    pub reason: AdvanceReason,
    pub is_video: bool,
}

/// Registered through `PlaybackEngine::on_slide_change`
pub type SlideObserver = Box<dyn Fn(&SlideChange) + Send + Sync>;
