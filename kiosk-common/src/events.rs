//! Telemetry event types for the kiosk event system
//!
//! Provides the shared event definitions and the EventBus used by the
//! playback engine, media cache and sync coordinator. Events are
//! fire-and-forget; an observability collaborator (SSE stream, log shipper)
//! subscribes and nobody is required to listen.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{TransitionEffect, UpdateKind};

/// Why the engine moved to another slide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceReason {
    /// Fixed countdown expired
    Timer,
    /// Renderer reported the video finished
    VideoEnded,
    /// Video safety deadline fired without an end signal
    SafetyTimeout,
    /// Operator skip or renderer navigation (arrows, dots)
    Manual,
    /// Rotation set was rebuilt and playback restarted
    Reset,
    /// Health check found a missed advance
    HealthCheck,
}

/// Kiosk telemetry events
///
/// Serialized with an internal `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KioskEvent {
    /// A slide became the visible slide
    SlideChanged {
        slide_id: String,
        /// Real index into the rotation set
        index: usize,
        rotation_len: usize,
        reason: AdvanceReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Rotation set is empty; the display shows its idle state
    RotationIdle {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Health check found a stalled video and restarted it
    VideoStuckRecovered {
        slide_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Expected advance did not occur on time
    TimingAnomaly {
        slide_id: Option<String>,
        detail: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video asset is buffered and playable
    PreloadCompleted {
        url: String,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video asset failed to load (error or timeout)
    PreloadFailed {
        url: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video slide left out of the rotation because its asset is not ready
    VideoExcluded {
        slide_id: String,
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// New slide list applied to the engine
    SlidesApplied {
        slide_count: usize,
        rotation_len: usize,
        /// True if playback restarted from the first slide
        reset: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// New display settings applied
    SettingsApplied {
        transition_effect: TransitionEffect,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Server update held back by the local-edit quiet window
    UpdateSuppressed {
        kind: UpdateKind,
        source: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Hard reset requested by an update
    ForceReload {
        source: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl KioskEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            KioskEvent::SlideChanged { .. } => "SlideChanged",
            KioskEvent::RotationIdle { .. } => "RotationIdle",
            KioskEvent::VideoStuckRecovered { .. } => "VideoStuckRecovered",
            KioskEvent::TimingAnomaly { .. } => "TimingAnomaly",
            KioskEvent::PreloadCompleted { .. } => "PreloadCompleted",
            KioskEvent::PreloadFailed { .. } => "PreloadFailed",
            KioskEvent::VideoExcluded { .. } => "VideoExcluded",
            KioskEvent::SlidesApplied { .. } => "SlidesApplied",
            KioskEvent::SettingsApplied { .. } => "SettingsApplied",
            KioskEvent::UpdateSuppressed { .. } => "UpdateSuppressed",
            KioskEvent::ForceReload { .. } => "ForceReload",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// One bus per display session; pass clones to each component.
///
/// # Examples
///
/// ```
/// use kiosk_common::events::{EventBus, KioskEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(KioskEvent::RotationIdle { timestamp: chrono::Utc::now() });
/// assert!(matches!(rx.try_recv(), Ok(KioskEvent::RotationIdle { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KioskEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: KioskEvent,
    ) -> Result<usize, broadcast::error::SendError<KioskEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KioskEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
