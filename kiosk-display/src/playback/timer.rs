//! Advance timer slot
//!
//! The engine owns exactly one of these. There is no way to hold two armed
//! timers: arming replaces whatever was armed before, so a late update can
//! never leave a second countdown racing the first.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// What the armed timer is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Fixed per-slide countdown; expiry advances
    Countdown,
    /// Video slide waiting on its end signal; expiry is the safety deadline
    VideoGate,
}

/// An armed advance timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedTimer {
    pub kind: TimerKind,
    pub slide_id: String,
    pub armed_at: Instant,
    pub deadline: Instant,
}

/// Single advance-timer slot
#[derive(Debug, Default)]
pub struct AdvanceTimer {
    armed: Option<ArmedTimer>,
}

impl AdvanceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `slide_id`, firing `after` from now; returns the timer it replaced
    pub fn arm(&mut self, kind: TimerKind, slide_id: &str, after: Duration) -> Option<ArmedTimer> {
        let now = Instant::now();
        self.armed.replace(ArmedTimer {
            kind,
            slide_id: slide_id.to_string(),
            armed_at: now,
            deadline: now + after,
        })
    }

    /// Cancel the armed timer, returning it
    pub fn disarm(&mut self) -> Option<ArmedTimer> {
        self.armed.take()
    }

    pub fn armed(&self) -> Option<&ArmedTimer> {
        self.armed.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|t| t.deadline)
    }

    pub fn kind(&self) -> Option<TimerKind> {
        self.armed.as_ref().map(|t| t.kind)
    }

    /// Number of armed timers (0 or 1)
    pub fn armed_count(&self) -> usize {
        usize::from(self.armed.is_some())
    }

    /// How far past its deadline the armed timer is at `now`
    pub fn overdue_by(&self, now: Instant) -> Option<Duration> {
        self.armed
            .as_ref()
            .and_then(|t| now.checked_duration_since(t.deadline))
    }
}
