//! Slide, settings and update notification models
//!
//! These are the wire shapes produced by the authoring side and consumed by
//! the display. The playback core only reads `id`, `type`, `active`,
//! `duration` and, for video slides, `data.videoUrl`; everything else in
//! `data` is opaque and passed through to the renderer untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback display time for an active slide with no duration set
pub const DEFAULT_SLIDE_DURATION_SECS: u32 = 10;

/// Slide type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideType {
    Image,
    Video,
    News,
    Event,
    Text,
    Graph,
    Document,
    TeamComparison,
    CurrentEscalations,
}

impl std::fmt::Display for SlideType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SlideType::Image => "image",
            SlideType::Video => "video",
            SlideType::News => "news",
            SlideType::Event => "event",
            SlideType::Text => "text",
            SlideType::Graph => "graph",
            SlideType::Document => "document",
            SlideType::TeamComparison => "team-comparison",
            SlideType::CurrentEscalations => "current-escalations",
        };
        f.write_str(s)
    }
}

/// Activation applied to slides that carry no explicit `active` flag
///
/// Event slides (birthdays, anniversaries) are generated automatically, so
/// whether they show up without an operator opting in is a deployment choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationDefaults {
    /// Default for `event` slides without an `active` flag
    pub event_slides: bool,
}

impl Default for ActivationDefaults {
    fn default() -> Self {
        Self { event_slides: false }
    }
}

/// A single slide in the display list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// Stable identifier, assigned at creation and never reused
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub slide_type: SlideType,

    /// Explicit activation flag (None = use [`ActivationDefaults`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    /// Display time in seconds; `Some(0)` removes the slide from rotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    /// Type-specific payload
    #[serde(default)]
    pub data: serde_json::Value,

    /// Display label (not used by playback)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Slide {
    /// Create a slide with an explicit id and duration
    pub fn new(id: impl Into<String>, slide_type: SlideType, duration: u32) -> Self {
        Self {
            id: id.into(),
            slide_type,
            active: Some(true),
            duration: Some(duration),
            data: serde_json::Value::Null,
            name: None,
        }
    }

    /// Create an active video slide pointing at `url`
    pub fn video(id: impl Into<String>, url: impl Into<String>, duration: u32) -> Self {
        let mut slide = Self::new(id, SlideType::Video, duration);
        slide.data = serde_json::json!({ "videoUrl": url.into() });
        slide
    }

    /// Whether this slide is a video slide
    pub fn is_video(&self) -> bool {
        self.slide_type == SlideType::Video
    }

    /// Video URL for video slides (None if missing or empty)
    pub fn video_url(&self) -> Option<&str> {
        if !self.is_video() {
            return None;
        }
        self.data
            .get("videoUrl")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Resolve activation against the configured defaults
    pub fn is_active(&self, defaults: &ActivationDefaults) -> bool {
        match self.active {
            Some(active) => active,
            None if self.slide_type == SlideType::Event => defaults.event_slides,
            None => true,
        }
    }

    /// Effective display time in seconds (0 means excluded)
    pub fn duration_secs(&self) -> u32 {
        self.duration.unwrap_or(DEFAULT_SLIDE_DURATION_SECS)
    }

    /// Assign a fresh identifier if the slide has none yet
    ///
    /// Returns true if an id was assigned.
    pub fn ensure_id(&mut self) -> bool {
        if self.id.trim().is_empty() {
            self.id = Uuid::new_v4().to_string();
            return true;
        }
        false
    }
}

/// Carousel transition effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionEffect {
    #[default]
    Slide,
    Fade,
    Cube,
    Coverflow,
    Flip,
    Cards,
}

impl std::fmt::Display for TransitionEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransitionEffect::Slide => "slide",
            TransitionEffect::Fade => "fade",
            TransitionEffect::Cube => "cube",
            TransitionEffect::Coverflow => "coverflow",
            TransitionEffect::Flip => "flip",
            TransitionEffect::Cards => "cards",
        };
        f.write_str(s)
    }
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    pub transition_effect: TransitionEffect,
    pub hide_arrows: bool,
    pub hide_pagination: bool,
    pub show_clock: bool,
    pub hide_logo: bool,
}

/// Everything a display needs to render: the slide list plus settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySnapshot {
    pub slides: Vec<Slide>,
    pub settings: DisplaySettings,
}

/// Update notification class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    /// Slide list replaced
    Slides,
    /// Display settings replaced
    Settings,
    /// Hard reset of the display
    ForceReload,
    /// Data for data-driven slides; irrelevant to playback
    ApiData,
    /// Slides and settings together
    All,
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateKind::Slides => "slides",
            UpdateKind::Settings => "settings",
            UpdateKind::ForceReload => "force-reload",
            UpdateKind::ApiData => "api-data",
            UpdateKind::All => "all",
        };
        f.write_str(s)
    }
}

/// Update notification delivered by a transport
///
/// Delivery is at-least-once and may arrive out of order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotification {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub timestamp: DateTime<Utc>,
    /// Originating transport or peer (e.g. "server", "socket", "tab")
    #[serde(default)]
    pub source: String,
    /// Inline payload; when absent the receiver reloads from its store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl UpdateNotification {
    /// Create a notification stamped with the current time
    pub fn new(kind: UpdateKind, source: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            source: source.into(),
            data,
        }
    }
}
