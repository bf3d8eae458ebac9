//! Carousel for browser displays
//!
//! Engine carousel calls become `DisplayCommand`s broadcast to every
//! connected display page over `/display/events`. The page reports back
//! through the renderer endpoints (index changes, video end, playing state).

use kiosk_common::models::{Slide, TransitionEffect};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use crate::playback::Carousel;

/// Instruction for a display page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DisplayCommand {
    Render {
        slides: Vec<Slide>,
        start_index: usize,
    },
    SlideTo {
        index: usize,
    },
    SetEffect {
        effect: TransitionEffect,
    },
    SetNavigation {
        show_arrows: bool,
        show_pagination: bool,
    },
    SetChrome {
        show_clock: bool,
        show_logo: bool,
    },
    RestartMedia {
        slide_id: String,
    },
    ShowIdle,
}

impl DisplayCommand {
    /// Name used as the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            DisplayCommand::Render { .. } => "render",
            DisplayCommand::SlideTo { .. } => "slide_to",
            DisplayCommand::SetEffect { .. } => "set_effect",
            DisplayCommand::SetNavigation { .. } => "set_navigation",
            DisplayCommand::SetChrome { .. } => "set_chrome",
            DisplayCommand::RestartMedia { .. } => "restart_media",
            DisplayCommand::ShowIdle => "show_idle",
        }
    }
}

/// Latest state a newly connected page needs to catch up
#[derive(Default)]
struct Replay {
    /// Last Render (with its index kept current) or ShowIdle
    screen: Option<DisplayCommand>,
    effect: Option<DisplayCommand>,
    navigation: Option<DisplayCommand>,
    chrome: Option<DisplayCommand>,
}

#[derive(Default)]
struct CarouselState {
    replay: Replay,
    /// Playing flags reported by pages; absent means playing
    playing: HashMap<String, bool>,
}

/// Carousel that drives browser pages over a broadcast channel
pub struct BroadcastCarousel {
    tx: broadcast::Sender<DisplayCommand>,
    state: Mutex<CarouselState>,
}

impl BroadcastCarousel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            state: Mutex::new(CarouselState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CarouselState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe, returning the commands that bring a fresh page up to date
    pub fn subscribe(&self) -> (Vec<DisplayCommand>, broadcast::Receiver<DisplayCommand>) {
        let state = self.lock();
        let rx = self.tx.subscribe();
        let replay = &state.replay;
        let catch_up = [&replay.effect, &replay.navigation, &replay.chrome, &replay.screen]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        (catch_up, rx)
    }

    /// Page reports whether the video on `slide_id` is playing
    pub fn set_playing(&self, slide_id: &str, playing: bool) {
        self.lock().playing.insert(slide_id.to_string(), playing);
    }

    fn send(&self, command: DisplayCommand) {
        if self.tx.send(command).is_err() {
            debug!("No display pages connected");
        }
    }
}

impl Carousel for BroadcastCarousel {
    fn render(&self, slides: &[Slide], start_index: usize) {
        let command = DisplayCommand::Render {
            slides: slides.to_vec(),
            start_index,
        };
        self.lock().replay.screen = Some(command.clone());
        self.send(command);
    }

    fn slide_to(&self, real_index: usize) {
        if let Some(DisplayCommand::Render { start_index, .. }) = &mut self.lock().replay.screen {
            *start_index = real_index;
        }
        self.send(DisplayCommand::SlideTo { index: real_index });
    }

    fn set_effect(&self, effect: TransitionEffect) {
        let command = DisplayCommand::SetEffect { effect };
        self.lock().replay.effect = Some(command.clone());
        self.send(command);
    }

    fn set_navigation(&self, show_arrows: bool, show_pagination: bool) {
        let command = DisplayCommand::SetNavigation {
            show_arrows,
            show_pagination,
        };
        self.lock().replay.navigation = Some(command.clone());
        self.send(command);
    }

    fn set_chrome(&self, show_clock: bool, show_logo: bool) {
        let command = DisplayCommand::SetChrome {
            show_clock,
            show_logo,
        };
        self.lock().replay.chrome = Some(command.clone());
        self.send(command);
    }

    fn restart_media(&self, slide_id: &str) {
        self.lock().playing.remove(slide_id);
        self.send(DisplayCommand::RestartMedia {
            slide_id: slide_id.to_string(),
        });
    }

    fn is_playing(&self, slide_id: &str) -> bool {
        self.lock().playing.get(slide_id).copied().unwrap_or(true)
    }

    fn show_idle(&self) {
        self.lock().replay.screen = Some(DisplayCommand::ShowIdle);
        self.send(DisplayCommand::ShowIdle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_common::models::SlideType;

    #[test]
    fn test_late_subscriber_catches_up() {
        let carousel = BroadcastCarousel::new(16);
        carousel.set_effect(TransitionEffect::Fade);
        carousel.render(
            &[Slide::new("a", SlideType::Text, 5), Slide::new("b", SlideType::Text, 5)],
            0,
        );
        carousel.slide_to(1);

        let (catch_up, _rx) = carousel.subscribe();
        assert_eq!(catch_up.len(), 2);
        assert_eq!(catch_up[0], DisplayCommand::SetEffect { effect: TransitionEffect::Fade });
        assert!(matches!(catch_up[1], DisplayCommand::Render { start_index: 1, .. }));
    }

    #[test]
    fn test_live_commands_are_broadcast() {
        let carousel = BroadcastCarousel::new(16);
        let (_, mut rx) = carousel.subscribe();

        carousel.show_idle();
        assert_eq!(rx.try_recv().unwrap(), DisplayCommand::ShowIdle);

        let json = serde_json::to_value(DisplayCommand::SlideTo { index: 3 }).unwrap();
        assert_eq!(json["command"], "slide_to");
        assert_eq!(json["index"], 3);
    }

    #[test]
    fn test_playing_defaults_to_true_and_resets_on_restart() {
        let carousel = BroadcastCarousel::new(16);
        assert!(carousel.is_playing("v"));

        carousel.set_playing("v", false);
        assert!(!carousel.is_playing("v"));

        carousel.restart_media("v");
        assert!(carousel.is_playing("v"));
    }
}
