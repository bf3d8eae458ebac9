//! Test helper modules for kiosk-display integration tests
//!
//! - MockCarousel: records carousel calls, settable playing flags
//! - MockLoader: counts loads, configurable per-URL delays and failures
//! - Harness: engine wired to both mocks on a fresh EventBus

#![allow(dead_code)]

pub mod mocks;

pub use mocks::{CarouselCall, MockCarousel, MockLoader};

use kiosk_common::events::{EventBus, KioskEvent};
use kiosk_common::models::{Slide, SlideType};
use kiosk_display::media::MediaReadinessCache;
use kiosk_display::playback::{PlaybackEngine, PlaybackPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const PRELOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine plus the mocks it drives
pub struct Harness {
    pub engine: PlaybackEngine,
    pub carousel: Arc<MockCarousel>,
    pub loader: Arc<MockLoader>,
    pub cache: MediaReadinessCache,
    pub events: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_loader(MockLoader::new())
    }

    pub fn with_loader(loader: MockLoader) -> Self {
        let events = EventBus::new(1024);
        let loader = Arc::new(loader);
        let carousel = Arc::new(MockCarousel::new());
        let cache = MediaReadinessCache::new(loader.clone(), events.clone(), PRELOAD_TIMEOUT);
        let engine = PlaybackEngine::spawn(
            carousel.clone(),
            cache.clone(),
            events.clone(),
            PlaybackPolicy::default(),
        );
        Self {
            engine,
            carousel,
            loader,
            cache,
            events,
        }
    }
}

pub fn image(id: &str, secs: u32) -> Slide {
    Slide::new(id, SlideType::Image, secs)
}

pub fn video(id: &str, url: &str, secs: u32) -> Slide {
    Slide::video(id, url, secs)
}

/// Sleep on the (paused) test clock
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Everything currently queued on an event receiver
pub fn drain(rx: &mut broadcast::Receiver<KioskEvent>) -> Vec<KioskEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}
