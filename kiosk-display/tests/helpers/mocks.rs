//! Mock carousel and media loader

use async_trait::async_trait;
use kiosk_common::models::{Slide, TransitionEffect};
use kiosk_common::{Error, Result};
use kiosk_display::media::{LoadedMedia, MediaLoader};
use kiosk_display::playback::Carousel;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum CarouselCall {
    Render { ids: Vec<String>, start_index: usize },
    SlideTo(usize),
    SetEffect(TransitionEffect),
    SetNavigation(bool, bool),
    SetChrome(bool, bool),
    RestartMedia(String),
    ShowIdle,
}

#[derive(Default)]
pub struct MockCarousel {
    calls: Mutex<Vec<CarouselCall>>,
    playing: Mutex<HashMap<String, bool>>,
}

impl MockCarousel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CarouselCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&CarouselCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn renders(&self) -> usize {
        self.count(|c| matches!(c, CarouselCall::Render { .. }))
    }

    pub fn restarts(&self, slide_id: &str) -> usize {
        self.count(|c| *c == CarouselCall::RestartMedia(slide_id.to_string()))
    }

    pub fn set_playing(&self, slide_id: &str, playing: bool) {
        self.playing
            .lock()
            .unwrap()
            .insert(slide_id.to_string(), playing);
    }

    fn record(&self, call: CarouselCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Carousel for MockCarousel {
    fn render(&self, slides: &[Slide], start_index: usize) {
        self.record(CarouselCall::Render {
            ids: slides.iter().map(|s| s.id.clone()).collect(),
            start_index,
        });
    }

    fn slide_to(&self, real_index: usize) {
        self.record(CarouselCall::SlideTo(real_index));
    }

    fn set_effect(&self, effect: TransitionEffect) {
        self.record(CarouselCall::SetEffect(effect));
    }

    fn set_navigation(&self, show_arrows: bool, show_pagination: bool) {
        self.record(CarouselCall::SetNavigation(show_arrows, show_pagination));
    }

    fn set_chrome(&self, show_clock: bool, show_logo: bool) {
        self.record(CarouselCall::SetChrome(show_clock, show_logo));
    }

    fn restart_media(&self, slide_id: &str) {
        self.record(CarouselCall::RestartMedia(slide_id.to_string()));
    }

    fn is_playing(&self, slide_id: &str) -> bool {
        self.playing
            .lock()
            .unwrap()
            .get(slide_id)
            .copied()
            .unwrap_or(true)
    }

    fn show_idle(&self) {
        self.record(CarouselCall::ShowIdle);
    }
}

/// Loader that succeeds unless the URL contains "broken" or was marked failing
#[derive(Default)]
pub struct MockLoader {
    delays: HashMap<String, Duration>,
    failing: Mutex<HashSet<String>>,
    loads: AtomicUsize,
    releases: AtomicUsize,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// Make every later load of `url` fail
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaLoader for MockLoader {
    async fn load(&self, url: &str) -> Result<LoadedMedia> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if url.contains("broken") || self.failing.lock().unwrap().contains(url) {
            return Err(Error::asset(url, "unsupported codec"));
        }
        Ok(LoadedMedia {
            duration_seconds: Some(20.0),
            bytes: 1024,
        })
    }

    fn release(&self, _url: &str) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
