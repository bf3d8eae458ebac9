//! Media readiness cache
//!
//! Tracks, per video URL, whether the asset has been buffered into a state
//! that plays through without stalling. The playback engine only shows a
//! video slide once its URL reports ready here; it is better to skip a slide
//! than to show a stalled player.
//!
//! One cache per display session. Cloning the cache clones a handle to the
//! same shared state.
//!
//! **Concurrency:** duplicate preload requests for the same URL await one
//! shared in-flight load. The load runs in its own task, so a caller that
//! gives up waiting does not cancel it for the others.

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use kiosk_common::events::{EventBus, KioskEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::loader::MediaLoader;

type InFlight = Shared<BoxFuture<'static, bool>>;

/// Readiness bookkeeping for one video URL
#[derive(Debug, Clone)]
pub struct MediaCacheEntry {
    pub url: String,
    pub is_ready: bool,
    pub is_preloading: bool,
    pub last_accessed_at: Instant,
    pub duration_seconds: Option<f64>,
    /// Last load failure; cleared only by an explicit retry
    pub error: Option<String>,
}

impl MediaCacheEntry {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            is_ready: false,
            is_preloading: false,
            last_accessed_at: Instant::now(),
            duration_seconds: None,
            error: None,
        }
    }

    /// Time since the entry was last touched
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_accessed_at)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, MediaCacheEntry>,
    in_flight: HashMap<String, InFlight>,
    /// Bumped by clear(); loads started under an older generation are discarded
    generation: u64,
}

struct CacheShared {
    loader: Arc<dyn MediaLoader>,
    events: EventBus,
    preload_timeout: Duration,
    state: Mutex<CacheState>,
}

impl CacheShared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared media readiness cache handle
#[derive(Clone)]
pub struct MediaReadinessCache {
    shared: Arc<CacheShared>,
}

impl MediaReadinessCache {
    /// Create a cache driving `loader`, giving each load `preload_timeout`
    pub fn new(loader: Arc<dyn MediaLoader>, events: EventBus, preload_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                loader,
                events,
                preload_timeout,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Preload `url`, resolving to whether it is ready to play through
    ///
    /// Idempotent: a ready URL resolves immediately, an in-flight URL awaits
    /// the existing load. A URL whose last load failed resolves false without
    /// reloading; use [`retry`](Self::retry) to try again.
    pub async fn preload(&self, url: &str) -> bool {
        let in_flight = {
            let mut state = self.shared.lock();

            if let Some(entry) = state.entries.get_mut(url) {
                entry.last_accessed_at = Instant::now();
                if entry.is_ready {
                    return true;
                }
                if entry.error.is_some() && !entry.is_preloading {
                    debug!("Not reloading failed media {}", url);
                    return false;
                }
            }

            match state.in_flight.get(url) {
                Some(existing) => existing.clone(),
                None => {
                    let generation = state.generation;
                    let entry = state
                        .entries
                        .entry(url.to_string())
                        .or_insert_with(|| MediaCacheEntry::new(url));
                    entry.is_preloading = true;
                    entry.last_accessed_at = Instant::now();

                    let task = tokio::spawn(run_load(
                        Arc::clone(&self.shared),
                        url.to_string(),
                        generation,
                    ));
                    let shared = task.map(|joined| joined.unwrap_or(false)).boxed().shared();
                    state.in_flight.insert(url.to_string(), shared.clone());
                    shared
                }
            }
        };

        in_flight.await
    }

    /// Preload several URLs concurrently
    ///
    /// Completion order is unspecified; individual failures show up as
    /// `false` entries and never fail the batch.
    pub async fn preload_many<I, S>(&self, urls: I) -> HashMap<String, bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = urls.into_iter().map(Into::into).collect();
        unique.sort();
        unique.dedup();

        let results = join_all(unique.iter().map(|url| self.preload(url))).await;
        unique.into_iter().zip(results).collect()
    }

    /// Synchronous readiness query; false for unknown URLs
    pub fn is_ready(&self, url: &str) -> bool {
        let mut state = self.shared.lock();
        match state.entries.get_mut(url) {
            Some(entry) => {
                entry.last_accessed_at = Instant::now();
                entry.is_ready
            }
            None => false,
        }
    }

    /// Snapshot of the entry for `url`, without touching it
    pub fn entry(&self, url: &str) -> Option<MediaCacheEntry> {
        self.shared.lock().entries.get(url).cloned()
    }

    /// Number of tracked URLs
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear a failed entry and load it again
    pub async fn retry(&self, url: &str) -> bool {
        {
            let mut state = self.shared.lock();
            let failed = state
                .entries
                .get(url)
                .map(|e| e.error.is_some() && !e.is_preloading)
                .unwrap_or(false);
            if failed {
                info!("Retrying media preload for {}", url);
                state.entries.remove(url);
            }
        }
        self.preload(url).await
    }

    /// Remove entries idle longer than `max_age`, releasing their resources
    ///
    /// Entries with a load in flight are kept. Returns the number evicted.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let evicted: Vec<MediaCacheEntry> = {
            let mut state = self.shared.lock();
            let stale: Vec<String> = state
                .entries
                .values()
                .filter(|e| !e.is_preloading && e.idle_for() > max_age)
                .map(|e| e.url.clone())
                .collect();
            stale
                .iter()
                .filter_map(|url| state.entries.remove(url))
                .collect()
        };

        for entry in evicted.iter().filter(|e| e.is_ready) {
            self.shared.loader.release(&entry.url);
        }
        if !evicted.is_empty() {
            info!("Evicted {} stale media entries", evicted.len());
        }
        evicted.len()
    }

    /// Spawn the periodic background sweep
    ///
    /// The first sweep runs one `interval` after spawning.
    pub fn spawn_sweeper(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                "Media cache sweeper started ({}s interval, {}s max age)",
                interval.as_secs(),
                max_age.as_secs()
            );
            loop {
                ticker.tick().await;
                cache.evict_stale(max_age);
            }
        })
    }

    /// Release every entry; in-flight loads finish but are not recorded
    pub fn clear(&self) {
        let entries: Vec<MediaCacheEntry> = {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.in_flight.clear();
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries.iter().filter(|e| e.is_ready) {
            self.shared.loader.release(&entry.url);
        }
        info!("Media cache cleared ({} entries dropped)", entries.len());
    }
}

/// Drive one load to completion and record the outcome
async fn run_load(shared: Arc<CacheShared>, url: String, generation: u64) -> bool {
    let started = Instant::now();
    debug!("Preloading media {}", url);

    let outcome = match tokio::time::timeout(shared.preload_timeout, shared.loader.load(&url)).await {
        Ok(Ok(media)) => Ok(media),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "timed out after {}s",
            shared.preload_timeout.as_secs()
        )),
    };

    let recorded = {
        let mut state = shared.lock();
        if state.generation != generation {
            false
        } else {
            state.in_flight.remove(&url);
            let entry = state
                .entries
                .entry(url.clone())
                .or_insert_with(|| MediaCacheEntry::new(&url));
            entry.is_preloading = false;
            entry.last_accessed_at = Instant::now();
            match &outcome {
                Ok(media) => {
                    entry.is_ready = true;
                    entry.duration_seconds = media.duration_seconds;
                    entry.error = None;
                }
                Err(reason) => {
                    entry.is_ready = false;
                    entry.error = Some(reason.clone());
                }
            }
            true
        }
    };

    if !recorded {
        debug!("Discarding preload of {} started before cache clear", url);
        if outcome.is_ok() {
            shared.loader.release(&url);
        }
        return false;
    }

    match outcome {
        Ok(media) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!("Media ready: {} ({} bytes, {}ms)", url, media.bytes, elapsed_ms);
            shared.events.emit_lossy(KioskEvent::PreloadCompleted {
                url,
                elapsed_ms,
                timestamp: chrono::Utc::now(),
            });
            true
        }
        Err(error) => {
            warn!("Media preload failed for {}: {}", url, error);
            shared.events.emit_lossy(KioskEvent::PreloadFailed {
                url,
                error,
                timestamp: chrono::Utc::now(),
            });
            false
        }
    }
}
