//! Core playback engine - handle, commands and task loop

use kiosk_common::events::EventBus;
use kiosk_common::models::{DisplaySettings, Slide, TransitionEffect};
use kiosk_common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::media::MediaReadinessCache;
use crate::playback::carousel::Carousel;
use crate::playback::policy::PlaybackPolicy;
use crate::playback::rotation::{PendingVideo, RotationSet};
use crate::playback::state::{EnginePhase, PlaybackSnapshot, SlideChange, SlideObserver};
use crate::playback::timer::AdvanceTimer;

/// Messages into the engine task
pub(super) enum EngineCommand {
    SetSlides(Vec<Slide>),
    SetTransitionEffect(TransitionEffect),
    ApplySettings(DisplaySettings),
    Observe(SlideObserver),
    ReportIndex(usize),
    VideoEnded,
    Next,
    Reset,
    /// A preload the engine was waiting on has finished (either way)
    PreloadSettled { url: String },
    Status(oneshot::Sender<PlaybackSnapshot>),
    Shutdown,
}

/// Handle to a running playback engine
///
/// Every method only enqueues a command; the engine applies commands in
/// order. `Err(EngineStopped)` means the engine task has exited.
#[derive(Clone)]
pub struct PlaybackEngine {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl PlaybackEngine {
    /// Start the engine task
    ///
    /// The engine starts Idle with an empty slide source.
    pub fn spawn(
        carousel: Arc<dyn Carousel>,
        cache: MediaReadinessCache,
        events: EventBus,
        policy: PlaybackPolicy,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = EngineTask {
            carousel,
            cache,
            events,
            policy,
            preload_tx: tx.downgrade(),
            source: Vec::new(),
            rotation: RotationSet::default(),
            pending: Vec::new(),
            awaiting: HashSet::new(),
            phase: EnginePhase::Idle,
            current: None,
            shown_at: None,
            timer: AdvanceTimer::new(),
            settings: DisplaySettings::default(),
            observers: Vec::new(),
            generation: 0,
            stuck_checks: 0,
        };
        tokio::spawn(task.run(rx));
        Self { tx }
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::EngineStopped)
    }

    /// Replace the slide source
    ///
    /// Same ordered membership updates content in place without touching
    /// timing. Changed membership or order restarts from the first slide.
    pub fn set_rotation_set(&self, slides: Vec<Slide>) -> Result<()> {
        self.send(EngineCommand::SetSlides(slides))
    }

    /// Swap the carousel transition; timing is untouched
    pub fn set_transition_effect(&self, effect: TransitionEffect) -> Result<()> {
        self.send(EngineCommand::SetTransitionEffect(effect))
    }

    /// Apply effect, navigation and overlay flags
    pub fn apply_settings(&self, settings: DisplaySettings) -> Result<()> {
        self.send(EngineCommand::ApplySettings(settings))
    }

    /// Register an observer called whenever a slide becomes visible
    pub fn on_slide_change<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&SlideChange) + Send + Sync + 'static,
    {
        self.send(EngineCommand::Observe(Box::new(callback)))
    }

    /// Renderer moved the carousel to `real_index` (arrows, dots, swipe)
    pub fn report_real_index(&self, real_index: usize) -> Result<()> {
        self.send(EngineCommand::ReportIndex(real_index))
    }

    /// Renderer finished playing the visible video
    pub fn on_video_ended(&self) -> Result<()> {
        self.send(EngineCommand::VideoEnded)
    }

    /// Skip to the next slide
    pub fn next(&self) -> Result<()> {
        self.send(EngineCommand::Next)
    }

    /// Rebuild the rotation and restart from the first slide
    pub fn reset(&self) -> Result<()> {
        self.send(EngineCommand::Reset)
    }

    /// Snapshot of the engine after all previously sent commands
    pub async fn status(&self) -> Result<PlaybackSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Status(reply))?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    /// Cancel the advance timer and stop the engine task
    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineCommand::Shutdown)
    }

    /// True once the engine task has exited
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Engine state, owned by the engine task
pub(super) struct EngineTask {
    pub(super) carousel: Arc<dyn Carousel>,
    pub(super) cache: MediaReadinessCache,
    pub(super) events: EventBus,
    pub(super) policy: PlaybackPolicy,
    /// Weak so preload waiters never keep a dropped engine alive
    pub(super) preload_tx: mpsc::WeakUnboundedSender<EngineCommand>,

    /// Slide list as last supplied, before filtering
    pub(super) source: Vec<Slide>,
    pub(super) rotation: RotationSet,
    pub(super) pending: Vec<PendingVideo>,
    /// URLs with a preload waiter running
    pub(super) awaiting: HashSet<String>,

    pub(super) phase: EnginePhase,
    pub(super) current: Option<usize>,
    pub(super) shown_at: Option<Instant>,
    pub(super) timer: AdvanceTimer,
    pub(super) settings: DisplaySettings,
    pub(super) observers: Vec<SlideObserver>,
    pub(super) generation: u64,
    /// Consecutive health checks that found the gated video not playing
    pub(super) stuck_checks: u32,
}

impl EngineTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineCommand>) {
        let interval = self.policy.health_check_interval;
        let mut health = tokio::time::interval_at(Instant::now() + interval, interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Playback engine started (prefetch window {}, safety buffer {}s, health check {}s)",
            self.policy.prefetch_window,
            self.policy.safety_buffer.as_secs(),
            interval.as_secs()
        );

        loop {
            let deadline = self.timer.deadline();
            tokio::select! {
                biased;

                command = rx.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },

                _ = wait_until(deadline) => self.on_timer_expired(),

                _ = health.tick() => self.health_check(),
            }
        }

        self.timer.disarm();
        info!("Playback engine stopped");
    }

    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::SetSlides(slides) => self.set_source(slides),
            EngineCommand::SetTransitionEffect(effect) => self.set_transition_effect(effect),
            EngineCommand::ApplySettings(settings) => self.apply_settings(settings),
            EngineCommand::Observe(observer) => self.observers.push(observer),
            EngineCommand::ReportIndex(index) => self.report_real_index(index),
            EngineCommand::VideoEnded => self.on_video_ended(),
            EngineCommand::Next => self.skip(),
            EngineCommand::Reset => self.reset(),
            EngineCommand::PreloadSettled { url } => self.on_preload_settled(url),
            EngineCommand::Status(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Status requester went away");
                }
            }
            // Handled by the loop
            EngineCommand::Shutdown => {}
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
