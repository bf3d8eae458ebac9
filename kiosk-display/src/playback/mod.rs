//! Slideshow playback: rotation set, advance timing and the engine task

pub mod carousel;
pub mod engine;
pub mod policy;
pub mod rotation;
pub mod state;
pub mod timer;

pub use carousel::{resolve_real_index, Carousel};
pub use engine::PlaybackEngine;
pub use policy::PlaybackPolicy;
pub use rotation::RotationSet;
pub use state::{EnginePhase, PlaybackSnapshot, SlideChange};
pub use timer::{AdvanceTimer, TimerKind};
