//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: Engine handle, command channel and the task loop
//! - `slides.rs`: Slide source, rotation rebuilds and asset preloads
//! - `playback.rs`: Showing, advancing and renderer callbacks
//! - `diagnostics.rs`: Health check and status snapshots
//!
//! The handle is a cheap clone around an unbounded command channel; all
//! engine state lives in a single task, so every state transition runs to
//! completion before the next command or timer is looked at.

mod core;
mod diagnostics;
mod playback;
mod slides;

pub use self::core::PlaybackEngine;
