//! # Kiosk Common Library
//!
//! Shared code for the kiosk display controller:
//! - Slide, settings and update notification models
//! - Telemetry event types (KioskEvent enum) and the EventBus
//! - Configuration loading
//! - Content hashing used for change detection

pub mod config;
pub mod error;
pub mod events;
pub mod hash;
pub mod models;

pub use error::{Error, Result};
