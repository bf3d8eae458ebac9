//! Kiosk display controller
//!
//! Playback engine, media readiness cache and update reconciliation for an
//! unattended slideshow display, plus the HTTP/SSE surface that connects
//! them to display pages and update transports.

pub mod api;
pub mod media;
pub mod playback;
pub mod sync;

pub use kiosk_common::{Error, Result};
