//! Media readiness tracking for video slides

pub mod cache;
pub mod loader;

pub use cache::{MediaCacheEntry, MediaReadinessCache};
pub use loader::{HttpMediaLoader, LoadedMedia, MediaLoader};
