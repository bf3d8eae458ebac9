//! Update reconciliation
//!
//! Turns update notifications from any transport into engine calls,
//! dropping duplicates and stale deliveries and holding server updates back
//! while a local edit is fresh.

mod coordinator;
mod store;

pub use coordinator::{SyncCoordinator, SyncOutcome};
pub use store::{DisplayStore, JsonFileStore};
