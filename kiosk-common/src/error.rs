//! Common error types for the kiosk controller

use thiserror::Error;

/// Common result type for kiosk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the kiosk crates
#[derive(Error, Debug)]
pub enum Error {
    /// Media asset failed to load or decode (network, codec, timeout)
    #[error("Asset error for {url}: {reason}")]
    Asset {
        /// Media URL that failed
        url: String,
        /// Loader-reported reason
        reason: String,
    },

    /// Playback engine task is no longer running
    #[error("Playback engine stopped")]
    EngineStopped,

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error while fetching media
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build an asset error from any displayable reason
    pub fn asset(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Asset {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
