//! Configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `KIOSK_CONFIG` environment variable
//! 3. Per-user config file (`~/.config/kiosk/config.toml`)
//! 4. System config file (`/etc/kiosk/config.toml`, Linux only)
//! 5. Compiled defaults (fallback)
//!
//! A missing config file is not an error: the display is an unattended
//! kiosk and must come up with defaults. An explicitly requested file that
//! does not exist, or any file that fails to parse, is an error.

use crate::models::{ActivationDefaults, DEFAULT_SLIDE_DURATION_SECS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "KIOSK_CONFIG";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub playback: PlaybackConfig,
    pub media: MediaConfig,
    pub sync: SyncConfig,
    pub slides: SlidesConfig,
    pub logging: LoggingConfig,
}

/// HTTP adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5800,
        }
    }
}

/// Slide/settings store location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("display.json"),
        }
    }
}

/// Playback engine policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Upcoming slides whose video assets are warmed on each advance
    pub prefetch_window: usize,
    /// Added to a video slide's duration to form its safety deadline
    pub safety_buffer_secs: u64,
    /// Interval of the self-healing health check
    pub health_check_interval_secs: u64,
    /// Duration of slides that carry none
    pub default_duration_secs: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            prefetch_window: 2,
            safety_buffer_secs: 10,
            health_check_interval_secs: 8,
            default_duration_secs: DEFAULT_SLIDE_DURATION_SECS,
        }
    }
}

/// Media readiness cache policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub preload_timeout_secs: u64,
    pub max_age_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            preload_timeout_secs: 30,
            max_age_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl MediaConfig {
    pub fn preload_timeout(&self) -> Duration {
        Duration::from_secs(self.preload_timeout_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Sync coordinator policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Grace period after a local edit during which server slide updates are held
    pub quiet_window_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_window_secs: 12,
        }
    }
}

impl SyncConfig {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_secs(self.quiet_window_secs)
    }
}

/// Slide defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlidesConfig {
    /// Whether event slides without an explicit `active` flag are shown
    pub event_slides_active_by_default: bool,
}

impl SlidesConfig {
    pub fn activation_defaults(&self) -> ActivationDefaults {
        ActivationDefaults {
            event_slides: self.event_slides_active_by_default,
        }
    }
}

/// Logging settings (RUST_LOG takes precedence)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl KioskConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load configuration following the resolution priority
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&content)
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Resolve which config file to read, if any
pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "{} points at missing file: {}",
                CONFIG_ENV_VAR,
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 3/4: user then system config
    let user_config = dirs::config_dir().map(|d| d.join("kiosk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/kiosk/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    Ok(None)
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("kiosk"))
        .unwrap_or_else(|| PathBuf::from("./kiosk_data"))
}
