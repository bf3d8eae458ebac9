//! Persistent display state

use async_trait::async_trait;
use kiosk_common::models::DisplaySnapshot;
use kiosk_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of truth for the slide list and settings
#[async_trait]
pub trait DisplayStore: Send + Sync {
    /// Current slides and settings
    async fn load(&self) -> Result<DisplaySnapshot>;

    /// Persist slides and settings
    async fn save(&self, snapshot: &DisplaySnapshot) -> Result<()>;
}

/// DisplayStore over a single JSON file
///
/// A missing file loads as an empty display. Saves write a sibling temp
/// file and rename it over the target, so a crash never leaves a torn file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DisplayStore for JsonFileStore {
    async fn load(&self) -> Result<DisplaySnapshot> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No display state at {}, starting empty", self.path.display());
                return Ok(DisplaySnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: DisplaySnapshot = serde_json::from_str(&content)?;
        debug!(
            "Loaded {} slides from {}",
            snapshot.slides.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &DisplaySnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| Error::Config(format!("Store path has no file name: {}", self.path.display())))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(
            "Saved {} slides to {}",
            snapshot.slides.len(),
            self.path.display()
        );
        Ok(())
    }
}
