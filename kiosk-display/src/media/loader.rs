//! Media loaders
//!
//! A loader takes a video URL to the point where it can play through
//! without rebuffering. The cache owns timeouts and bookkeeping; loaders
//! only do the fetch.

use async_trait::async_trait;
use kiosk_common::{Error, Result};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Connect timeout for media fetches (the overall budget is the cache's)
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedMedia {
    /// Media duration if the loader could determine it
    pub duration_seconds: Option<f64>,
    /// Bytes buffered
    pub bytes: u64,
}

/// Loads a media asset into a playable state
#[async_trait]
pub trait MediaLoader: Send + Sync {
    /// Load `url` completely; Err on network/codec failure
    async fn load(&self, url: &str) -> Result<LoadedMedia>;

    /// Release resources held for `url` (called on eviction and clear)
    fn release(&self, _url: &str) {}
}

/// Default loader: streams http(s) bodies to completion, stats local files
pub struct HttpMediaLoader {
    client: Client,
}

impl HttpMediaLoader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn load_remote(&self, url: &str) -> Result<LoadedMedia> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::asset(url, e))?
            .error_for_status()
            .map_err(|e| Error::asset(url, e))?;

        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| Error::asset(url, e))? {
            bytes += chunk.len() as u64;
        }

        if bytes == 0 {
            return Err(Error::asset(url, "empty response body"));
        }

        debug!("Buffered {} bytes from {}", bytes, url);
        Ok(LoadedMedia {
            duration_seconds: None,
            bytes,
        })
    }

    async fn load_local(&self, url: &str) -> Result<LoadedMedia> {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::asset(url, e))?;

        if !metadata.is_file() {
            return Err(Error::asset(url, "not a regular file"));
        }
        if metadata.len() == 0 {
            return Err(Error::asset(url, "empty file"));
        }

        Ok(LoadedMedia {
            duration_seconds: None,
            bytes: metadata.len(),
        })
    }
}

#[async_trait]
impl MediaLoader for HttpMediaLoader {
    async fn load(&self, url: &str) -> Result<LoadedMedia> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.load_remote(url).await
        } else {
            self.load_local(url).await
        }
    }
}
