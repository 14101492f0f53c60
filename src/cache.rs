//! Cluster descriptor sources
//!
//! The server reads the descriptor fresh for every request. It either comes
//! straight from a local file or from a remote URL mirrored into a local file,
//! so a temporarily unreachable remote does not stop nodes from booting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{Error, Result};

/// HTTP timeout for remote fetches
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where descriptor bytes come from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    /// Current descriptor content
    async fn get(&self) -> Result<Vec<u8>>;
}

/// Descriptor read from a local file on every call
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Source reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File being read
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DescriptorSource for FileSource {
    async fn get(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::io(&self.path, e))
    }
}

/// Remote descriptor mirrored to a local file
///
/// Every [`get`](DescriptorSource::get) fetches the URL. A successful fetch
/// replaces the local copy; a failed one falls back to it.
#[derive(Debug)]
pub struct RemoteCache {
    url: String,
    local_path: PathBuf,
    client: reqwest::Client,
    write_lock: Mutex<()>,
}

impl RemoteCache {
    /// Create a cache for `url` mirrored at `local_path`
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Cache {
                url: url.clone(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self::with_client(url, local_path, client))
    }

    /// Create a cache with a custom HTTP client
    pub fn with_client(
        url: impl Into<String>,
        local_path: impl Into<PathBuf>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
            client,
            write_lock: Mutex::new(()),
        }
    }

    /// Remote URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Local mirror path
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    async fn fetch(&self) -> std::result::Result<Vec<u8>, String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;
        Ok(body.to_vec())
    }

    async fn store(&self, bytes: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&self.local_path, bytes)
            .await
            .map_err(|e| Error::io(&self.local_path, e))
    }
}

#[async_trait]
impl DescriptorSource for RemoteCache {
    async fn get(&self) -> Result<Vec<u8>> {
        match self.fetch().await {
            Ok(bytes) => {
                debug!(url = %self.url, bytes = bytes.len(), "fetched cluster descriptor");
                if let Err(e) = self.store(&bytes).await {
                    warn!(error = %e, "failed to update local descriptor copy");
                }
                Ok(bytes)
            }
            Err(fetch_err) => {
                warn!(
                    url = %self.url,
                    error = %fetch_err,
                    local = %self.local_path.display(),
                    "descriptor fetch failed, using local copy"
                );
                let _guard = self.write_lock.lock().await;
                tokio::fs::read(&self.local_path)
                    .await
                    .map_err(|e| Error::Cache {
                        url: self.url.clone(),
                        message: format!(
                            "{}; no local copy at {}: {}",
                            fetch_err,
                            self.local_path.display(),
                            e
                        ),
                    })
            }
        }
    }
}
