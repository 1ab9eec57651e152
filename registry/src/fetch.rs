//! Remote fetches: repository manifests, public keys, artifacts, node status

use async_trait::async_trait;
use reqwest::{Client, Url};
use sdk::errors::{PackageError, Result};
use std::time::Duration;
use tracing::debug;

/// Byte-level fetch of a URL or local path
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// Fetcher backed by reqwest for `http(s)` URLs and `tokio::fs` for `file:`
/// URLs and plain paths
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| PackageError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: Url) -> Result<Vec<u8>> {
        let location = url.to_string();
        let fetch_err = |reason: String| PackageError::Fetch {
            url: location.clone(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fetch_err("request timed out".to_string())
                } else if e.is_connect() {
                    fetch_err("connection refused".to_string())
                } else {
                    fetch_err(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP status {}", status)));
        }

        let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_file(location: &str, path: std::path::PathBuf) -> Result<Vec<u8>> {
        tokio::fs::read(&path).await.map_err(|e| PackageError::Fetch {
            url: location.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", location);
        match Url::parse(location) {
            Ok(url) => match url.scheme() {
                "http" | "https" => self.fetch_http(url).await,
                "file" => {
                    let path = url.to_file_path().map_err(|_| PackageError::Fetch {
                        url: location.to_string(),
                        reason: "not a local file URL".to_string(),
                    })?;
                    Self::fetch_file(location, path).await
                }
                other => Err(PackageError::Fetch {
                    url: location.to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                }),
            },
            // Not a URL: treat it as a filesystem path
            Err(_) => Self::fetch_file(location, location.into()).await,
        }
    }
}

/// Whether `location` names an artifact directly rather than a version tag
pub async fn is_artifact_location(location: &str) -> bool {
    if let Ok(url) = Url::parse(location) {
        return matches!(url.scheme(), "http" | "https" | "file");
    }
    tokio::fs::metadata(location)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
