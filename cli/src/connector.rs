//! Coordination session establishment

use async_trait::async_trait;
use package_registry::{CoordinationStore, FsCoordinationStore, ZkCoordinationStore};
use reqwest::Url;
use sdk::errors::{PackageError, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A resolved coordination endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Coordination tree mirrored in a local directory
    Directory(PathBuf),
    /// ZooKeeper connection string (`host:port[,host:port...][/chroot]`)
    ZooKeeper(String),
}

impl Endpoint {
    /// Classify an endpoint string
    ///
    /// `file:` URLs and absolute or relative filesystem paths map to
    /// [`Endpoint::Directory`]. Any other `scheme://` address is rejected
    /// with `UnsupportedTransport`; the rest is a ZooKeeper connection string.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(PackageError::EndpointDiscovery(
                "empty coordination endpoint".to_string(),
            ));
        }

        if address.starts_with("file:") {
            let path = Url::parse(address)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| {
                    PackageError::EndpointDiscovery(format!("invalid file endpoint {}", address))
                })?;
            return Ok(Endpoint::Directory(path));
        }

        if address.starts_with('/') || address.starts_with('.') {
            return Ok(Endpoint::Directory(PathBuf::from(address)));
        }

        if address.contains("://") {
            return Err(PackageError::UnsupportedTransport(address.to_string()));
        }

        Ok(Endpoint::ZooKeeper(address.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Directory(path) => write!(f, "{}", path.display()),
            Endpoint::ZooKeeper(hosts) => write!(f, "{}", hosts),
        }
    }
}

/// Opens a coordination session for an endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn CoordinationStore>>;
}

/// Connector for directory trees and ZooKeeper ensembles
#[derive(Debug, Clone)]
pub struct DefaultConnector {
    session_timeout: Duration,
}

impl DefaultConnector {
    pub fn new(session_timeout: Duration) -> Self {
        Self { session_timeout }
    }
}

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn CoordinationStore>> {
        match endpoint {
            Endpoint::Directory(root) => {
                debug!("Opening coordination tree at {}", root.display());
                let store = tokio::time::timeout(
                    self.session_timeout,
                    FsCoordinationStore::open(root.clone()),
                )
                .await
                .map_err(|_| {
                    PackageError::ConnectionLost(format!(
                        "no session with {} after {:?}",
                        root.display(),
                        self.session_timeout
                    ))
                })??;
                Ok(Arc::new(store))
            }
            Endpoint::ZooKeeper(hosts) => {
                let store = ZkCoordinationStore::connect(hosts, self.session_timeout).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
