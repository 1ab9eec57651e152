//! Plugin store: the local record of installed and deployed plugins
//!
//! The resolver only ever hands the store an `(id, version, location)` triple;
//! fetching, unpacking and activating the artifact is the store's business.

use async_trait::async_trait;
use sdk::errors::{PackageError, Result};
use sdk::manifest::{DeployAction, InstalledPlugin, PackageVersion, StatusReport};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::fetch::Fetcher;
use crate::verifier;

/// Version recorded for artifacts installed straight from a location
pub const DIRECT_INSTALL_VERSION: &str = "local";

/// Index file kept in the plugin directory
pub const INDEX_FILE: &str = "installed.json";

/// The artifact chosen for installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub id: String,
    pub version: String,
    pub location: String,
    pub sha256: Option<String>,
}

impl ArtifactRef {
    /// A published release from a repository manifest
    pub fn release(id: impl Into<String>, release: &PackageVersion) -> Self {
        Self {
            id: id.into(),
            version: release.version.clone(),
            location: release.artifact_location.clone(),
            sha256: release.sha256.clone(),
        }
    }

    /// An artifact named directly by URL or path
    pub fn direct(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: DIRECT_INSTALL_VERSION.to_string(),
            location: location.into(),
            sha256: None,
        }
    }
}

/// Local plugin store capability
#[async_trait]
pub trait PluginStore: Send + Sync {
    /// Installed plugins, one entry per id
    async fn list_installed(&self) -> Result<Vec<InstalledPlugin>>;

    /// Install (or replace) a plugin from `artifact`
    async fn install(&self, artifact: &ArtifactRef, args: &[String]) -> Result<()>;

    /// Activate an installed plugin for the first time
    async fn deploy_fresh(&self, id: &str, args: &[String]) -> Result<StatusReport>;

    /// Replace an active plugin instance
    async fn deploy_update(&self, id: &str, args: &[String]) -> Result<StatusReport>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: String,
    version: String,
    source: String,
    file: String,
    #[serde(default)]
    deployed: bool,
}

/// Plugin store backed by a local directory
///
/// Artifacts are written next to an `installed.json` index holding one entry
/// per plugin id, kept sorted by id.
pub struct LocalPluginStore {
    dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
}

impl LocalPluginStore {
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn load_index(&self) -> Result<Vec<IndexEntry>> {
        let path = self.dir.join(INDEX_FILE);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PackageError::Io(e)),
        };
        serde_json::from_slice(&contents).map_err(|e| {
            PackageError::Io(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("corrupt plugin index {}: {}", path.display(), e),
            ))
        })
    }

    async fn save_index(&self, mut entries: Vec<IndexEntry>) -> Result<()> {
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(&entries).map_err(|e| {
            PackageError::Io(std::io::Error::new(ErrorKind::InvalidData, e.to_string()))
        })?;
        let staged = self.dir.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&staged, json).await?;
        tokio::fs::rename(&staged, self.dir.join(INDEX_FILE)).await?;
        Ok(())
    }

    async fn set_deployed(
        &self,
        id: &str,
        args: &[String],
        action: DeployAction,
    ) -> Result<StatusReport> {
        let mut entries = self.load_index().await?;
        let deploy_err = |reason: &str| PackageError::DeployFailed {
            package: id.to_string(),
            reason: reason.to_string(),
        };

        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| deploy_err("not installed"))?;

        match action {
            DeployAction::Deployed if entry.deployed => {
                return Err(deploy_err("already deployed, use redeploy"));
            }
            DeployAction::Redeployed if !entry.deployed => {
                return Err(deploy_err("not deployed yet, use deploy"));
            }
            _ => {}
        }

        entry.deployed = true;
        let report = StatusReport {
            id: entry.id.clone(),
            version: entry.version.clone(),
            action,
            args: args.to_vec(),
        };
        self.save_index(entries).await?;

        info!("{}", report);
        Ok(report)
    }
}

/// File name for a stored artifact: `<id>-<version>.<ext>`
fn artifact_file_name(artifact: &ArtifactRef) -> String {
    let extension = artifact
        .location
        .rsplit(['/', '\\'])
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("jar");
    let sanitize = |s: &str| s.replace(['/', '\\', ':'], "_");
    format!(
        "{}-{}.{}",
        sanitize(&artifact.id),
        sanitize(&artifact.version),
        extension
    )
}

#[async_trait]
impl PluginStore for LocalPluginStore {
    async fn list_installed(&self) -> Result<Vec<InstalledPlugin>> {
        Ok(self
            .load_index()
            .await?
            .into_iter()
            .map(|entry| InstalledPlugin::new(entry.id, entry.version))
            .collect())
    }

    async fn install(&self, artifact: &ArtifactRef, _args: &[String]) -> Result<()> {
        let install_err = |reason: String| PackageError::InstallFailed {
            package: artifact.id.clone(),
            reason,
        };

        info!("Installing {} {} from {}", artifact.id, artifact.version, artifact.location);

        // Download into memory first (never to disk before verification)
        let bytes = self
            .fetcher
            .fetch(&artifact.location)
            .await
            .map_err(|e| install_err(e.to_string()))?;

        if let Some(expected) = &artifact.sha256 {
            verifier::verify_hash(&bytes, expected).map_err(|e| install_err(e.to_string()))?;
            debug!("  Hash verified: {}", expected);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| install_err(e.to_string()))?;
        let file = artifact_file_name(artifact);
        tokio::fs::write(self.dir.join(&file), &bytes)
            .await
            .map_err(|e| install_err(e.to_string()))?;

        let mut entries = self.load_index().await?;
        let deployed = match entries.iter().position(|e| e.id == artifact.id) {
            Some(idx) => {
                let previous = entries.remove(idx);
                if previous.file != file {
                    let stale = self.dir.join(&previous.file);
                    if let Err(e) = tokio::fs::remove_file(&stale).await {
                        debug!("Could not remove {}: {}", stale.display(), e);
                    }
                }
                previous.deployed
            }
            None => false,
        };
        entries.push(IndexEntry {
            id: artifact.id.clone(),
            version: artifact.version.clone(),
            source: artifact.location.clone(),
            file: file.clone(),
            deployed,
        });
        self.save_index(entries).await?;

        info!("  Installed to: {}", self.dir.join(file).display());
        Ok(())
    }

    async fn deploy_fresh(&self, id: &str, args: &[String]) -> Result<StatusReport> {
        self.set_deployed(id, args, DeployAction::Deployed).await
    }

    async fn deploy_update(&self, id: &str, args: &[String]) -> Result<StatusReport> {
        self.set_deployed(id, args, DeployAction::Redeployed).await
    }
}
