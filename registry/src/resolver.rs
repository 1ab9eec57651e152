//! Update resolution: merging repository manifests and reconciling them
//! against installed plugins
//!
//! # Catalog merge
//!
//! Repositories are processed in registry order. When the same package id
//! is advertised by more than one repository, the repository processed last
//! is authoritative and its descriptor replaces earlier ones wholesale.
//!
//! A repository whose manifest cannot be fetched or parsed is skipped and
//! reported as a [`CatalogWarning`]; the remaining repositories still
//! contribute.
//!
//! # Latest release
//!
//! The latest release of a package is the last entry of its `versions` list
//! as served by the repository. Repositories list versions oldest-first; no
//! version ordering is inferred.
//!
//! The catalog is rebuilt from the network on every call that needs it and is
//! never cached across invocations.

use sdk::errors::{PackageError, Result};
use sdk::manifest::{parse_manifest, InstalledPlugin, PackageDescriptor, PackageVersion};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::fetch::{is_artifact_location, Fetcher};
use crate::registry::RepositoryRegistry;
use crate::store::{ArtifactRef, PluginStore};

/// A repository that did not contribute to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogWarning {
    pub repository: String,
    pub error: String,
}

impl fmt::Display for CatalogWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repository {}: {}", self.repository, self.error)
    }
}

/// Packages available across all registered repositories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateCatalog {
    packages: BTreeMap<String, PackageDescriptor>,
    warnings: Vec<CatalogWarning>,
}

impl UpdateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one repository's packages; later merges win per package id
    pub fn merge(&mut self, repository: &str, packages: Vec<PackageDescriptor>) {
        for package in packages {
            if let Some(previous) = self.packages.insert(package.id.clone(), package) {
                debug!(
                    "Package {} from {} overrides an earlier repository",
                    previous.id, repository
                );
            }
        }
    }

    pub fn record_warning(&mut self, repository: &str, error: &PackageError) {
        self.warnings.push(CatalogWarning {
            repository: repository.to_string(),
            error: error.to_string(),
        });
    }

    pub fn get(&self, id: &str) -> Option<&PackageDescriptor> {
        self.packages.get(id)
    }

    /// Packages ordered by id
    pub fn packages(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.packages.values()
    }

    pub fn warnings(&self) -> &[CatalogWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Latest release of `id`
    pub fn latest_release(&self, id: &str) -> Result<&PackageVersion> {
        let package = self
            .get(id)
            .ok_or_else(|| PackageError::UnknownPackage(id.to_string()))?;
        package
            .latest()
            .ok_or_else(|| PackageError::NoReleases(id.to_string()))
    }

    /// Catalog entries for installed plugins whose latest release differs
    /// from the installed version
    pub fn updates_for(&self, installed: &[InstalledPlugin]) -> Vec<PackageDescriptor> {
        self.packages
            .values()
            .filter(|package| {
                installed
                    .iter()
                    .any(|plugin| plugin.id == package.id && package.has_update_from(&plugin.version))
            })
            .cloned()
            .collect()
    }
}

/// Result of updating a single package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Updated {
        id: String,
        from: String,
        to: String,
    },
    AlreadyUpToDate {
        id: String,
        version: String,
    },
}

/// Reconciles the catalog with the plugin store
#[derive(Clone)]
pub struct UpdateResolver {
    registry: RepositoryRegistry,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn PluginStore>,
}

impl UpdateResolver {
    pub fn new(
        registry: RepositoryRegistry,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn PluginStore>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            store,
        }
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn PluginStore {
        self.store.as_ref()
    }

    /// Fetch every repository's manifest and merge them into one catalog
    pub async fn fetch_catalog(&self) -> Result<UpdateCatalog> {
        let repositories = self.registry.list().await?;
        let mut catalog = UpdateCatalog::new();

        for repo in &repositories {
            let url = repo.manifest_url();
            let packages = match self.fetcher.fetch(&url).await {
                Ok(bytes) => parse_manifest(&repo.id, &bytes),
                Err(e) => Err(e),
            };
            match packages {
                Ok(packages) => {
                    debug!("Repository {} advertises {} package(s)", repo.id, packages.len());
                    catalog.merge(&repo.id, packages);
                }
                Err(e) => {
                    warn!("Skipping repository {}: {}", repo.id, e);
                    catalog.record_warning(&repo.id, &e);
                }
            }
        }

        Ok(catalog)
    }

    /// Updates available for installed plugins
    pub async fn available_updates(&self) -> Result<Vec<PackageDescriptor>> {
        let catalog = self.fetch_catalog().await?;
        self.updates_in(&catalog).await
    }

    /// Updates available for installed plugins within an already fetched catalog
    pub async fn updates_in(&self, catalog: &UpdateCatalog) -> Result<Vec<PackageDescriptor>> {
        let installed = self.store.list_installed().await?;
        Ok(catalog.updates_for(&installed))
    }

    /// Whether any installed plugin has an update. Re-fetches the catalog.
    pub async fn has_updates(&self) -> Result<bool> {
        Ok(!self.available_updates().await?.is_empty())
    }

    /// Latest release of `id` per its repository manifest
    pub async fn latest_release(&self, id: &str) -> Result<PackageVersion> {
        let catalog = self.fetch_catalog().await?;
        catalog.latest_release(id).cloned()
    }

    /// Install `id` at a catalog version, or straight from an artifact location
    pub async fn install(
        &self,
        id: &str,
        version_or_location: &str,
        args: &[String],
    ) -> Result<InstalledPlugin> {
        let catalog = self.fetch_catalog().await?;
        self.install_from(&catalog, id, version_or_location, args).await
    }

    /// Install against an already fetched catalog
    pub async fn install_from(
        &self,
        catalog: &UpdateCatalog,
        id: &str,
        version_or_location: &str,
        args: &[String],
    ) -> Result<InstalledPlugin> {
        let release = catalog
            .get(id)
            .and_then(|package| package.find_version(version_or_location));

        let direct = release.is_none() && is_artifact_location(version_or_location).await;

        let artifact = match release {
            Some(release) => ArtifactRef::release(id, release),
            None if direct => ArtifactRef::direct(id, version_or_location),
            None if catalog.get(id).is_none() => {
                return Err(PackageError::UnknownPackage(id.to_string()));
            }
            None => {
                return Err(PackageError::VersionNotFound {
                    package: id.to_string(),
                    version: version_or_location.to_string(),
                });
            }
        };

        self.store.install(&artifact, args).await?;
        info!("Installed {} {}", artifact.id, artifact.version);
        Ok(InstalledPlugin::new(artifact.id, artifact.version))
    }

    /// Update `id` to its latest release
    pub async fn update(&self, id: &str, args: &[String]) -> Result<UpdateOutcome> {
        let catalog = self.fetch_catalog().await?;
        self.update_from(&catalog, id, args).await
    }

    /// Update against an already fetched catalog.
    ///
    /// Only the named package is considered: an update elsewhere in the
    /// catalog does not make `id` eligible.
    pub async fn update_from(
        &self,
        catalog: &UpdateCatalog,
        id: &str,
        args: &[String],
    ) -> Result<UpdateOutcome> {
        let package = catalog
            .get(id)
            .ok_or_else(|| PackageError::UnknownPackage(id.to_string()))?;
        let installed = self
            .store
            .list_installed()
            .await?
            .into_iter()
            .find(|plugin| plugin.id == id)
            .ok_or_else(|| PackageError::NotInstalled(id.to_string()))?;

        if !package.has_update_from(&installed.version) {
            return Ok(UpdateOutcome::AlreadyUpToDate {
                id: id.to_string(),
                version: installed.version,
            });
        }

        let latest = catalog.latest_release(id)?;
        self.store
            .install(&ArtifactRef::release(id, latest), args)
            .await?;
        info!("Updated {} from {} to {}", id, installed.version, latest.version);

        Ok(UpdateOutcome::Updated {
            id: id.to_string(),
            from: installed.version,
            to: latest.version.clone(),
        })
    }
}
