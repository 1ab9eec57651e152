//! Repository, package and plugin metadata types
//!
//! `Repository` entries live in the cluster-wide registry document;
//! `PackageDescriptor`/`PackageVersion` come from repository manifests;
//! `InstalledPlugin` describes what the local plugin store currently holds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{PackageError, Result};

/// Manifest file name used when a repository entry does not name one
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.json";

/// File served at a repository root holding its public signing key
pub const PUBLIC_KEY_FILE: &str = "publickey.der";

fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

/// A trusted package source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub url: String,
    #[serde(
        rename = "pluginsJsonFileName",
        alias = "manifestFile",
        default = "default_manifest_file"
    )]
    pub manifest_file: String,
}

impl Repository {
    /// Create a repository entry with the default manifest file name
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            manifest_file: default_manifest_file(),
        }
    }

    /// URL of the repository manifest
    pub fn manifest_url(&self) -> String {
        join_url(&self.url, &self.manifest_file)
    }

    /// URL of the repository's public signing key
    pub fn public_key_url(&self) -> String {
        join_url(&self.url, PUBLIC_KEY_FILE)
    }
}

fn join_url(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file.trim_start_matches('/'))
}

/// Parse the registry document stored in the coordination tree
pub fn parse_registry(bytes: &[u8]) -> Result<Vec<Repository>> {
    serde_json::from_slice(bytes).map_err(|e| PackageError::MalformedRegistry(e.to_string()))
}

/// Serialize the registry document
pub fn registry_to_json(repositories: &[Repository]) -> Result<Vec<u8>> {
    serde_json::to_vec(repositories)
        .map_err(|e| PackageError::Serialization(format!("registry document: {}", e)))
}

/// A package advertised by a repository manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "releases")]
    pub versions: Vec<PackageVersion>,
}

impl PackageDescriptor {
    /// Find a published version by its tag
    pub fn find_version(&self, version: &str) -> Option<&PackageVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// The latest release: the last entry in manifest order.
    ///
    /// Repositories list versions oldest-first; no version comparison is
    /// applied.
    pub fn latest(&self) -> Option<&PackageVersion> {
        self.versions.last()
    }

    /// Whether the latest release differs from `installed_version`
    pub fn has_update_from(&self, installed_version: &str) -> bool {
        self.latest()
            .is_some_and(|latest| latest.version != installed_version)
    }
}

/// One published version of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub version: String,
    #[serde(rename = "url", alias = "artifactLocation")]
    pub artifact_location: String,
    /// Hex SHA-256 of the artifact, verified on install when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl PackageVersion {
    pub fn new(version: impl Into<String>, artifact_location: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            artifact_location: artifact_location.into(),
            sha256: None,
        }
    }
}

/// Parse a repository manifest into package descriptors
pub fn parse_manifest(repository: &str, bytes: &[u8]) -> Result<Vec<PackageDescriptor>> {
    serde_json::from_slice(bytes).map_err(|e| PackageError::MalformedManifest {
        repository: repository.to_string(),
        reason: e.to_string(),
    })
}

/// A plugin currently held by the local plugin store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    pub id: String,
    pub version: String,
}

impl InstalledPlugin {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for InstalledPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.version)
    }
}

/// Kind of deployment a plugin store performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployAction {
    /// First activation of an installed plugin
    Deployed,
    /// Replacement of an active plugin instance
    Redeployed,
}

impl fmt::Display for DeployAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed => write!(f, "deployed"),
            Self::Redeployed => write!(f, "redeployed"),
        }
    }
}

/// Outcome of a deploy or redeploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub id: String,
    pub version: String,
    pub action: DeployAction,
    pub args: Vec<String>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.id, self.version, self.action)?;
        if !self.args.is_empty() {
            write!(f, " with args: {}", self.args.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_urls() {
        let repo = Repository::new("community", "http://example.test/repo/");
        assert_eq!(repo.manifest_url(), "http://example.test/repo/manifest.json");
        assert_eq!(repo.public_key_url(), "http://example.test/repo/publickey.der");
    }

    #[test]
    fn test_registry_defaults_manifest_file() {
        let repos = parse_registry(br#"[{"id":"r1","url":"http://a.test"}]"#).unwrap();
        assert_eq!(repos, vec![Repository::new("r1", "http://a.test")]);
    }

    #[test]
    fn test_registry_rejects_non_array() {
        let err = parse_registry(br#"{"id":"r1"}"#).unwrap_err();
        assert!(matches!(err, PackageError::MalformedRegistry(_)));
    }

    #[test]
    fn test_manifest_accepts_releases_alias() {
        let json = br#"[{"id":"p","description":"d","releases":[{"version":"1.0","url":"http://a.test/p-1.0.jar"}]}]"#;
        let packages = parse_manifest("r1", json).unwrap();
        assert_eq!(packages[0].versions[0].artifact_location, "http://a.test/p-1.0.jar");
    }

    #[test]
    fn test_manifest_schema_mismatch() {
        let err = parse_manifest("r1", br#"[{"description":"no id"}]"#).unwrap_err();
        match err {
            PackageError::MalformedManifest { repository, .. } => assert_eq!(repository, "r1"),
            other => panic!("Expected MalformedManifest, got: {:?}", other),
        }
    }

    #[test]
    fn test_latest_is_last_listed_not_greatest() {
        let package = PackageDescriptor {
            id: "p".into(),
            description: String::new(),
            versions: vec![
                PackageVersion::new("10.0", "a"),
                PackageVersion::new("2.0", "b"),
            ],
        };
        assert_eq!(package.latest().unwrap().version, "2.0");
        assert!(package.has_update_from("10.0"));
        assert!(!package.has_update_from("2.0"));
    }

    #[test]
    fn test_no_versions_means_no_update() {
        let package = PackageDescriptor {
            id: "p".into(),
            description: String::new(),
            versions: vec![],
        };
        assert!(package.latest().is_none());
        assert!(!package.has_update_from("1.0"));
    }

    #[test]
    fn test_status_report_display() {
        let report = StatusReport {
            id: "ltr".into(),
            version: "1.1".into(),
            action: DeployAction::Redeployed,
            args: vec!["collection=techproducts".into()],
        };
        assert_eq!(
            report.to_string(),
            "ltr (1.1) redeployed with args: collection=techproducts"
        );
    }
}
