//! Error types and handling
//!
//! This module provides the error type shared by every pkgctl component.
//! All errors implement the `PackageErrorExt` trait which provides operator
//! hints and indicates whether the failure is recoverable by re-running the
//! command.
//!
//! # Error Categories
//!
//! - **Coordination**: transport loss and node-level failures on the shared tree
//! - **Registry**: malformed registry/manifest documents, key fetch failures
//! - **Resolution**: unknown packages and versions
//! - **Commands**: unrecognized tokens and missing positional arguments
//! - **Plugin store**: install/deploy failures and artifact integrity
//!
//! # Examples
//!
//! ```
//! use sdk::errors::{PackageError, PackageErrorExt};
//!
//! let error = PackageError::UnknownPackage("analysis-extras".to_string());
//! println!("Hint: {}", error.user_hint());
//! assert!(error.is_recoverable());
//!
//! let fatal = PackageError::ConnectionLost("session expired".to_string());
//! assert!(!fatal.is_recoverable());
//! ```

use thiserror::Error;

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PackageError>;

/// Trait for pkgctl error extensions
pub trait PackageErrorExt {
    /// Returns a short operator-facing hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Non-recoverable errors abort the command regardless of where they
    /// surface (lost coordination session, unreachable cluster, tampered
    /// artifacts). Recoverable ones abort only the current command.
    fn is_recoverable(&self) -> bool;
}

/// Main package manager error type
#[derive(Debug, Error)]
pub enum PackageError {
    // Coordination errors
    #[error("Coordination connection lost: {0}")]
    ConnectionLost(String),

    #[error("Coordination node not found: {0}")]
    NotFound(String),

    #[error("Coordination node already exists: {0}")]
    AlreadyExists(String),

    #[error("Parent node does not exist for {0}")]
    NoParent(String),

    #[error("Invalid coordination path: {0:?}")]
    InvalidPath(String),

    #[error("Unsupported coordination endpoint: {0}")]
    UnsupportedTransport(String),

    #[error("Could not discover coordination endpoint: {0}")]
    EndpointDiscovery(String),

    // Registry errors
    #[error("Malformed repository registry: {0}")]
    MalformedRegistry(String),

    #[error("Malformed manifest from repository {repository}: {reason}")]
    MalformedManifest { repository: String, reason: String },

    #[error("Failed to fetch public key from {url}: {reason}")]
    KeyFetchFailed { url: String, reason: String },

    #[error("Unknown repository: {0}")]
    UnknownRepository(String),

    // Resolution errors
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    #[error("Version {version} not found for package {package}")]
    VersionNotFound { package: String, version: String },

    #[error("Package {0} has no releases")]
    NoReleases(String),

    #[error("Package {0} is not installed")]
    NotInstalled(String),

    // Command errors
    #[error("Unrecognized command: {0}")]
    UnrecognizedCommand(String),

    #[error("Command '{command}' requires argument <{argument}>")]
    MissingArgument { command: String, argument: String },

    // Plugin store errors
    #[error("Failed to install {package}: {reason}")]
    InstallFailed { package: String, reason: String },

    #[error("Failed to deploy {package}: {reason}")]
    DeployFailed { package: String, reason: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    // Network errors
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    // Encoding errors
    #[error("Failed to encode {0}")]
    Serialization(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageErrorExt for PackageError {
    fn user_hint(&self) -> &str {
        match self {
            // Coordination errors
            Self::ConnectionLost(_) => "Coordination session dropped. Re-run the command",
            Self::NotFound(_) => "Expected cluster state is missing",
            Self::AlreadyExists(_) => "Another client changed the cluster state. Re-run the command",
            Self::NoParent(_) => "Create the parent node first",
            Self::InvalidPath(_) => "Coordination paths must be absolute, e.g. /keys/exe",
            Self::UnsupportedTransport(_) => {
                "Pass a ZooKeeper host list or a file: endpoint with --zk-host"
            }
            Self::EndpointDiscovery(_) => {
                "Check that the node is running in cloud mode, or pass --zk-host"
            }

            // Registry errors
            Self::MalformedRegistry(_) => "Fix or remove /repositories.json in the cluster",
            Self::MalformedManifest { .. } => "The repository serves an invalid manifest",
            Self::KeyFetchFailed { .. } => "The repository must serve publickey.der at its root",
            Self::UnknownRepository(_) => "Run 'add-repo' to register the repository first",

            // Resolution errors
            Self::UnknownPackage(_) => "Run 'list-available' to see known packages",
            Self::VersionNotFound { .. } => "Run 'list-available' to see published versions",
            Self::NoReleases(_) => "The repository lists no versions for this package",
            Self::NotInstalled(_) => "Install the package before updating it",

            // Command errors
            Self::UnrecognizedCommand(_) => {
                "Valid commands: add-repo, list, list-available, install, deploy, redeploy, update"
            }
            Self::MissingArgument { .. } => "Check the command usage",

            // Plugin store errors
            Self::InstallFailed { .. } => "Installation failed. Check the artifact location",
            Self::DeployFailed { .. } => "Deployment failed. Check the plugin state with 'list'",
            Self::HashMismatch { .. } => "Artifact may be corrupted or tampered",

            // Network errors
            Self::Fetch { .. } => "Network operation failed. Check your connection",

            Self::Serialization(_) => "Could not produce output. Report this as a bug",

            // Configuration errors
            Self::Config(_) => "Check your config.toml file for errors",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ConnectionLost(_)
                | Self::UnsupportedTransport(_)
                | Self::EndpointDiscovery(_)
                | Self::HashMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_fatal() {
        assert!(!PackageError::ConnectionLost("gone".into()).is_recoverable());
        assert!(!PackageError::UnsupportedTransport("zk:2181".into()).is_recoverable());
        assert!(PackageError::MalformedRegistry("not an array".into()).is_recoverable());
        assert!(PackageError::UnrecognizedCommand("frobnicate".into()).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = PackageError::VersionNotFound {
            package: "dih".into(),
            version: "9.9".into(),
        };
        assert_eq!(err.to_string(), "Version 9.9 not found for package dih");

        let err = PackageError::UnrecognizedCommand("frobnicate".into());
        assert_eq!(err.to_string(), "Unrecognized command: frobnicate");

        let err = PackageError::Serialization("registry document: key must be a string".into());
        assert_eq!(
            err.to_string(),
            "Failed to encode registry document: key must be a string"
        );
        assert!(err.is_recoverable());
    }
}
