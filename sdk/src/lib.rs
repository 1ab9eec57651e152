//! pkgctl SDK
//!
//! Shared data model and error taxonomy for pkgctl components.
//! This crate is used by both the package registry library and the CLI.

/// Error types and handling
pub mod errors;

/// Repository, package and plugin metadata types
pub mod manifest;

// Re-export commonly used types
pub use errors::{PackageError, PackageErrorExt, Result};
pub use manifest::{
    DeployAction, InstalledPlugin, PackageDescriptor, PackageVersion, Repository, StatusReport,
};
