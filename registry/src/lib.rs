//! pkgctl package registry
//!
//! This crate records trusted package repositories in the cluster's
//! coordination tree, merges their manifests into a catalog, reconciles the
//! catalog against locally installed plugins, and hands the chosen artifact
//! to the plugin store.

pub mod coordination;
pub mod fetch;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod verifier;
pub mod zookeeper;

pub use coordination::{CoordinationStore, FsCoordinationStore, MemoryCoordinationStore};
pub use fetch::{Fetcher, HttpFetcher};
pub use registry::{RegistryChange, RepositoryRegistry};
pub use resolver::{CatalogWarning, UpdateCatalog, UpdateOutcome, UpdateResolver};
pub use store::{ArtifactRef, LocalPluginStore, PluginStore};
pub use zookeeper::ZkCoordinationStore;
