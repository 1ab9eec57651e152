//! Command handlers
//!
//! Each handler runs one package command against an open coordination
//! session and returns a [`Report`] for the caller to render.

use std::sync::Arc;

use package_registry::{
    CoordinationStore, Fetcher, PluginStore, RepositoryRegistry, UpdateResolver,
};
use sdk::errors::Result;
use sdk::manifest::Repository;
use tracing::info;

use crate::output::Report;

/// Services bound to one coordination session
pub struct Session {
    registry: RepositoryRegistry,
    resolver: UpdateResolver,
    fetcher: Arc<dyn Fetcher>,
}

impl Session {
    pub fn new(
        coordination: Arc<dyn CoordinationStore>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn PluginStore>,
    ) -> Self {
        let registry = RepositoryRegistry::new(coordination);
        let resolver = UpdateResolver::new(registry.clone(), Arc::clone(&fetcher), store);
        Self {
            registry,
            resolver,
            fetcher,
        }
    }
}

/// Register a repository and store its trust key
pub async fn handle_add_repo(session: &Session, name: &str, uri: &str) -> Result<Report> {
    let repo = Repository::new(name, uri);
    let change = session
        .registry
        .register(repo, session.fetcher.as_ref())
        .await?;
    info!("Added repository {} ({})", name, uri);

    Ok(Report::RepositoryAdded {
        name: name.to_string(),
        change,
    })
}

/// List plugins in the local store
pub async fn handle_list(session: &Session) -> Result<Report> {
    let plugins = session.resolver.store().list_installed().await?;
    Ok(Report::Installed { plugins })
}

/// List every package offered by the registered repositories
pub async fn handle_list_available(session: &Session) -> Result<Report> {
    let catalog = session.resolver.fetch_catalog().await?;
    Ok(Report::Available { catalog })
}

/// Install a package at a version, or from an artifact location
pub async fn handle_install(
    session: &Session,
    id: &str,
    version_or_location: &str,
    args: &[String],
) -> Result<Report> {
    let catalog = session.resolver.fetch_catalog().await?;
    let plugin = session
        .resolver
        .install_from(&catalog, id, version_or_location, args)
        .await?;

    Ok(Report::PackageInstalled {
        plugin,
        warnings: catalog.warnings().to_vec(),
    })
}

/// Deploy an installed package, or replace its running deployment
pub async fn handle_deploy(
    session: &Session,
    id: &str,
    args: &[String],
    redeploy: bool,
) -> Result<Report> {
    let store = session.resolver.store();
    let status = if redeploy {
        store.deploy_update(id, args).await?
    } else {
        store.deploy_fresh(id, args).await?
    };
    info!("{} {} {}", status.action, status.id, status.version);

    Ok(Report::Deployment { status })
}

/// Report available updates, or update a single package
pub async fn handle_update(session: &Session, id: Option<&str>, args: &[String]) -> Result<Report> {
    let catalog = session.resolver.fetch_catalog().await?;
    let warnings = catalog.warnings().to_vec();

    match id {
        None => {
            let updates = session.resolver.updates_in(&catalog).await?;
            Ok(Report::Updates { updates, warnings })
        }
        Some(id) => {
            let outcome = session.resolver.update_from(&catalog, id, args).await?;
            Ok(Report::PackageUpdate { outcome, warnings })
        }
    }
}
