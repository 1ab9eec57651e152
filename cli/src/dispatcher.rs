//! Command dispatch
//!
//! A command token and its arguments are validated first. Only a valid
//! command resolves the coordination endpoint, opens a session and runs its
//! handler. The session is closed on every path once it was opened.

use std::sync::Arc;
use std::time::Duration;

use package_registry::{Fetcher, HttpFetcher, LocalPluginStore, PluginStore};
use sdk::errors::{PackageError, Result};
use tracing::{debug, warn};

use crate::config::Config;
use crate::connector::{Connector, DefaultConnector, Endpoint};
use crate::discovery;
use crate::handlers::{self, Session};
use crate::output::Report;

/// A validated package command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageCommand {
    AddRepo {
        name: String,
        uri: String,
    },
    List,
    ListAvailable,
    Install {
        id: String,
        version_or_location: String,
        args: Vec<String>,
    },
    Deploy {
        id: String,
        args: Vec<String>,
    },
    Redeploy {
        id: String,
        args: Vec<String>,
    },
    Update {
        id: Option<String>,
        args: Vec<String>,
    },
}

impl PackageCommand {
    /// Validate a command token and its positional arguments
    pub fn parse(token: &str, args: &[String]) -> Result<Self> {
        let required = |idx: usize, argument: &str| {
            args.get(idx)
                .cloned()
                .ok_or_else(|| PackageError::MissingArgument {
                    command: token.to_string(),
                    argument: argument.to_string(),
                })
        };
        let rest = |from: usize| args.iter().skip(from).cloned().collect::<Vec<_>>();

        match token {
            "add-repo" => Ok(PackageCommand::AddRepo {
                name: required(0, "name")?,
                uri: required(1, "uri")?,
            }),
            "list" => Ok(PackageCommand::List),
            "list-available" => Ok(PackageCommand::ListAvailable),
            "install" => Ok(PackageCommand::Install {
                id: required(0, "id")?,
                version_or_location: required(1, "version-or-location")?,
                args: rest(2),
            }),
            "deploy" => Ok(PackageCommand::Deploy {
                id: required(0, "id")?,
                args: rest(1),
            }),
            "redeploy" => Ok(PackageCommand::Redeploy {
                id: required(0, "id")?,
                args: rest(1),
            }),
            "update" => Ok(PackageCommand::Update {
                id: args.first().cloned(),
                args: rest(1),
            }),
            other => Err(PackageError::UnrecognizedCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PackageCommand::AddRepo { .. } => "add-repo",
            PackageCommand::List => "list",
            PackageCommand::ListAvailable => "list-available",
            PackageCommand::Install { .. } => "install",
            PackageCommand::Deploy { .. } => "deploy",
            PackageCommand::Redeploy { .. } => "redeploy",
            PackageCommand::Update { .. } => "update",
        }
    }
}

/// Where the coordination endpoint comes from
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    /// Explicit endpoint; skips discovery
    pub zk_host: Option<String>,
    /// Node to ask when no endpoint is given
    pub solr_url: String,
    pub system_info_path: String,
}

impl ClusterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            zk_host: config.cluster.zk_host.clone(),
            solr_url: config.cluster.solr_url.clone(),
            system_info_path: config.cluster.system_info_path.clone(),
        }
    }
}

/// Runs package commands against the cluster
pub struct Dispatcher {
    settings: ClusterSettings,
    fetcher: Arc<dyn Fetcher>,
    connector: Arc<dyn Connector>,
    store: Arc<dyn PluginStore>,
}

impl Dispatcher {
    pub fn new(
        settings: ClusterSettings,
        fetcher: Arc<dyn Fetcher>,
        connector: Arc<dyn Connector>,
        store: Arc<dyn PluginStore>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            connector,
            store,
        }
    }

    /// Wire up the default fetcher, connector and plugin store
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
            Duration::from_secs(config.http.timeout_secs),
            &config.http.user_agent,
        )?);
        let connector = Arc::new(DefaultConnector::new(Duration::from_secs(
            config.cluster.session_timeout_secs,
        )));
        let store = Arc::new(LocalPluginStore::new(
            config.core.plugin_dir.clone(),
            Arc::clone(&fetcher),
        ));

        Ok(Self::new(
            ClusterSettings::from_config(config),
            fetcher,
            connector,
            store,
        ))
    }

    /// Validate and execute one command
    pub async fn run(&self, token: &str, args: &[String]) -> Result<Report> {
        let command = PackageCommand::parse(token, args)?;
        self.execute(command).await
    }

    /// Execute an already validated command
    pub async fn execute(&self, command: PackageCommand) -> Result<Report> {
        let endpoint = self.resolve_endpoint().await?;
        debug!("Running {} against {}", command.name(), endpoint);

        let coordination = self.connector.connect(&endpoint).await?;
        let session = Session::new(
            Arc::clone(&coordination),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
        );

        let result = Self::dispatch(&session, command).await;

        if let Err(e) = coordination.close().await {
            warn!("Failed to close coordination session: {}", e);
        }
        result
    }

    /// Use the configured endpoint, or discover it from the node
    pub async fn resolve_endpoint(&self) -> Result<Endpoint> {
        let address = match &self.settings.zk_host {
            Some(zk_host) => zk_host.clone(),
            None => {
                discovery::discover(
                    self.fetcher.as_ref(),
                    &self.settings.solr_url,
                    &self.settings.system_info_path,
                )
                .await?
            }
        };
        Endpoint::parse(&address)
    }

    async fn dispatch(session: &Session, command: PackageCommand) -> Result<Report> {
        match command {
            PackageCommand::AddRepo { name, uri } => {
                handlers::handle_add_repo(session, &name, &uri).await
            }
            PackageCommand::List => handlers::handle_list(session).await,
            PackageCommand::ListAvailable => handlers::handle_list_available(session).await,
            PackageCommand::Install {
                id,
                version_or_location,
                args,
            } => handlers::handle_install(session, &id, &version_or_location, &args).await,
            PackageCommand::Deploy { id, args } => {
                handlers::handle_deploy(session, &id, &args, false).await
            }
            PackageCommand::Redeploy { id, args } => {
                handlers::handle_deploy(session, &id, &args, true).await
            }
            PackageCommand::Update { id, args } => {
                handlers::handle_update(session, id.as_deref(), &args).await
            }
        }
    }
}
