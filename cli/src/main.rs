// pkgctl
// Main entry point for the pkgctl binary

use anyhow::Context;
use clap::Parser;
use pkgctl::cli::{normalize_legacy_flags, Cli};
use pkgctl::config::Config;
use pkgctl::dispatcher::Dispatcher;
use pkgctl::output::OutputFormat;
use pkgctl::telemetry::init_telemetry_with_level;
use sdk::errors::PackageErrorExt;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments, accepting the single-dash option spellings
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args()));

    let format = OutputFormat::from_json_flag(cli.json);

    // Load configuration (or use custom path if provided)
    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Command-line flags take precedence over the file
    if let Some(solr_url) = cli.solr_url {
        config.cluster.solr_url = solr_url;
    }
    if let Some(zk_host) = cli.zk_host {
        config.cluster.zk_host = Some(zk_host);
    }
    if let Some(level) = cli.log {
        config.core.log_level = level;
    }
    config.validate_and_process()?;

    init_telemetry_with_level(&config.core.log_level);

    tracing::debug!(
        "pkgctl v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH")
    );

    let dispatcher = Dispatcher::from_config(&config)?;

    match dispatcher.run(&cli.command, &cli.args).await {
        Ok(report) => {
            for warning in report.warnings() {
                eprintln!("warning: {}", warning);
            }
            print!("{}", report.render(format)?);
            Ok(())
        }
        Err(e) => {
            if e.is_recoverable() {
                tracing::warn!("{} failed: {}", cli.command, e);
            } else {
                tracing::error!("{} failed: {}", cli.command, e);
            }
            eprintln!("hint: {}", e.user_hint());
            Err(e).with_context(|| format!("pkgctl {} failed", cli.command))
        }
    }
}
