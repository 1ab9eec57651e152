//! CLI interface for pkgctl
//!
//! This module defines the command-line surface using clap's derive API.
//! The package command itself is kept as a raw token plus positional
//! arguments so that validation happens in the dispatcher, before any
//! network or cluster access.

use clap::Parser;
use std::path::PathBuf;

/// Cluster package manager
///
/// Registers package repositories with the cluster, and installs, deploys and
/// updates plugin packages from them.
///
/// Commands: add-repo <name> <uri>, list, list-available,
/// install <id> <version|location>, deploy <id> [args...],
/// redeploy <id> [args...], update [<id> [args...]]
#[derive(Parser, Debug)]
#[command(name = "pkgctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Address of a running node, used to discover the coordination endpoint
    #[arg(long = "solr-url", value_name = "URL")]
    pub solr_url: Option<String>,

    /// Coordination endpoint; skips discovery when given
    #[arg(long = "zk-host", value_name = "HOST")]
    pub zk_host: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Package command to run
    pub command: String,

    /// Arguments for the package command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Rewrite single-dash option spellings (`-solrUrl`, `-zkHost`) to their
/// long forms. Only options before the command token are rewritten.
pub fn normalize_legacy_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut normalized = Vec::new();
    let mut in_options = true;
    let mut expects_value = false;

    for (idx, arg) in args.into_iter().enumerate() {
        if idx == 0 || !in_options {
            normalized.push(arg);
            continue;
        }
        if expects_value {
            expects_value = false;
            normalized.push(arg);
            continue;
        }
        let rewritten = rewrite_legacy_flag(arg);
        if !rewritten.starts_with('-') {
            in_options = false;
        } else if !rewritten.contains('=')
            && matches!(
                rewritten.as_str(),
                "--solr-url" | "--zk-host" | "--log" | "--config"
            )
        {
            expects_value = true;
        }
        normalized.push(rewritten);
    }

    normalized
}

/// Map `-solrUrl[=URL]` and `-zkHost[=HOST]` to their long forms
fn rewrite_legacy_flag(arg: String) -> String {
    const LEGACY: [(&str, &str); 2] = [("-solrUrl", "--solr-url"), ("-zkHost", "--zk-host")];

    for (legacy, long) in LEGACY {
        if arg == legacy {
            return long.to_string();
        }
        if let Some(value) = arg
            .strip_prefix(legacy)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return format!("{}={}", long, value);
        }
    }
    arg
}
