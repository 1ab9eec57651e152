//! pkgctl library
//!
//! Command-line front end for the cluster package manager. It is used by
//! the `pkgctl` binary and by integration tests.

/// Command-line interface
pub mod cli;

/// Configuration management module
pub mod config;

/// Coordination session establishment
pub mod connector;

/// Coordination endpoint discovery
pub mod discovery;

/// Command validation and execution
pub mod dispatcher;

/// Per-command handlers
pub mod handlers;

/// Report rendering
pub mod output;

/// Logging setup
pub mod telemetry;
