//! Configuration management
//!
//! This module handles loading and validation of the pkgctl configuration.
//! Configuration is stored in TOML format at ~/.pkgctl/config.toml and is
//! created with defaults on first use.
//!
//! # Configuration Sections
//!
//! - **core**: Log level and the local plugin directory
//! - **cluster**: Node address, optional coordination endpoint, session timeout
//! - **http**: Timeout and user agent for repository downloads
//!
//! Command-line flags (`--solr-url`, `--zk-host`, `--log`) override the
//! matching values after loading; call [`Config::validate_and_process`]
//! again once overrides are applied.
//!
//! # Examples
//!
//! ```no_run
//! use pkgctl::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Node: {}", config.cluster.solr_url);
//! # Ok(())
//! # }
//! ```

use reqwest::Url;
use sdk::errors::PackageError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Cluster connection settings
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Repository download settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding installed plugin artifacts (supports ~ expansion)
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Base URL of a running node
    #[serde(default = "default_solr_url")]
    pub solr_url: String,

    /// Coordination endpoint; discovered from the node when unset
    #[serde(default)]
    pub zk_host: Option<String>,

    /// Time allowed to establish a coordination session (seconds)
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// Path of the system information resource, relative to `solr_url`
    #[serde(default = "default_system_info_path")]
    pub system_info_path: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout (seconds)
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent to repositories
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("./plugins")
}

fn default_solr_url() -> String {
    "http://localhost:8983/solr".to_string()
}

fn default_session_timeout() -> u64 {
    30
}

fn default_system_info_path() -> String {
    "admin/info/system".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("pkgctl/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            plugin_dir: default_plugin_dir(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            solr_url: default_solr_url(),
            zk_host: None,
            session_timeout_secs: default_session_timeout(),
            system_info_path: default_system_info_path(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.pkgctl/config.toml)
    ///
    /// If the file doesn't exist, a default configuration is written there.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, TOML parsing
    /// fails, or validation fails.
    pub fn load_or_create() -> Result<Self, PackageError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, PackageError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PackageError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, PackageError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| PackageError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;
        Ok(config)
    }

    fn create_default(path: &Path) -> Result<Self, PackageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PackageError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| PackageError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| PackageError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.pkgctl/config.toml)
    pub fn default_config_path() -> Result<PathBuf, PackageError> {
        let home = dirs::home_dir().ok_or_else(|| {
            PackageError::Config("Could not determine home directory".to_string())
        })?;

        Ok(home.join(".pkgctl").join("config.toml"))
    }

    /// Validate values and expand paths
    ///
    /// The plugin directory is not created here; the plugin store creates it
    /// on first install.
    pub fn validate_and_process(&mut self) -> Result<(), PackageError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(PackageError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let url = Url::parse(&self.cluster.solr_url).map_err(|e| {
            PackageError::Config(format!(
                "Invalid solr_url '{}': {}",
                self.cluster.solr_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PackageError::Config(format!(
                "solr_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if let Some(zk_host) = &self.cluster.zk_host {
            if zk_host.trim().is_empty() {
                self.cluster.zk_host = None;
            }
        }

        if self.cluster.session_timeout_secs == 0 {
            return Err(PackageError::Config(
                "session_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(PackageError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.core.plugin_dir = expand_path(&self.core.plugin_dir)?;
        Ok(())
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, PackageError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| PackageError::Config("Invalid UTF-8 in path".to_string()))?;

    let rest = if path_str == "~" {
        ""
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        rest
    } else {
        return Ok(path.to_path_buf());
    };

    let home = dirs::home_dir()
        .ok_or_else(|| PackageError::Config("Could not determine home directory".to_string()))?;
    Ok(home.join(rest))
}
