//! Coordination endpoint discovery
//!
//! When no endpoint is configured, a running node is asked for its system
//! information and the coordination address is read from the response.

use package_registry::Fetcher;
use sdk::errors::{PackageError, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Suffix a node appends to the address of an in-process coordination server
pub const EMBEDDED_SUFFIX: &str = "(embedded)";

/// Mode reported by nodes that take part in a coordinated cluster
pub const CLOUD_MODE: &str = "solrcloud";

/// Subset of the node's system information response
#[derive(Debug, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default, rename = "zkHost")]
    pub zk_host: Option<String>,
}

/// Build the system information URL for a node base URL
pub fn system_info_url(solr_url: &str, info_path: &str) -> String {
    let mut url = solr_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(info_path.trim_start_matches('/'));
    url
}

/// Remove the embedded-server marker and surrounding whitespace
pub fn strip_embedded_suffix(address: &str) -> &str {
    let trimmed = address.trim();
    trimmed
        .strip_suffix(EMBEDDED_SUFFIX)
        .map(str::trim_end)
        .unwrap_or(trimmed)
}

/// Extract the coordination address from a parsed system information response
pub fn coordination_address(info: &SystemInfo) -> Result<String> {
    match info.mode.as_deref() {
        Some(CLOUD_MODE) => {}
        Some(other) => {
            return Err(PackageError::EndpointDiscovery(format!(
                "node is running in '{}' mode, not {}",
                other, CLOUD_MODE
            )))
        }
        None => {
            return Err(PackageError::EndpointDiscovery(
                "node did not report its mode".to_string(),
            ))
        }
    }

    let address = info
        .zk_host
        .as_deref()
        .map(strip_embedded_suffix)
        .unwrap_or_default();
    if address.is_empty() {
        return Err(PackageError::EndpointDiscovery(
            "node did not report a coordination address".to_string(),
        ));
    }
    Ok(address.to_string())
}

/// Ask the node at `solr_url` for its coordination address
pub async fn discover(fetcher: &dyn Fetcher, solr_url: &str, info_path: &str) -> Result<String> {
    let url = system_info_url(solr_url, info_path);
    debug!("Discovering coordination endpoint from {}", url);

    let body = fetcher
        .fetch(&url)
        .await
        .map_err(|e| PackageError::EndpointDiscovery(e.to_string()))?;
    let info: SystemInfo = serde_json::from_slice(&body).map_err(|e| {
        PackageError::EndpointDiscovery(format!("unreadable response from {}: {}", url, e))
    })?;

    let address = coordination_address(&info)?;
    info!("Discovered coordination endpoint {}", address);
    Ok(address)
}
