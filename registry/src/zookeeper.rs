//! ZooKeeper-backed coordination store
//!
//! Nodes map one-to-one onto znodes under the connection string's chroot.
//! Every node is created persistent and world-writable, matching what the
//! cluster's own nodes expect to read.

use async_trait::async_trait;
use sdk::errors::{PackageError, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use zookeeper_client as zk;

use crate::coordination::{validate_path, CoordinationStore};

/// Operation a ZooKeeper error was raised by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Exists,
    Read,
    Create,
    Write,
}

/// Translate a client error into the coordination error taxonomy
fn map_error(op: Op, path: &str, err: zk::Error) -> PackageError {
    match (op, err) {
        (Op::Create, zk::Error::NodeExists) => PackageError::AlreadyExists(path.to_string()),
        (Op::Create, zk::Error::NoNode) => PackageError::NoParent(path.to_string()),
        (Op::Read | Op::Write, zk::Error::NoNode) => PackageError::NotFound(path.to_string()),
        (op, e) => PackageError::ConnectionLost(format!("{:?} {}: {}", op, path, e)),
    }
}

/// Coordination tree held by a ZooKeeper ensemble
pub struct ZkCoordinationStore {
    hosts: String,
    client: Mutex<Option<zk::Client>>,
}

impl ZkCoordinationStore {
    /// Open a session with `hosts` (`host:port[,host:port...][/chroot]`).
    ///
    /// Fails with `ConnectionLost` when no session is established within
    /// `session_timeout`.
    pub async fn connect(hosts: &str, session_timeout: Duration) -> Result<Self> {
        debug!("Connecting to ZooKeeper at {}", hosts);
        let mut connector = zk::Client::connector();
        connector.session_timeout(session_timeout);

        let client = tokio::time::timeout(session_timeout, connector.connect(hosts))
            .await
            .map_err(|_| {
                PackageError::ConnectionLost(format!(
                    "no session with {} after {:?}",
                    hosts, session_timeout
                ))
            })?
            .map_err(|e| PackageError::ConnectionLost(format!("{}: {}", hosts, e)))?;

        Ok(Self {
            hosts: hosts.to_string(),
            client: Mutex::new(Some(client)),
        })
    }

    pub fn hosts(&self) -> &str {
        &self.hosts
    }

    async fn client(&self) -> Result<zk::Client> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| PackageError::ConnectionLost("session closed".to_string()))
    }
}

#[async_trait]
impl CoordinationStore for ZkCoordinationStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        validate_path(path)?;
        let stat = self
            .client()
            .await?
            .check_stat(path)
            .await
            .map_err(|e| map_error(Op::Exists, path, e))?;
        Ok(stat.is_some())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        validate_path(path)?;
        let (data, _stat) = self
            .client()
            .await?
            .get_data(path)
            .await
            .map_err(|e| map_error(Op::Read, path, e))?;
        Ok(data)
    }

    async fn create_if_absent(&self, path: &str, data: &[u8]) -> Result<()> {
        validate_path(path)?;
        let options = zk::CreateMode::Persistent.with_acls(zk::Acls::anyone_all());
        self.client()
            .await?
            .create(path, data, &options)
            .await
            .map_err(|e| map_error(Op::Create, path, e))?;
        debug!("Created znode {}", path);
        Ok(())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        validate_path(path)?;
        self.client()
            .await?
            .set_data(path, data, None)
            .await
            .map_err(|e| map_error(Op::Write, path, e))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // The session ends once the last client handle is dropped.
        if self.client.lock().await.take().is_some() {
            debug!("Closed ZooKeeper session with {}", self.hosts);
        }
        Ok(())
    }
}
