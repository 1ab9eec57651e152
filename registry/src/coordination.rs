//! Coordination store: typed access to the cluster's shared metadata tree
//!
//! The tree is hierarchical: every node has a byte payload and may have
//! children, and a node can only be created once its parent exists
//! (`/keys` before `/keys/exe` before `/keys/exe/pub_key.der`).
//!
//! Operations are awaited one at a time by the caller and never retried here;
//! whether a `ConnectionLost` is fatal is the caller's decision.
//!
//! Two backends ship with the crate:
//! - [`MemoryCoordinationStore`]: in-process tree with call accounting, used in tests
//! - [`FsCoordinationStore`]: a directory tree, one directory per node
//!
//! A ZooKeeper ensemble is served by [`crate::zookeeper::ZkCoordinationStore`].

use async_trait::async_trait;
use sdk::errors::{PackageError, Result};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// Key/value access to the coordination tree
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Whether a node exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Read a node's payload. Fails with `NotFound` when absent.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create a node. Fails with `AlreadyExists` when the node is present,
    /// which after a prior `exists` check means another writer raced us.
    async fn create_if_absent(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Overwrite an existing node's payload
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// End the session. Every later call fails with `ConnectionLost`.
    async fn close(&self) -> Result<()>;
}

/// Validate a coordination path: absolute, no empty or relative segments
pub fn validate_path(path: &str) -> Result<()> {
    if path == "/" {
        return Ok(());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(PackageError::InvalidPath(path.to_string()));
    };
    if rest
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(PackageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Parent of a validated path (`None` for the root)
pub fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Create `path` and every missing ancestor as empty container nodes.
///
/// Nodes that already exist are left untouched, and a container created by a
/// racing writer between our check and our create counts as success.
pub async fn ensure_path(store: &dyn CoordinationStore, path: &str) -> Result<()> {
    validate_path(path)?;
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        if store.exists(&current).await? {
            continue;
        }
        match store.create_if_absent(&current, &[]).await {
            Ok(()) => debug!("Created container node {}", current),
            Err(PackageError::AlreadyExists(_)) => {
                debug!("Container node {} created concurrently", current)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Per-operation call counts recorded by [`MemoryCoordinationStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub exists: usize,
    pub read: usize,
    pub create: usize,
    pub write: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.exists + self.read + self.create + self.write
    }
}

/// In-memory coordination tree
#[derive(Debug, Default)]
pub struct MemoryCoordinationStore {
    nodes: Mutex<BTreeMap<String, Vec<u8>>>,
    exists_calls: AtomicUsize,
    read_calls: AtomicUsize,
    create_calls: AtomicUsize,
    write_calls: AtomicUsize,
    closed: AtomicBool,
    disconnected: AtomicBool,
}

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls made so far, by operation
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            exists: self.exists_calls.load(Ordering::SeqCst),
            read: self.read_calls.load(Ordering::SeqCst),
            create: self.create_calls.load(Ordering::SeqCst),
            write: self.write_calls.load(Ordering::SeqCst),
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Simulate a dropped session: every subsequent call fails
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Paths of every node in the tree, sorted
    pub async fn paths(&self) -> Vec<String> {
        self.nodes.lock().await.keys().cloned().collect()
    }

    fn check_session(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PackageError::ConnectionLost("session closed".to_string()));
        }
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(PackageError::ConnectionLost("session expired".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordinationStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check_session()?;
        validate_path(path)?;
        Ok(path == "/" || self.nodes.lock().await.contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check_session()?;
        validate_path(path)?;
        self.nodes
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| PackageError::NotFound(path.to_string()))
    }

    async fn create_if_absent(&self, path: &str, data: &[u8]) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_session()?;
        validate_path(path)?;
        let mut nodes = self.nodes.lock().await;
        if path == "/" || nodes.contains_key(path) {
            return Err(PackageError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = parent_of(path) {
            if parent != "/" && !nodes.contains_key(parent) {
                return Err(PackageError::NoParent(path.to_string()));
            }
        }
        nodes.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_session()?;
        validate_path(path)?;
        let mut nodes = self.nodes.lock().await;
        match nodes.get_mut(path) {
            Some(existing) => {
                *existing = data.to_vec();
                Ok(())
            }
            None => Err(PackageError::NotFound(path.to_string())),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Name of the payload file inside each node directory
const NODE_DATA_FILE: &str = ".node-data";

/// Prefix of the sibling directory a new node is assembled in
const STAGING_PREFIX: &str = ".staging-";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Directory-backed coordination tree
///
/// Node `/a/b` is the directory `<root>/a/b` and its payload lives in
/// `<root>/a/b/.node-data`. A new node is assembled with its payload in a
/// staging directory and renamed into place, so a node never exists without
/// its data. Renaming onto a populated directory fails, so two clients racing
/// on the same node see exactly one success.
#[derive(Debug)]
pub struct FsCoordinationStore {
    root: PathBuf,
    closed: AtomicBool,
}

impl FsCoordinationStore {
    /// Open a tree rooted at `root`, creating the root directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            PackageError::ConnectionLost(format!(
                "cannot open coordination tree at {}: {}",
                root.display(),
                e
            ))
        })?;
        debug!("Opened coordination tree at {}", root.display());
        Ok(Self {
            root,
            closed: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn node_dir(&self, path: &str) -> Result<PathBuf> {
        validate_path(path)?;
        let mut dir = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == NODE_DATA_FILE || segment.starts_with(STAGING_PREFIX) {
                return Err(PackageError::InvalidPath(path.to_string()));
            }
            dir.push(segment);
        }
        Ok(dir)
    }

    fn check_session(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PackageError::ConnectionLost("session closed".to_string()));
        }
        Ok(())
    }

    fn staging_dir(dir: &Path) -> Option<PathBuf> {
        let parent = dir.parent()?;
        let name = dir.file_name()?.to_string_lossy();
        let seq = STAGING_SEQ.fetch_add(1, Ordering::SeqCst);
        Some(parent.join(format!(
            "{}{}-{}-{}",
            STAGING_PREFIX,
            name,
            std::process::id(),
            seq
        )))
    }

    async fn stage_node(staging: &Path, dir: &Path, data: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir(staging).await?;
        tokio::fs::write(staging.join(NODE_DATA_FILE), data).await?;
        tokio::fs::rename(staging, dir).await
    }

    async fn is_node(dir: &Path) -> Result<bool> {
        match tokio::fs::metadata(dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PackageError::Io(e)),
        }
    }
}

#[async_trait]
impl CoordinationStore for FsCoordinationStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.check_session()?;
        let dir = self.node_dir(path)?;
        Self::is_node(&dir).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.check_session()?;
        let dir = self.node_dir(path)?;
        if !Self::is_node(&dir).await? {
            return Err(PackageError::NotFound(path.to_string()));
        }
        match tokio::fs::read(dir.join(NODE_DATA_FILE)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PackageError::Io(e)),
        }
    }

    async fn create_if_absent(&self, path: &str, data: &[u8]) -> Result<()> {
        self.check_session()?;
        let dir = self.node_dir(path)?;
        if path == "/" {
            return Err(PackageError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = dir.parent() {
            if !Self::is_node(parent).await? {
                return Err(PackageError::NoParent(path.to_string()));
            }
        }
        if Self::is_node(&dir).await? {
            return Err(PackageError::AlreadyExists(path.to_string()));
        }

        let staging =
            Self::staging_dir(&dir).ok_or_else(|| PackageError::InvalidPath(path.to_string()))?;
        if let Err(e) = Self::stage_node(&staging, &dir, data).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                debug!("Could not remove {}: {}", staging.display(), cleanup);
            }
            // Another client's node landed first
            if Self::is_node(&dir).await? {
                return Err(PackageError::AlreadyExists(path.to_string()));
            }
            return Err(PackageError::Io(e));
        }
        debug!("Created node {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.check_session()?;
        let dir = self.node_dir(path)?;
        if !Self::is_node(&dir).await? {
            return Err(PackageError::NotFound(path.to_string()));
        }
        // Replace the payload atomically so readers never see a partial write
        let staged = dir.join(format!("{}.tmp", NODE_DATA_FILE));
        tokio::fs::write(&staged, data).await?;
        tokio::fs::rename(&staged, dir.join(NODE_DATA_FILE)).await?;
        debug!("Wrote node {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Closed coordination tree at {}", self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("/").is_ok());
        assert!(validate_path("/keys/exe/pub_key.der").is_ok());
        assert!(validate_path("keys").is_err());
        assert!(validate_path("/keys/").is_err());
        assert!(validate_path("/keys//exe").is_err());
        assert!(validate_path("/keys/../etc").is_err());
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/"), None);
        assert_eq!(parent_of("/keys"), Some("/"));
        assert_eq!(parent_of("/keys/exe"), Some("/keys"));
    }

    #[tokio::test]
    async fn test_memory_store_requires_parent() {
        let store = MemoryCoordinationStore::new();
        let err = store.create_if_absent("/keys/exe", b"").await.unwrap_err();
        assert!(matches!(err, PackageError::NoParent(_)));

        store.create_if_absent("/keys", b"").await.unwrap();
        store.create_if_absent("/keys/exe", b"").await.unwrap();
        assert!(store.exists("/keys/exe").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_surfaces_already_exists() {
        let store = MemoryCoordinationStore::new();
        store.create_if_absent("/repositories.json", b"[]").await.unwrap();
        let err = store
            .create_if_absent("/repositories.json", b"[]")
            .await
            .unwrap_err();
        assert!(matches!(err, PackageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_memory_store_write_requires_node() {
        let store = MemoryCoordinationStore::new();
        let err = store.write("/missing", b"x").await.unwrap_err();
        assert!(matches!(err, PackageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ensure_path_is_idempotent() {
        let store = MemoryCoordinationStore::new();
        ensure_path(&store, "/keys/exe").await.unwrap();
        ensure_path(&store, "/keys/exe").await.unwrap();
        assert_eq!(store.paths().await, vec!["/keys", "/keys/exe"]);
    }

    #[tokio::test]
    async fn test_closed_store_reports_connection_lost() {
        let store = MemoryCoordinationStore::new();
        store.close().await.unwrap();
        assert!(store.is_closed());
        let err = store.exists("/keys").await.unwrap_err();
        assert!(matches!(err, PackageError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FsCoordinationStore::open(temp.path().join("tree")).await.unwrap();

        assert!(store.exists("/").await.unwrap());
        assert!(!store.exists("/keys").await.unwrap());

        ensure_path(&store, "/keys/exe").await.unwrap();
        store
            .create_if_absent("/keys/exe/pub_key.der", b"key-1")
            .await
            .unwrap();
        store.write("/keys/exe/pub_key.der", b"key-2").await.unwrap();

        assert_eq!(store.read("/keys/exe/pub_key.der").await.unwrap(), b"key-2");
        assert_eq!(store.read("/keys").await.unwrap(), b"");
    }

    #[tokio::test]
    async fn test_fs_store_errors() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FsCoordinationStore::open(temp.path()).await.unwrap();

        let err = store.read("/repositories.json").await.unwrap_err();
        assert!(matches!(err, PackageError::NotFound(_)));

        let err = store.create_if_absent("/keys/exe", b"").await.unwrap_err();
        assert!(matches!(err, PackageError::NoParent(_)));

        store.create_if_absent("/keys", b"").await.unwrap();
        let err = store.create_if_absent("/keys", b"").await.unwrap_err();
        assert!(matches!(err, PackageError::AlreadyExists(_)));

        let err = store.exists("/keys/.node-data").await.unwrap_err();
        assert!(matches!(err, PackageError::InvalidPath(_)));

        let err = store.exists("/.staging-keys-1-0").await.unwrap_err();
        assert!(matches!(err, PackageError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_fs_create_leaves_only_complete_nodes() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("tree");
        let store = FsCoordinationStore::open(&root).await.unwrap();

        store
            .create_if_absent("/repositories.json", b"[]")
            .await
            .unwrap();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&root).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["repositories.json"]);
        assert!(root.join("repositories.json").join(NODE_DATA_FILE).is_file());
        assert_eq!(store.read("/repositories.json").await.unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_fs_node_without_payload_reads_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("tree");
        let store = FsCoordinationStore::open(&root).await.unwrap();

        // Left behind by an interrupted writer from an older layout
        tokio::fs::create_dir(root.join("repositories.json"))
            .await
            .unwrap();

        assert!(store.exists("/repositories.json").await.unwrap());
        assert_eq!(store.read("/repositories.json").await.unwrap(), b"");
        let err = store
            .create_if_absent("/repositories.json", b"[]")
            .await
            .unwrap_err();
        assert!(matches!(err, PackageError::AlreadyExists(_)));
    }
}
