//! Repository registry: trusted package sources stored in the coordination tree
//!
//! The registry is a JSON array at [`REPOSITORIES_PATH`]. The signing key of
//! the most recently registered repository lives at [`TRUST_KEY_PATH`].
//!
//! `add` is a read-modify-write of the registry document and is not atomic
//! against other clients: two operators adding repositories at the same time
//! can lose one of the updates. The registry write and the key write are
//! separate operations; re-running `add` repairs a partial result because
//! existing container nodes are skipped.

use sdk::errors::{PackageError, Result};
use sdk::manifest::{parse_registry, registry_to_json, Repository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::coordination::{ensure_path, CoordinationStore};
use crate::fetch::Fetcher;
use crate::verifier;

/// Registry document path
pub const REPOSITORIES_PATH: &str = "/repositories.json";

/// Container for trust keys
pub const KEYS_PATH: &str = "/keys";

/// Key category for executable package signing keys
pub const EXE_KEYS_PATH: &str = "/keys/exe";

/// Active trust key blob
pub const TRUST_KEY_PATH: &str = "/keys/exe/pub_key.der";

/// Registry contents around a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryChange {
    pub before: Vec<Repository>,
    pub after: Vec<Repository>,
    /// Fingerprint of the trust key that was stored
    pub key_fingerprint: String,
}

/// The list of trusted package sources
#[derive(Clone)]
pub struct RepositoryRegistry {
    store: Arc<dyn CoordinationStore>,
}

impl RepositoryRegistry {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// All registered repositories in registration order.
    ///
    /// A missing registry document, or one with a blank payload, reads as an
    /// empty list.
    pub async fn list(&self) -> Result<Vec<Repository>> {
        if !self.store.exists(REPOSITORIES_PATH).await? {
            return Ok(Vec::new());
        }
        match self.store.read(REPOSITORIES_PATH).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => parse_registry(&bytes),
            // Removed between the check and the read
            Err(PackageError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Look up a repository by id
    pub async fn resolve(&self, id: &str) -> Result<Repository> {
        self.list()
            .await?
            .into_iter()
            .find(|repo| repo.id == id)
            .ok_or_else(|| PackageError::UnknownRepository(id.to_string()))
    }

    /// The stored trust key, if any
    pub async fn trust_key(&self) -> Result<Option<Vec<u8>>> {
        if !self.store.exists(TRUST_KEY_PATH).await? {
            return Ok(None);
        }
        Ok(Some(self.store.read(TRUST_KEY_PATH).await?))
    }

    /// Fetch the repository's public key, then record repository and key.
    ///
    /// The key is fetched before anything is written, so a repository that
    /// does not serve `publickey.der` leaves the registry untouched.
    pub async fn register(&self, repo: Repository, fetcher: &dyn Fetcher) -> Result<RegistryChange> {
        let key_url = repo.public_key_url();
        let key = fetcher
            .fetch(&key_url)
            .await
            .map_err(|e| PackageError::KeyFetchFailed {
                url: key_url.clone(),
                reason: e.to_string(),
            })?;
        if key.is_empty() {
            return Err(PackageError::KeyFetchFailed {
                url: key_url,
                reason: "empty key".to_string(),
            });
        }
        self.add(repo, &key).await
    }

    /// Record `repo` and overwrite the trust key with `trust_key`.
    ///
    /// An entry with the same id is replaced in place; otherwise the
    /// repository is appended.
    pub async fn add(&self, repo: Repository, trust_key: &[u8]) -> Result<RegistryChange> {
        let before = self.list().await?;
        let mut after = before.clone();
        upsert(&mut after, repo.clone());

        let document = registry_to_json(&after)?;
        if self.store.exists(REPOSITORIES_PATH).await? {
            self.store.write(REPOSITORIES_PATH, &document).await?;
        } else {
            self.store.create_if_absent(REPOSITORIES_PATH, &document).await?;
        }
        info!(repository = %repo.id, url = %repo.url, "Recorded repository");

        ensure_path(self.store.as_ref(), EXE_KEYS_PATH).await?;
        self.store_trust_key(trust_key).await?;

        let key_fingerprint = verifier::key_fingerprint(trust_key);
        info!(fingerprint = %key_fingerprint, "Stored trust key");

        Ok(RegistryChange {
            before,
            after,
            key_fingerprint,
        })
    }

    async fn store_trust_key(&self, key: &[u8]) -> Result<()> {
        if self.store.exists(TRUST_KEY_PATH).await? {
            return self.store.write(TRUST_KEY_PATH, key).await;
        }
        match self.store.create_if_absent(TRUST_KEY_PATH, key).await {
            Ok(()) => Ok(()),
            Err(PackageError::AlreadyExists(_)) => {
                debug!("Trust key node created concurrently, overwriting");
                self.store.write(TRUST_KEY_PATH, key).await
            }
            Err(e) => Err(e),
        }
    }
}

fn upsert(repositories: &mut Vec<Repository>, repo: Repository) {
    match repositories.iter_mut().find(|existing| existing.id == repo.id) {
        Some(existing) => *existing = repo,
        None => repositories.push(repo),
    }
}
