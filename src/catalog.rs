//! The persistent, atomically-replaced mapping from storage key to on-disk
//! clone metadata.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{RepoVaultError, Result};

const CATALOG_FILE_NAME: &str = "checkouts-state.json";
const CURRENT_VERSION: u32 = 1;

/// Status of a catalog entry's clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// A fetch is in flight or about to start; the clone may not exist
    /// yet.
    Pending,
    /// The clone is present and usable.
    Available,
    /// The most recent fetch/update failed.
    Error,
}

/// A single persisted catalog record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Directory name under the manager root, relative.
    pub subpath: String,
    /// The original URL the caller supplied.
    pub url: String,
    /// Current status.
    pub status: EntryStatus,
    /// Unix-epoch seconds of the last successful fetch or update. Not part
    /// of the abstract schema; carried as an additional field consumers
    /// that don't know about it can ignore, and used internally to
    /// implement `UpdateStrategy::IfOlderThan`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    version: u32,
    object: CatalogObject,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogObject {
    repositories: HashMap<String, CatalogEntry>,
}

impl Default for CatalogDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            object: CatalogObject::default(),
        }
    }
}

/// The on-disk, mutex-guarded catalog. All mutations write a fresh
/// document to a sibling temp file and rename it atomically over the
/// canonical path, so a partially-written catalog is never observable.
pub struct Catalog {
    root: PathBuf,
    document: Mutex<CatalogDocument>,
}

impl Catalog {
    /// Path to the catalog file under `root`.
    #[must_use]
    pub fn path_under(root: &Path) -> PathBuf {
        root.join(CATALOG_FILE_NAME)
    }

    /// Load the catalog from `root`, recovering to an empty catalog on any
    /// parse failure, schema mismatch, or absence — on-disk directories
    /// from a prior run are left alone and simply re-discovered on demand.
    pub async fn load(root: &Path) -> Result<Self> {
        let path = Self::path_under(root);

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<CatalogDocument>(&bytes) {
                Ok(doc) if doc.version == CURRENT_VERSION => doc,
                Ok(_) | Err(_) => {
                    tracing::warn!(path = %path.display(), "catalog is not well-formed, starting empty");
                    CatalogDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CatalogDocument::default(),
            Err(e) => return Err(RepoVaultError::io(path, e)),
        };

        Ok(Self {
            root: root.to_path_buf(),
            document: Mutex::new(document),
        })
    }

    /// Look up an entry by storage key.
    pub async fn get(&self, storage_key: &str) -> Option<CatalogEntry> {
        let doc = self.document.lock().await;
        doc.object.repositories.get(storage_key).cloned()
    }

    /// Insert or replace an entry, then persist the catalog.
    pub async fn put(&self, storage_key: &str, entry: CatalogEntry) -> Result<()> {
        let mut doc = self.document.lock().await;
        doc.object.repositories.insert(storage_key.to_string(), entry);
        self.persist(&doc).await
    }

    /// Remove an entry, then persist the catalog. A no-op (not an error)
    /// if the key is absent.
    pub async fn remove(&self, storage_key: &str) -> Result<()> {
        let mut doc = self.document.lock().await;
        doc.object.repositories.remove(storage_key);
        self.persist(&doc).await
    }

    /// Wipe every entry and persist the now-empty catalog.
    pub async fn clear(&self) -> Result<()> {
        let mut doc = self.document.lock().await;
        doc.object.repositories.clear();
        self.persist(&doc).await
    }

    async fn persist(&self, doc: &CatalogDocument) -> Result<()> {
        let path = Self::path_under(&self.root);
        let tmp_path = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(doc).map_err(|e| RepoVaultError::catalog_corrupt(&path, &e))?;

        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| RepoVaultError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| RepoVaultError::io(&path, e))?;

        Ok(())
    }
}

/// Current time as Unix-epoch seconds, for stamping `last_updated`.
#[must_use]
pub fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_catalog_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(dir.path()).await.unwrap();
        assert!(catalog.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn put_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(dir.path()).await.unwrap();
        catalog
            .put(
                "key1",
                CatalogEntry {
                    subpath: "key1".into(),
                    url: "https://example.com/a".into(),
                    status: EntryStatus::Available,
                    last_updated: Some(42),
                },
            )
            .await
            .unwrap();

        let reloaded = Catalog::load(dir.path()).await.unwrap();
        let entry = reloaded.get("key1").await.unwrap();
        assert_eq!(entry.url, "https://example.com/a");
        assert_eq!(entry.status, EntryStatus::Available);
        assert_eq!(entry.last_updated, Some(42));
    }

    #[tokio::test]
    async fn corrupt_catalog_recovers_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(Catalog::path_under(dir.path()), b"not json")
            .await
            .unwrap();
        let catalog = Catalog::load(dir.path()).await.unwrap();
        assert!(catalog.get("anything").await.is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(dir.path()).await.unwrap();
        catalog.remove("missing").await.unwrap();
        catalog.remove("missing").await.unwrap();
    }
}
