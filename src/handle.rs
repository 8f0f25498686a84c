//! An externally opaque reference to a catalog entry.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::catalog::EntryStatus;
use crate::checkout::WorkingCheckout;
use crate::error::{RepoVaultError, Result};
use crate::provider::{Repository, RepositoryProvider};
use crate::specifier::RepositorySpecifier;

/// In-process reference to a catalog entry. Handles are reference-shared:
/// every lookup for the same specifier returns a handle pointing at the
/// same underlying state, so a status transition observed by one holder is
/// visible to all of them.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleState>,
}

struct HandleState {
    specifier: RepositorySpecifier,
    root: PathBuf,
    subpath: String,
    status: RwLock<EntryStatus>,
    provider: Arc<dyn RepositoryProvider>,
}

impl Handle {
    pub(crate) fn new(
        specifier: RepositorySpecifier,
        root: PathBuf,
        subpath: String,
        status: EntryStatus,
        provider: Arc<dyn RepositoryProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleState {
                specifier,
                root,
                subpath,
                status: RwLock::new(status),
                provider,
            }),
        }
    }

    /// The specifier this handle was looked up with.
    #[must_use]
    pub fn specifier(&self) -> &RepositorySpecifier {
        &self.inner.specifier
    }

    /// Directory the clone lives in, relative to the manager's root.
    #[must_use]
    pub fn subpath(&self) -> &str {
        &self.inner.subpath
    }

    /// Absolute path to the clone.
    #[must_use]
    pub fn clone_path(&self) -> PathBuf {
        self.inner.root.join(&self.inner.subpath)
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> EntryStatus {
        *self.inner.status.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_status(&self, status: EntryStatus) {
        *self.inner.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn require_available(&self) -> Result<()> {
        if self.status() == EntryStatus::Available {
            Ok(())
        } else {
            Err(RepoVaultError::invalid_repository(self.inner.specifier.url()))
        }
    }

    /// Open a read-only view of this handle's clone. Fails unless the
    /// handle is `available`.
    pub async fn open(&self) -> Result<Box<dyn Repository>> {
        self.require_available()?;
        self.inner
            .provider
            .open(&self.inner.specifier, &self.clone_path())
            .await
    }

    /// Materialize a working copy at `at`. Fails unless the handle is
    /// `available`.
    pub async fn create_working_copy(&self, at: &Path, editable: bool) -> Result<Box<dyn WorkingCheckout>> {
        self.require_available()?;
        self.inner
            .provider
            .create_working_copy(&self.inner.specifier, &self.clone_path(), at, editable)
            .await
    }
}
