//! The repository provider contract: the abstract VCS driver this crate
//! coordinates but never implements concretely.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::specifier::RepositorySpecifier;

/// Whether a fetch was served from the shared cache and whether it updated
/// the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FetchDetails {
    /// The clone was copied from the shared cache rather than fetched
    /// directly.
    pub from_cache: bool,
    /// The shared cache was populated or refreshed as part of this fetch.
    pub updated_cache: bool,
}

/// Progress pump invoked during a `fetch`, mirroring the delegate's
/// `fetching` event shape without requiring the provider to know about the
/// delegate contract.
pub trait ProgressSink: Send + Sync {
    /// Called as objects are received; `total` may be `None` if unknown.
    fn on_progress(&self, objects_fetched: u64, total_objects_to_fetch: Option<u64>);
}

/// An opaque revision identifier (a commit hash, a symbolic ref, etc).
pub type Revision = String;

/// Read-only view over the content of a repository at a revision.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file's full contents as bytes.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// List entries directly under `path`.
    async fn list_entries(&self, path: &Path) -> Result<Vec<String>>;

    /// Whether `path` exists in this view.
    async fn exists(&self, path: &Path) -> bool;
}

/// Read-only repository capability, returned by [`RepositoryProvider::open`].
#[async_trait]
pub trait Repository: Send + Sync {
    /// All tags known to this repository.
    async fn get_tags(&self) -> Result<Vec<String>>;

    /// Resolve a tag or other identifier to a concrete revision.
    async fn resolve_revision(&self, tag_or_identifier: &str) -> Result<Revision>;

    /// Whether `revision` exists in this repository.
    async fn exists(&self, revision: &Revision) -> bool;

    /// Refresh this view from its origin.
    async fn fetch(&self) -> Result<()>;

    /// Open a read-only file view at `revision_or_tag`.
    async fn open_file_view(&self, revision_or_tag: &str) -> Result<Box<dyn FileSystem>>;
}

/// The abstract VCS driver contract the manager coordinates.
///
/// A concrete implementation (invoking a real VCS binary, parsing its
/// output) is an external collaborator outside this crate's scope; the
/// in-memory provider (`crate::memory`) is the only implementation this
/// crate ships, used by tests and the demo CLI.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Populate a fresh bare clone at `destination_path`.
    ///
    /// Precondition: `destination_path` does not exist. Postcondition on
    /// success: `destination_path` is a valid bare clone.
    async fn fetch(
        &self,
        specifier: &RepositorySpecifier,
        destination_path: &Path,
        progress_sink: Option<&dyn ProgressSink>,
    ) -> Result<()>;

    /// Byte-for-byte copy of an existing clone, used for cache promotion.
    /// The source is validated as a repository before copying.
    async fn copy(&self, source_path: &Path, destination_path: &Path) -> Result<()>;

    /// Cheap existence check for a clone directory.
    async fn repository_exists(&self, path: &Path) -> bool;

    /// Deeper validation that `path` contains a usable clone, optionally of
    /// the given specifier. Implementations may return `false` or fail;
    /// either outcome is treated as "invalid" by the manager.
    async fn is_valid_directory(&self, path: &Path, specifier: Option<&RepositorySpecifier>) -> bool;

    /// Open a read-only view of the clone at `path`.
    async fn open(&self, specifier: &RepositorySpecifier, path: &Path) -> Result<Box<dyn Repository>>;

    /// Materialize a working tree at `destination_path`, either pointing at
    /// the local clone (`editable = false`) or at the original remote
    /// (`editable = true`).
    async fn create_working_copy(
        &self,
        specifier: &RepositorySpecifier,
        source_path: &Path,
        destination_path: &Path,
        editable: bool,
    ) -> Result<Box<dyn crate::checkout::WorkingCheckout>>;

    /// Whether a working tree already exists at `path`.
    async fn working_copy_exists(&self, path: &Path) -> bool;

    /// Open an existing working tree at `path`.
    async fn open_working_copy(&self, path: &Path) -> Result<Box<dyn crate::checkout::WorkingCheckout>>;

    /// Cooperatively stop all in-flight work for this provider. Operations
    /// not finished by `deadline` are abandoned by the caller; this call
    /// itself returns once the stop signal has been raised, not once every
    /// operation has observed it.
    async fn cancel(&self, deadline: std::time::Instant);
}
