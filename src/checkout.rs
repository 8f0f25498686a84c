//! The working-checkout contract: a mutable, revision-checked-out
//! directory tree created from a clone.

use async_trait::async_trait;

use crate::error::Result;
use crate::provider::Revision;

/// A mutable working tree, either pointing at a local clone or directly at
/// a remote.
///
/// Edge-case policies (see module docs for the rationale behind each):
/// - [`WorkingCheckout::has_uncommitted_changes`] returns `true` even when
///   only untracked files exist, not yet staged; staging alone also counts.
/// - [`WorkingCheckout::checkout`] on a revision discards uncommitted
///   changes silently.
/// - [`WorkingCheckout::checkout`] on a new branch name creates and
///   switches to it; if the branch already exists, it fails.
/// - [`WorkingCheckout::are_ignored`] honors ignore rules even when the
///   checkout path itself contains whitespace.
#[async_trait]
pub trait WorkingCheckout: Send + Sync {
    /// All tags visible from this checkout.
    async fn get_tags(&self) -> Result<Vec<String>>;

    /// The revision currently checked out.
    async fn get_current_revision(&self) -> Result<Revision>;

    /// Refresh from the checkout's origin.
    async fn fetch(&self) -> Result<()>;

    /// Whether this checkout has commits not present at its origin.
    async fn has_unpushed_commits(&self) -> Result<bool>;

    /// Whether the working tree has any uncommitted changes, staged or
    /// not, including untracked files.
    async fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Switch the working tree to `target`, discarding uncommitted changes
    /// silently.
    async fn checkout(&self, target: CheckoutTarget) -> Result<()>;

    /// Whether `revision` exists and is reachable from this checkout.
    async fn exists(&self, revision: &Revision) -> bool;

    /// Validate that this checkout's shared-object-store linkage still
    /// points at `expected_path`.
    async fn is_alternate_object_store_valid(&self, expected_path: &std::path::Path) -> bool;

    /// For each of `paths`, whether the repository's ignore rules exclude
    /// it.
    async fn are_ignored(&self, paths: &[std::path::PathBuf]) -> Result<Vec<bool>>;
}

/// What to switch a [`WorkingCheckout`] to.
#[derive(Debug, Clone)]
pub enum CheckoutTarget {
    /// An existing tag name.
    Tag(String),
    /// An existing revision identifier.
    Revision(Revision),
    /// A branch to create and switch to; fails if it already exists.
    NewBranch(String),
}
