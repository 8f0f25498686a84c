//! A `RepositoryProvider` implemented against a synthetic, in-process
//! filesystem, used by this crate's own tests and by the demo CLI. Tests
//! built on this provider touch no real network and no real VCS binary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;

use crate::checkout::{CheckoutTarget, WorkingCheckout};
use crate::error::{RepoVaultError, Result};
use crate::provider::{FileSystem, ProgressSink, Repository, RepositoryProvider, Revision};
use crate::specifier::RepositorySpecifier;

const MARKER_FILE: &str = ".repovault-clone";
const CHECKOUT_MARKER_FILE: &str = ".repovault-checkout";
const README_NAME: &str = "README.txt";
const README_CONTENT: &[u8] = b"Hi";

/// Definition of a repository the in-memory provider knows about.
#[derive(Debug, Clone)]
struct RepoDef {
    tags: Vec<String>,
    slow: bool,
}

/// In-memory provider: repositories are registered up front via
/// [`MemoryProvider::with_repo`]; any URL not registered is rejected with
/// `InvalidRepository`, mirroring a real provider encountering an
/// unreachable or nonexistent remote.
#[derive(Default)]
pub struct MemoryProvider {
    repos: DashMap<String, RepoDef>,
    cancel_notify: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl MemoryProvider {
    /// An empty provider; register repositories with [`Self::with_repo`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository the provider will accept fetches for.
    #[must_use]
    pub fn with_repo(self, url: impl Into<String>, tags: Vec<String>) -> Self {
        self.repos.insert(
            RepositorySpecifier::new(url.into()).canonical_url(),
            RepoDef { tags, slow: false },
        );
        self
    }

    /// Register a repository whose `fetch` blocks until the provider is
    /// cancelled, for exercising cancellation scenarios.
    #[must_use]
    pub fn with_slow_repo(self, url: impl Into<String>, tags: Vec<String>) -> Self {
        self.repos.insert(
            RepositorySpecifier::new(url.into()).canonical_url(),
            RepoDef { tags, slow: true },
        );
        self
    }

    fn lookup_def(&self, specifier: &RepositorySpecifier) -> Option<RepoDef> {
        self.repos.get(&specifier.canonical_url()).map(|r| r.clone())
    }

    async fn write_marker(&self, path: &Path, url: &str) -> Result<()> {
        tokio::fs::create_dir_all(path).await.map_err(|e| RepoVaultError::io(path, e))?;
        tokio::fs::write(path.join(MARKER_FILE), url)
            .await
            .map_err(|e| RepoVaultError::io(path, e))
    }
}

#[async_trait]
impl RepositoryProvider for MemoryProvider {
    async fn fetch(
        &self,
        specifier: &RepositorySpecifier,
        destination_path: &Path,
        progress_sink: Option<&dyn ProgressSink>,
    ) -> Result<()> {
        let Some(def) = self.lookup_def(specifier) else {
            return Err(RepoVaultError::invalid_repository(specifier.url()));
        };

        if let Some(sink) = progress_sink {
            sink.on_progress(0, Some(1));
        }

        if def.slow {
            tokio::select! {
                () = self.cancel_notify.notified() => {
                    return Err(RepoVaultError::Cancelled { url: specifier.url().to_string() });
                }
                () = tokio::time::sleep(Duration::from_secs(3600)) => {}
            }
        }

        if self.cancelled.load(Ordering::Acquire) {
            return Err(RepoVaultError::Cancelled { url: specifier.url().to_string() });
        }

        self.write_marker(destination_path, specifier.url()).await?;
        if let Some(sink) = progress_sink {
            sink.on_progress(1, Some(1));
        }
        Ok(())
    }

    async fn copy(&self, source_path: &Path, destination_path: &Path) -> Result<()> {
        if !self.repository_exists(source_path).await {
            return Err(RepoVaultError::io(
                source_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source is not a valid clone"),
            ));
        }
        copy_dir_recursive(source_path, destination_path).await
    }

    async fn repository_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }

    async fn is_valid_directory(&self, path: &Path, specifier: Option<&RepositorySpecifier>) -> bool {
        let Ok(contents) = tokio::fs::read(path.join(MARKER_FILE)).await else {
            return false;
        };
        match specifier {
            Some(s) => contents == s.url().as_bytes(),
            None => true,
        }
    }

    async fn open(&self, specifier: &RepositorySpecifier, _path: &Path) -> Result<Box<dyn Repository>> {
        let Some(def) = self.lookup_def(specifier) else {
            return Err(RepoVaultError::invalid_repository(specifier.url()));
        };
        Ok(Box::new(MemoryRepository {
            url: specifier.url().to_string(),
            tags: def.tags,
        }))
    }

    async fn create_working_copy(
        &self,
        specifier: &RepositorySpecifier,
        source_path: &Path,
        destination_path: &Path,
        editable: bool,
    ) -> Result<Box<dyn WorkingCheckout>> {
        tokio::fs::create_dir_all(destination_path)
            .await
            .map_err(|e| RepoVaultError::io(destination_path, e))?;
        tokio::fs::write(destination_path.join(README_NAME), README_CONTENT)
            .await
            .map_err(|e| RepoVaultError::io(destination_path, e))?;
        tokio::fs::write(destination_path.join(CHECKOUT_MARKER_FILE), specifier.url())
            .await
            .map_err(|e| RepoVaultError::io(destination_path, e))?;

        let baseline: HashSet<String> = [README_NAME.to_string(), CHECKOUT_MARKER_FILE.to_string()].into();

        Ok(Box::new(MemoryWorkingCheckout {
            path: destination_path.to_path_buf(),
            source_path: source_path.to_path_buf(),
            editable,
            tags: self.lookup_def(specifier).map(|d| d.tags).unwrap_or_default(),
            current_revision: tokio::sync::Mutex::new("HEAD".to_string()),
            known_branches: tokio::sync::Mutex::new(HashSet::new()),
            baseline,
        }))
    }

    async fn working_copy_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path.join(CHECKOUT_MARKER_FILE)).await.is_ok()
    }

    async fn open_working_copy(&self, path: &Path) -> Result<Box<dyn WorkingCheckout>> {
        if !self.working_copy_exists(path).await {
            return Err(RepoVaultError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no working copy at path"),
            ));
        }
        Ok(Box::new(MemoryWorkingCheckout {
            path: path.to_path_buf(),
            source_path: path.to_path_buf(),
            editable: false,
            tags: Vec::new(),
            current_revision: tokio::sync::Mutex::new("HEAD".to_string()),
            known_branches: tokio::sync::Mutex::new(HashSet::new()),
            baseline: [README_NAME.to_string(), CHECKOUT_MARKER_FILE.to_string()].into(),
        }))
    }

    async fn cancel(&self, _deadline: Instant) {
        self.cancelled.store(true, Ordering::Release);
        self.cancel_notify.notify_waiters();
    }
}

struct MemoryRepository {
    url: String,
    tags: Vec<String>,
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    async fn resolve_revision(&self, tag_or_identifier: &str) -> Result<Revision> {
        if self.tags.iter().any(|t| t == tag_or_identifier) || tag_or_identifier == "HEAD" {
            Ok(tag_or_identifier.to_string())
        } else {
            Err(RepoVaultError::invalid_repository(&self.url))
        }
    }

    async fn exists(&self, revision: &Revision) -> bool {
        self.tags.contains(revision) || revision == "HEAD"
    }

    async fn fetch(&self) -> Result<()> {
        Ok(())
    }

    async fn open_file_view(&self, _revision_or_tag: &str) -> Result<Box<dyn FileSystem>> {
        Ok(Box::new(MemoryFileSystem))
    }
}

struct MemoryFileSystem;

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        if path == Path::new(README_NAME) {
            Ok(README_CONTENT.to_vec())
        } else {
            Err(RepoVaultError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file in view"),
            ))
        }
    }

    async fn list_entries(&self, _path: &Path) -> Result<Vec<String>> {
        Ok(vec![README_NAME.to_string()])
    }

    async fn exists(&self, path: &Path) -> bool {
        path == Path::new(README_NAME)
    }
}

struct MemoryWorkingCheckout {
    path: PathBuf,
    source_path: PathBuf,
    editable: bool,
    tags: Vec<String>,
    current_revision: tokio::sync::Mutex<String>,
    known_branches: tokio::sync::Mutex<HashSet<String>>,
    baseline: HashSet<String>,
}

#[async_trait]
impl WorkingCheckout for MemoryWorkingCheckout {
    async fn get_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    async fn get_current_revision(&self) -> Result<Revision> {
        Ok(self.current_revision.lock().await.clone())
    }

    async fn fetch(&self) -> Result<()> {
        let _ = self.editable;
        Ok(())
    }

    async fn has_unpushed_commits(&self) -> Result<bool> {
        Ok(false)
    }

    async fn has_uncommitted_changes(&self) -> Result<bool> {
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| RepoVaultError::io(&self.path, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| RepoVaultError::io(&self.path, e))? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.baseline.contains(&name) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn checkout(&self, target: CheckoutTarget) -> Result<()> {
        match target {
            CheckoutTarget::Tag(tag) => {
                *self.current_revision.lock().await = tag;
            }
            CheckoutTarget::Revision(rev) => {
                *self.current_revision.lock().await = rev;
            }
            CheckoutTarget::NewBranch(name) => {
                let mut branches = self.known_branches.lock().await;
                if branches.contains(&name) {
                    return Err(RepoVaultError::invalid_repository(format!("branch '{name}' already exists")));
                }
                branches.insert(name.clone());
                *self.current_revision.lock().await = name;
            }
        }
        Ok(())
    }

    async fn exists(&self, revision: &Revision) -> bool {
        self.tags.contains(revision) || revision == "HEAD"
    }

    async fn is_alternate_object_store_valid(&self, expected_path: &Path) -> bool {
        self.source_path == expected_path
    }

    async fn are_ignored(&self, paths: &[PathBuf]) -> Result<Vec<bool>> {
        Ok(paths
            .iter()
            .map(|p| p.extension().is_some_and(|ext| ext == "ignored"))
            .collect())
    }
}

fn copy_dir_recursive<'a>(source: &'a Path, destination: &'a Path) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| RepoVaultError::io(destination, e))?;

        let mut entries = tokio::fs::read_dir(source).await.map_err(|e| RepoVaultError::io(source, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| RepoVaultError::io(source, e))? {
            let file_type = entry.file_type().await.map_err(|e| RepoVaultError::io(entry.path(), e))?;
            let dest_entry = destination.join(entry.file_name());
            if file_type.is_dir() {
                copy_dir_recursive(&entry.path(), &dest_entry).await?;
            } else {
                tokio::fs::copy(entry.path(), &dest_entry)
                    .await
                    .map_err(|e| RepoVaultError::io(dest_entry, e))?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_unknown_url_is_invalid() {
        let provider = MemoryProvider::new();
        let dir = tempfile::tempdir().unwrap();
        let specifier = RepositorySpecifier::new("badDummy");
        let result = provider.fetch(&specifier, &dir.path().join("clone"), None).await;
        assert!(matches!(result, Err(RepoVaultError::InvalidRepository { .. })));
    }

    #[tokio::test]
    async fn fetch_known_url_creates_valid_clone() {
        let provider = MemoryProvider::new().with_repo("dummy", vec!["1.0.0".into()]);
        let dir = tempfile::tempdir().unwrap();
        let clone_path = dir.path().join("clone");
        let specifier = RepositorySpecifier::new("dummy");
        provider.fetch(&specifier, &clone_path, None).await.unwrap();
        assert!(provider.is_valid_directory(&clone_path, Some(&specifier)).await);
    }

    #[tokio::test]
    async fn working_copy_has_readme() {
        let provider = MemoryProvider::new().with_repo("dummy", vec!["1.0.0".into()]);
        let dir = tempfile::tempdir().unwrap();
        let clone_path = dir.path().join("clone");
        let checkout_path = dir.path().join("checkout");
        let specifier = RepositorySpecifier::new("dummy");
        provider.fetch(&specifier, &clone_path, None).await.unwrap();
        provider
            .create_working_copy(&specifier, &clone_path, &checkout_path, false)
            .await
            .unwrap();

        let content = tokio::fs::read(checkout_path.join(README_NAME)).await.unwrap();
        assert_eq!(content, README_CONTENT);
    }
}
