//! The repository manager facade: lookup/update orchestration, cache
//! promotion, corruption recovery, removal, and reset.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::cancellator::Cancellator;
use crate::catalog::{now_epoch_seconds, Catalog, CatalogEntry, EntryStatus};
use crate::delegate::{NullDelegate, RepositoryManagerDelegate};
use crate::error::{RepoVaultError, Result};
use crate::handle::Handle;
use crate::provider::{FetchDetails, RepositoryProvider};
use crate::scheduler::{Attachment, FetchScheduler};
use crate::specifier::RepositorySpecifier;

const CANCELLATOR_NAME: &str = "repository-manager";

/// Whether a call to `fetch_or_attach` led the fetch itself or merely
/// attached to another caller's in-flight one.
enum FetchOutcome {
    Led,
    Waited,
}

/// How a repeat `lookup` should treat an already-`available` handle.
///
/// There is deliberately no `Default` impl: the source system this crate's
/// design is based on left the default strategy implicit and inconsistent
/// across callers. Every call site must name one explicitly.
#[derive(Debug, Clone, Copy)]
pub enum UpdateStrategy {
    /// Always refresh via the provider.
    Always,
    /// Never refresh; return the handle as-is.
    Never,
    /// Refresh only if the last recorded update is older than the given
    /// duration.
    IfOlderThan(Duration),
}

/// Diagnostic scope name threaded through a lookup, rendered into log
/// spans; purely informational.
#[derive(Debug, Clone)]
pub struct ObservabilityScope(String);

impl ObservabilityScope {
    /// Create a scope with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The scope's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0
    }
}

/// Coordinates lookup/fetch/update of repositories backed by a
/// [`RepositoryProvider`], a persistent [`Catalog`], and an optional shared
/// cache directory.
///
/// Cross-process concurrent use of the same `root` is not supported: the
/// catalog lock and pending-fetch map are in-process only. Running two
/// manager instances over the same root from separate processes can
/// corrupt the catalog or duplicate fetches; callers must avoid it.
pub struct RepositoryManager {
    root: PathBuf,
    cache_path: Option<PathBuf>,
    cache_local_packages: bool,
    provider: Arc<dyn RepositoryProvider>,
    catalog: Catalog,
    scheduler: FetchScheduler,
    delegate: Arc<dyn RepositoryManagerDelegate>,
    handles: DashMap<String, Handle>,
    cancellator: Arc<Cancellator>,
}

impl RepositoryManager {
    /// Construct a manager rooted at `root`. Loads (or recovers) the
    /// catalog at `root` synchronously with respect to the returned
    /// future.
    pub async fn new(
        root: impl Into<PathBuf>,
        provider: Arc<dyn RepositoryProvider>,
        cache_path: Option<PathBuf>,
        cache_local_packages: bool,
        max_concurrent_operations: Option<usize>,
        delegate: Option<Arc<dyn RepositoryManagerDelegate>>,
    ) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| RepoVaultError::io(&root, e))?;
        let catalog = Catalog::load(&root).await?;

        let cancellator = Arc::new(Cancellator::new());
        cancellator.register(CANCELLATOR_NAME);

        Ok(Self {
            root,
            cache_path,
            cache_local_packages,
            provider,
            catalog,
            scheduler: FetchScheduler::new(max_concurrent_operations),
            delegate: delegate.unwrap_or_else(|| Arc::new(NullDelegate)),
            handles: DashMap::new(),
            cancellator,
        })
    }

    /// Find or create a handle for `specifier`, consulting the persisted
    /// catalog on first sight so a process restart recognizes existing
    /// entries (testable property 3, "Persistence").
    async fn handle_for(&self, key: &str, specifier: &RepositorySpecifier) -> Handle {
        if let Some(existing) = self.handles.get(key) {
            return existing.clone();
        }

        let (subpath, status) = match self.catalog.get(key).await {
            Some(entry) => (entry.subpath, entry.status),
            None => (key.to_string(), EntryStatus::Pending),
        };

        let handle = Handle::new(specifier.clone(), self.root.clone(), subpath, status, self.provider.clone());
        self.handles.entry(key.to_string()).or_insert(handle).clone()
    }

    /// Look up a repository, de-duplicating concurrent callers for the
    /// same specifier into a single fetch or update.
    pub async fn lookup(
        &self,
        package_identity: &str,
        specifier: RepositorySpecifier,
        update_strategy: UpdateStrategy,
        scope: &ObservabilityScope,
    ) -> Result<Handle> {
        let key = specifier.storage_key();
        let handle = self.handle_for(&key, &specifier).await;

        match handle.status() {
            EntryStatus::Available => {
                self.refresh_available(package_identity, &key, &specifier, &handle, update_strategy, scope)
                    .await?;
                Ok(handle)
            }
            EntryStatus::Pending | EntryStatus::Error => {
                self.fetch_or_update(package_identity, &key, &specifier, &handle, update_strategy, scope)
                    .await?;
                Ok(handle)
            }
        }
    }

    /// Attach to (or lead) the in-flight fetch for `key`, then — if this
    /// call merely attached to someone else's fetch rather than leading it
    /// — perform its own update pass. Single-flight dedups only the
    /// fetch itself (§4.4); every other concurrent caller still gets its
    /// own `will_update`/`did_update` pair once the clone is available.
    async fn fetch_or_update(
        &self,
        package_identity: &str,
        key: &str,
        specifier: &RepositorySpecifier,
        handle: &Handle,
        update_strategy: UpdateStrategy,
        scope: &ObservabilityScope,
    ) -> Result<()> {
        match self.fetch_or_attach(package_identity, key, specifier, handle, scope).await? {
            FetchOutcome::Led => Ok(()),
            FetchOutcome::Waited => {
                self.refresh_available(package_identity, key, specifier, handle, update_strategy, scope)
                    .await
            }
        }
    }

    async fn refresh_available(
        &self,
        package_identity: &str,
        key: &str,
        specifier: &RepositorySpecifier,
        handle: &Handle,
        update_strategy: UpdateStrategy,
        scope: &ObservabilityScope,
    ) -> Result<()> {
        let should_refresh = match update_strategy {
            UpdateStrategy::Never => false,
            UpdateStrategy::Always => true,
            UpdateStrategy::IfOlderThan(max_age) => self
                .catalog
                .get(key)
                .await
                .and_then(|e| e.last_updated)
                .map(|last| now_epoch_seconds().saturating_sub(last) >= max_age.as_secs())
                .unwrap_or(true),
        };

        if !should_refresh {
            return Ok(());
        }

        let clone_path = handle.clone_path();
        let valid = self.provider.is_valid_directory(&clone_path, Some(specifier)).await;
        if !valid {
            tracing::warn!(
                scope = scope.label(),
                url = specifier.url(),
                "is not valid git repository for '{}', will fetch again",
                specifier.url()
            );
            let _ = tokio::fs::remove_dir_all(&clone_path).await;
            self.catalog.remove(key).await?;
            handle.set_status(EntryStatus::Pending);
            return self
                .fetch_or_update(package_identity, key, specifier, handle, update_strategy, scope)
                .await;
        }

        self.delegate.will_update(package_identity, specifier).await;
        let start = Instant::now();

        let result = match self.provider.open(specifier, &clone_path).await {
            Ok(repository) => repository.fetch().await,
            Err(e) => Err(e),
        };

        if result.is_ok() {
            self.catalog
                .put(
                    key,
                    CatalogEntry {
                        subpath: handle.subpath().to_string(),
                        url: specifier.url().to_string(),
                        status: EntryStatus::Available,
                        last_updated: Some(now_epoch_seconds()),
                    },
                )
                .await?;
        }

        self.delegate
            .did_update(package_identity, specifier, &result, start.elapsed())
            .await;

        result
    }

    async fn fetch_or_attach(
        &self,
        package_identity: &str,
        key: &str,
        specifier: &RepositorySpecifier,
        handle: &Handle,
        scope: &ObservabilityScope,
    ) -> Result<FetchOutcome> {
        match self.scheduler.attach_or_lead(key) {
            Attachment::Lead => {
                let outcome = self.lead_fetch(package_identity, key, specifier, handle, scope).await;
                self.scheduler.finish(key, outcome.clone());
                outcome.map(|_| FetchOutcome::Led)
            }
            Attachment::Wait(mut rx) => match rx.recv().await {
                Ok(Ok(_)) => Ok(FetchOutcome::Waited),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(RepoVaultError::Cancelled {
                    url: specifier.url().to_string(),
                }),
            },
        }
    }

    async fn lead_fetch(
        &self,
        package_identity: &str,
        key: &str,
        specifier: &RepositorySpecifier,
        handle: &Handle,
        scope: &ObservabilityScope,
    ) -> Result<FetchDetails> {
        let plan_from_cache = match &self.cache_path {
            Some(cache_path) => self.provider.repository_exists(&cache_path.join(key)).await,
            None => false,
        };
        self.delegate
            .will_fetch(
                package_identity,
                specifier,
                FetchDetails {
                    from_cache: plan_from_cache,
                    updated_cache: false,
                },
            )
            .await;

        let permit = self.scheduler.acquire_permit().await;
        let start = Instant::now();
        let destination = self.root.join(key);

        let outcome = self.perform_fetch(key, specifier, &destination).await;
        drop(permit);
        let duration = start.elapsed();

        match &outcome {
            Ok(details) => {
                self.catalog
                    .put(
                        key,
                        CatalogEntry {
                            subpath: key.to_string(),
                            url: specifier.url().to_string(),
                            status: EntryStatus::Available,
                            last_updated: Some(now_epoch_seconds()),
                        },
                    )
                    .await?;
                handle.set_status(EntryStatus::Available);
                self.delegate
                    .did_fetch(package_identity, specifier, &Ok(*details), duration)
                    .await;
            }
            Err(e) => {
                tracing::warn!(scope = scope.label(), url = specifier.url(), error = %e, "fetch failed");
                let _ = tokio::fs::remove_dir_all(&destination).await;
                self.catalog.remove(key).await?;
                handle.set_status(EntryStatus::Error);
                self.delegate
                    .did_fetch(package_identity, specifier, &Err(e.clone()), duration)
                    .await;
            }
        }

        outcome
    }

    async fn perform_fetch(
        &self,
        key: &str,
        specifier: &RepositorySpecifier,
        destination: &std::path::Path,
    ) -> Result<FetchDetails> {
        if let Some(cache_path) = &self.cache_path {
            let cache_clone = cache_path.join(key);
            if self.provider.repository_exists(&cache_clone).await
                && self.provider.copy(&cache_clone, destination).await.is_ok()
            {
                return Ok(FetchDetails {
                    from_cache: true,
                    updated_cache: false,
                });
            }

            if self.cache_local_packages || !specifier.is_local() {
                tokio::fs::create_dir_all(cache_path)
                    .await
                    .map_err(|e| RepoVaultError::io(cache_path, e))?;
                self.provider.fetch(specifier, &cache_clone, None).await?;
                self.provider.copy(&cache_clone, destination).await?;
                return Ok(FetchDetails {
                    from_cache: false,
                    updated_cache: true,
                });
            }
        }

        self.provider.fetch(specifier, destination, None).await?;
        Ok(FetchDetails {
            from_cache: false,
            updated_cache: false,
        })
    }

    /// Delete the clone and its catalog entry. Idempotent: removing an
    /// already-absent specifier succeeds.
    pub async fn remove(&self, specifier: &RepositorySpecifier) -> Result<()> {
        let key = specifier.storage_key();
        let path = self.root.join(&key);

        if let Err(e) = tokio::fs::remove_dir_all(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(RepoVaultError::io(&path, e));
            }
        }

        self.catalog.remove(&key).await?;
        self.handles.remove(&key);
        Ok(())
    }

    /// Wipe the entire root directory and in-memory state; subsequent
    /// lookups fetch fresh.
    pub async fn reset(&self, scope: &ObservabilityScope) -> Result<()> {
        tracing::info!(scope = scope.label(), "resetting repository manager state");
        self.catalog.clear().await?;
        self.handles.clear();

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| RepoVaultError::io(&self.root, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| RepoVaultError::io(&self.root, e))? {
            let path = entry.path();
            if path == crate::catalog::Catalog::path_under(&self.root) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                tokio::fs::remove_dir_all(&path).await.map_err(|e| RepoVaultError::io(&path, e))?;
            }
        }
        Ok(())
    }

    /// Evict cache-directory clones beyond `max_entries`, oldest-first by
    /// modification time. A supplemented maintenance operation on the
    /// shared cache only; the primary catalog is never evicted this way.
    pub async fn evict_cache(&self, max_entries: usize) -> Result<usize> {
        let Some(cache_path) = &self.cache_path else {
            return Ok(0);
        };

        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(cache_path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(RepoVaultError::io(cache_path, e)),
        };
        while let Some(entry) = dir.next_entry().await.map_err(|e| RepoVaultError::io(cache_path, e))? {
            if let Ok(metadata) = entry.metadata().await {
                if metadata.is_dir() {
                    let modified = metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                    entries.push((entry.path(), modified));
                }
            }
        }

        if entries.len() <= max_entries {
            return Ok(0);
        }

        entries.sort_by_key(|(_, modified)| *modified);
        let to_remove = entries.len() - max_entries;
        let mut removed = 0;
        for (path, _) in entries.into_iter().take(to_remove) {
            if tokio::fs::remove_dir_all(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cooperatively cancel all in-flight operations; unfinished work past
    /// `deadline` is abandoned. Returns the number of registered
    /// cooperators (this manager registers itself as exactly one).
    pub async fn cancel(&self, deadline: Instant) -> usize {
        let count = self.cancellator.cancel(deadline);
        self.provider.cancel(deadline).await;
        count
    }
}
