//! Exercises the eight testable properties from the repository manager's
//! specification, against the in-memory provider.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{assert_causally_ordered, Event, RecordingDelegate};
use repovault::manager::{ObservabilityScope, RepositoryManager, UpdateStrategy};
use repovault::memory::MemoryProvider;
use repovault::specifier::RepositorySpecifier;

fn scope() -> ObservabilityScope {
    ObservabilityScope::new("test")
}

#[tokio::test]
async fn canonicalization_across_dot_git_variants() {
    let a = RepositorySpecifier::new("https://github.com/org/foo");
    let b = RepositorySpecifier::new("https://github.com/org/foo.git");
    let c = RepositorySpecifier::new("https://GitHub.com/org/foo");
    assert_eq!(a.storage_key(), b.storage_key());
    assert_eq!(a.storage_key(), c.storage_key());
}

#[tokio::test]
async fn single_flight_fetches_once_across_concurrent_lookups() {
    let provider = Arc::new(MemoryProvider::new().with_repo("dummy", vec!["1.0.0".into()]));
    let dir = tempfile::tempdir().unwrap();
    let delegate = Arc::new(RecordingDelegate::new());
    let manager = Arc::new(
        RepositoryManager::new(dir.path(), provider, None, false, None, Some(delegate.clone()))
            .await
            .unwrap(),
    );

    let n = 50;
    let mut handles = Vec::new();
    for _ in 0..n {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .lookup("pkg", RepositorySpecifier::new("dummy"), UpdateStrategy::Always, &scope())
                .await
        }));
    }

    let mut paths = Vec::new();
    for h in handles {
        let handle = h.await.unwrap().unwrap();
        paths.push(handle.clone_path());
    }

    // All concurrent lookups resolve to the same clone path.
    assert!(paths.windows(2).all(|w| w[0] == w[1]));

    // Single-flight dedups only the fetch: one will_fetch/did_fetch pair,
    // and every other concurrent caller still gets its own update.
    assert_eq!(delegate.count(|e| matches!(e, Event::WillFetch { .. })), 1);
    assert_eq!(delegate.count(|e| matches!(e, Event::DidFetch { ok: true, .. })), 1);
    assert_eq!(delegate.count(|e| matches!(e, Event::WillUpdate { .. })), n - 1);
    assert_eq!(delegate.count(|e| matches!(e, Event::DidUpdate { ok: true, .. })), n - 1);
    assert_causally_ordered(&delegate.events());
}

#[tokio::test]
async fn persistence_across_manager_restarts() {
    let provider = Arc::new(MemoryProvider::new().with_repo("dummy", vec!["1.0.0".into()]));
    let dir = tempfile::tempdir().unwrap();

    {
        let manager = RepositoryManager::new(dir.path(), provider.clone(), None, false, None, None)
            .await
            .unwrap();
        manager
            .lookup("pkg", RepositorySpecifier::new("dummy"), UpdateStrategy::Always, &scope())
            .await
            .unwrap();
    }

    {
        let manager = RepositoryManager::new(dir.path(), provider, None, false, None, None)
            .await
            .unwrap();
        let handle = manager
            .lookup("pkg", RepositorySpecifier::new("dummy"), UpdateStrategy::Never, &scope())
            .await
            .unwrap();
        assert_eq!(handle.status(), repovault::catalog::EntryStatus::Available);
    }
}

#[tokio::test]
async fn idempotent_removal() {
    let provider = Arc::new(MemoryProvider::new().with_repo("dummy", vec!["1.0.0".into()]));
    let dir = tempfile::tempdir().unwrap();
    let manager = RepositoryManager::new(dir.path(), provider, None, false, None, None)
        .await
        .unwrap();

    let specifier = RepositorySpecifier::new("dummy");
    manager
        .lookup("pkg", specifier.clone(), UpdateStrategy::Always, &scope())
        .await
        .unwrap();

    manager.remove(&specifier).await.unwrap();
    manager.remove(&specifier).await.unwrap();

    let handle = manager
        .lookup("pkg", specifier, UpdateStrategy::Never, &scope())
        .await
        .unwrap();
    assert_eq!(handle.status(), repovault::catalog::EntryStatus::Available);
}

#[tokio::test]
async fn corruption_recovery_refetches_and_warns() {
    let provider = Arc::new(MemoryProvider::new().with_repo("dummy", vec!["1.0.0".into()]));
    let dir = tempfile::tempdir().unwrap();
    let manager = RepositoryManager::new(dir.path(), provider, None, false, None, None)
        .await
        .unwrap();

    let specifier = RepositorySpecifier::new("dummy");
    let handle = manager
        .lookup("pkg", specifier.clone(), UpdateStrategy::Always, &scope())
        .await
        .unwrap();

    // Invalidate the on-disk clone directly.
    tokio::fs::remove_dir_all(handle.clone_path()).await.unwrap();
    tokio::fs::create_dir_all(handle.clone_path()).await.unwrap();

    let handle = manager
        .lookup("pkg", specifier, UpdateStrategy::Always, &scope())
        .await
        .unwrap();
    assert_eq!(handle.status(), repovault::catalog::EntryStatus::Available);
}

#[tokio::test]
async fn cancellation_fails_in_flight_lookups() {
    let provider = Arc::new(MemoryProvider::new().with_slow_repo("slow", vec![]));
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(
        RepositoryManager::new(dir.path(), provider, None, false, None, None)
            .await
            .unwrap(),
    );

    let manager_clone = manager.clone();
    let lookup = tokio::spawn(async move {
        manager_clone
            .lookup("pkg", RepositorySpecifier::new("slow"), UpdateStrategy::Always, &scope())
            .await
    });

    // Give the leader a moment to actually enter the provider call before
    // cancelling it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let cancelled_count = manager.cancel(std::time::Instant::now() + Duration::from_secs(1)).await;
    assert_eq!(cancelled_count, 1);

    let result = lookup.await.unwrap();
    assert!(result.is_err());
    assert!(result.unwrap_err().is_cancelled());
}
