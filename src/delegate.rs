//! Lifecycle/progress notifications fanned out by the manager during
//! fetch and update operations.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RepoVaultError;
use crate::provider::FetchDetails;
use crate::specifier::RepositorySpecifier;

/// Outcome of a fetch, as delivered to [`RepositoryManagerDelegate::did_fetch`].
pub type FetchResult = Result<FetchDetails, RepoVaultError>;

/// Receiver of manager lifecycle events.
///
/// Events for a given storage key are totally ordered
/// (`will_fetch` before `did_fetch`, `will_update` before `did_update`);
/// across different keys no ordering is guaranteed. The manager offers no
/// back-pressure, so implementations must not block arbitrarily — queue
/// work elsewhere if a handler needs to do anything slow.
///
/// Default method bodies are no-ops so callers only override what they
/// need, grounded on the same default-aware design the teacher uses for
/// its smaller provider traits generalized to an observer interface.
#[async_trait]
pub trait RepositoryManagerDelegate: Send + Sync {
    /// About to start a fetch for `specifier`. `package` is an opaque
    /// identity passed through only for the delegate's benefit.
    async fn will_fetch(&self, package: &str, specifier: &RepositorySpecifier, details: FetchDetails) {
        let _ = (package, specifier, details);
    }

    /// Progress pump during an in-flight fetch.
    async fn fetching(
        &self,
        package: &str,
        specifier: &RepositorySpecifier,
        objects_fetched: u64,
        total_objects_to_fetch: Option<u64>,
    ) {
        let _ = (package, specifier, objects_fetched, total_objects_to_fetch);
    }

    /// A fetch for `specifier` finished, successfully or not, after
    /// `duration`.
    async fn did_fetch(&self, package: &str, specifier: &RepositorySpecifier, result: &FetchResult, duration: Duration) {
        let _ = (package, specifier, result, duration);
    }

    /// About to refresh an already-available clone.
    async fn will_update(&self, package: &str, specifier: &RepositorySpecifier) {
        let _ = (package, specifier);
    }

    /// An update for `specifier` finished after `duration`.
    async fn did_update(&self, package: &str, specifier: &RepositorySpecifier, result: &Result<(), RepoVaultError>, duration: Duration) {
        let _ = (package, specifier, result, duration);
    }
}

/// A delegate that observes nothing; used when a caller constructs a
/// manager without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDelegate;

#[async_trait]
impl RepositoryManagerDelegate for NullDelegate {}
