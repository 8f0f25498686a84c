//! Shared test delegate: records every repository-manager lifecycle event
//! so scenario and property tests can assert on count and order (§4.7).

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use repovault::delegate::{FetchResult, RepositoryManagerDelegate};
use repovault::provider::FetchDetails;
use repovault::specifier::RepositorySpecifier;
use repovault::RepoVaultError;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WillFetch { url: String, details: FetchDetails },
    DidFetch { url: String, ok: bool, details: Option<FetchDetails> },
    WillUpdate { url: String },
    DidUpdate { url: String, ok: bool },
}

/// A delegate that records every event it observes, for assertions.
#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<Event>>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

#[async_trait]
impl RepositoryManagerDelegate for RecordingDelegate {
    async fn will_fetch(&self, _package: &str, specifier: &RepositorySpecifier, details: FetchDetails) {
        self.events.lock().unwrap().push(Event::WillFetch {
            url: specifier.url().to_string(),
            details,
        });
    }

    async fn did_fetch(&self, _package: &str, specifier: &RepositorySpecifier, result: &FetchResult, _duration: Duration) {
        let (ok, details) = match result {
            Ok(d) => (true, Some(*d)),
            Err(_) => (false, None),
        };
        self.events.lock().unwrap().push(Event::DidFetch {
            url: specifier.url().to_string(),
            ok,
            details,
        });
    }

    async fn will_update(&self, _package: &str, specifier: &RepositorySpecifier) {
        self.events.lock().unwrap().push(Event::WillUpdate {
            url: specifier.url().to_string(),
        });
    }

    async fn did_update(&self, _package: &str, specifier: &RepositorySpecifier, result: &Result<(), RepoVaultError>, _duration: Duration) {
        self.events.lock().unwrap().push(Event::DidUpdate {
            url: specifier.url().to_string(),
            ok: result.is_ok(),
        });
    }
}

/// Property 8: within a key, `will_fetch` precedes its `did_fetch` and
/// `will_update` precedes its `did_update` — checked as a running-count
/// invariant rather than strict pairwise interleaving, since concurrent
/// waiters may interleave their own update calls with each other.
pub fn assert_causally_ordered(events: &[Event]) {
    let (mut will_fetch, mut did_fetch, mut will_update, mut did_update) = (0, 0, 0, 0);
    for event in events {
        match event {
            Event::WillFetch { .. } => will_fetch += 1,
            Event::DidFetch { .. } => did_fetch += 1,
            Event::WillUpdate { .. } => will_update += 1,
            Event::DidUpdate { .. } => did_update += 1,
        }
        assert!(did_fetch <= will_fetch, "did_fetch observed before matching will_fetch");
        assert!(did_update <= will_update, "did_update observed before matching will_update");
    }
}
