//! At-most-one-in-flight-fetch-per-key coordination, bounded concurrency,
//! and waiter fan-out.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Semaphore};

use crate::error::RepoVaultError;
use crate::provider::FetchDetails;

/// Outcome broadcast to every waiter attached to the same leader.
pub type Outcome = Result<FetchDetails, RepoVaultError>;

struct PendingFetch {
    sender: broadcast::Sender<Outcome>,
}

/// Ensures at most one in-flight fetch per storage key, fans completion out
/// to every attached waiter in first-attach order, and enforces a
/// configurable maximum concurrency across keys via a semaphore acquired
/// around each provider call.
pub struct FetchScheduler {
    pending: DashMap<String, PendingFetch>,
    concurrency: Arc<Semaphore>,
}

/// What a caller attaching to [`FetchScheduler::attach_or_lead`] should do
/// next.
pub enum Attachment {
    /// This caller is the leader: it must run the fetch itself and call
    /// [`FetchScheduler::finish`] when done.
    Lead,
    /// Another caller is already the leader; this one should await the
    /// returned receiver for the shared outcome.
    Wait(broadcast::Receiver<Outcome>),
}

impl FetchScheduler {
    /// Create a scheduler bounding concurrent provider calls to
    /// `max_concurrent_operations` (unbounded if `None`, modeled as a very
    /// large permit count since `tokio::sync::Semaphore` has no "infinite"
    /// mode).
    #[must_use]
    pub fn new(max_concurrent_operations: Option<usize>) -> Self {
        let permits = max_concurrent_operations.unwrap_or(Semaphore::MAX_PERMITS);
        Self {
            pending: DashMap::new(),
            concurrency: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Attach to (or become the leader of) the in-flight operation for
    /// `key`.
    pub fn attach_or_lead(&self, key: &str) -> Attachment {
        if let Some(pending) = self.pending.get(key) {
            return Attachment::Wait(pending.sender.subscribe());
        }

        // Race window: two callers may both observe no entry and both try
        // to insert. `DashMap::entry` makes the check-then-insert atomic.
        match self.pending.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => Attachment::Wait(existing.get().sender.subscribe()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let (sender, _) = broadcast::channel(1);
                slot.insert(PendingFetch { sender });
                Attachment::Lead
            }
        }
    }

    /// Leader-only: deliver `outcome` to every attached waiter and remove
    /// the in-flight entry so the next lookup for `key` starts fresh.
    pub fn finish(&self, key: &str, outcome: Outcome) {
        if let Some((_, pending)) = self.pending.remove(key) {
            // No receivers is not an error: waiters may have dropped their
            // receiver (e.g. on cancellation) before the leader finished.
            let _ = pending.sender.send(outcome);
        }
    }

    /// Acquire a concurrency permit for a provider call. Held only across
    /// the provider call itself, never across the catalog lock.
    pub async fn acquire_permit(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.concurrency
            .clone()
            .acquire_owned()
            .await
            .expect("scheduler semaphore is never closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_caller_leads_second_waits() {
        let scheduler = FetchScheduler::new(None);
        assert!(matches!(scheduler.attach_or_lead("k"), Attachment::Lead));
        assert!(matches!(scheduler.attach_or_lead("k"), Attachment::Wait(_)));
    }

    #[tokio::test]
    async fn finish_delivers_outcome_to_waiters() {
        let scheduler = FetchScheduler::new(None);
        assert!(matches!(scheduler.attach_or_lead("k"), Attachment::Lead));
        let Attachment::Wait(mut rx) = scheduler.attach_or_lead("k") else {
            panic!("expected waiter");
        };

        scheduler.finish("k", Ok(FetchDetails::default()));

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.unwrap(), FetchDetails::default());

        // A fresh lookup after finish becomes leader again.
        assert!(matches!(scheduler.attach_or_lead("k"), Attachment::Lead));
    }
}
