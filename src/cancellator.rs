//! Process-wide registry of cooperatively cancellable operations.
//!
//! Each cooperator is responsible for polling its own flag at safe points;
//! the cancellator only raises the flag and reports how many cooperators
//! were live when `cancel` was called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

/// A single cancellable flag, shared between the cancellator and the
/// cooperator that polls it.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    deadline: std::sync::Mutex<Option<Instant>>,
}

impl CancelFlag {
    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// The deadline passed to the most recent `cancel` call, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn raise(&self, deadline: Instant) {
        *self.deadline.lock().unwrap_or_else(|e| e.into_inner()) = Some(deadline);
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Registry keyed by cooperator name, fanning a `cancel(deadline)` call out
/// to every registered flag.
#[derive(Debug, Default)]
pub struct Cancellator {
    cooperators: DashMap<String, Arc<CancelFlag>>,
}

impl Cancellator {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new cooperator under `name`, returning the flag it
    /// should poll. Registering the same name again replaces the previous
    /// flag.
    pub fn register(&self, name: impl Into<String>) -> Arc<CancelFlag> {
        let flag = Arc::new(CancelFlag::default());
        self.cooperators.insert(name.into(), flag.clone());
        flag
    }

    /// Remove a cooperator once its work has completed, whether
    /// successfully or not.
    pub fn unregister(&self, name: &str) {
        self.cooperators.remove(name);
    }

    /// Mark every currently registered cooperator cancelled, with
    /// `deadline` as the point by which unfinished work should be
    /// abandoned. Returns the number of cooperators that were registered
    /// at the time of the call.
    pub fn cancel(&self, deadline: Instant) -> usize {
        let mut count = 0;
        for entry in &self.cooperators {
            entry.value().raise(deadline);
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_marks_all_registered_flags() {
        let registry = Cancellator::new();
        let a = registry.register("a");
        let b = registry.register("b");
        assert!(!a.is_cancelled());

        let cancelled = registry.cancel(Instant::now());
        assert_eq!(cancelled, 2);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[test]
    fn unregister_excludes_from_future_cancels() {
        let registry = Cancellator::new();
        let a = registry.register("a");
        registry.unregister("a");
        registry.cancel(Instant::now());
        assert!(!a.is_cancelled());
    }
}
