//! Per-component generation latches
//!
//! A caller that just wrote a record asks for a handle on that record's
//! id. When the indexing job for the record finishes, the latch is completed
//! with the generation of the add (or `NotIndexed`) and removed from the map
//! in one step, so a later request for the same id waits for the next write.

use crate::{ComponentId, IndexOutcome};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Latch {
    outcome: Mutex<Option<IndexOutcome>>,
    ready: Condvar,
}

impl Latch {
    fn fulfill(&self, outcome: IndexOutcome) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
            self.ready.notify_all();
        }
    }
}

/// Future-like view of one pending latch
#[derive(Debug, Clone)]
pub struct IndexingHandle {
    component_id: ComponentId,
    latch: Arc<Latch>,
}

impl IndexingHandle {
    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Block until the record has been processed
    pub fn wait(&self) -> IndexOutcome {
        let mut slot = self.latch.outcome.lock();
        loop {
            if let Some(outcome) = *slot {
                return outcome;
            }
            self.latch.ready.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`; `None` if the record is still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Option<IndexOutcome> {
        let mut slot = self.latch.outcome.lock();
        if slot.is_none() {
            self.latch
                .ready
                .wait_while_for(&mut slot, |outcome| outcome.is_none(), timeout);
        }
        *slot
    }

    pub fn try_get(&self) -> Option<IndexOutcome> {
        *self.latch.outcome.lock()
    }

    pub fn is_complete(&self) -> bool {
        self.try_get().is_some()
    }
}

/// Concurrent map of pending latches keyed by component id
#[derive(Debug, Default)]
pub struct GenerationTracker {
    latches: DashMap<ComponentId, Arc<Latch>>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the latch for `id`; concurrent callers share one latch
    pub fn await_indexing(&self, id: ComponentId) -> IndexingHandle {
        let latch = self
            .latches
            .entry(id)
            .or_insert_with(|| Arc::new(Latch::default()))
            .clone();
        IndexingHandle {
            component_id: id,
            latch,
        }
    }

    /// Complete and remove the latch for `id`; false when nobody was waiting
    pub fn release(&self, id: ComponentId, outcome: IndexOutcome) -> bool {
        match self.latches.remove(&id) {
            Some((_, latch)) => {
                latch.fulfill(outcome);
                true
            }
            None => false,
        }
    }

    /// Complete every pending latch with `outcome`; returns how many there were
    pub fn release_all(&self, outcome: IndexOutcome) -> usize {
        let ids: Vec<ComponentId> = self.latches.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.release(*id, outcome))
            .count()
    }

    pub fn pending(&self) -> usize {
        self.latches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrent_awaits_share_latch() {
        let tracker = GenerationTracker::new();
        let first = tracker.await_indexing(ComponentId(42));
        let second = tracker.await_indexing(ComponentId(42));
        assert_eq!(tracker.pending(), 1);

        assert!(tracker.release(ComponentId(42), IndexOutcome::Indexed(9)));
        assert_eq!(first.wait(), IndexOutcome::Indexed(9));
        assert_eq!(second.try_get(), Some(IndexOutcome::Indexed(9)));
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn test_release_without_waiter_is_noop() {
        let tracker = GenerationTracker::new();
        assert!(!tracker.release(ComponentId(1), IndexOutcome::NotIndexed));
    }

    #[test]
    fn test_await_after_release_gets_fresh_latch() {
        let tracker = GenerationTracker::new();
        let old = tracker.await_indexing(ComponentId(5));
        tracker.release(ComponentId(5), IndexOutcome::Indexed(3));

        let fresh = tracker.await_indexing(ComponentId(5));
        assert!(old.is_complete());
        assert!(!fresh.is_complete());
        assert_eq!(fresh.wait_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_wait_wakes_on_release_from_other_thread() {
        let tracker = Arc::new(GenerationTracker::new());
        let handle = tracker.await_indexing(ComponentId(77));

        let releaser = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                tracker.release(ComponentId(77), IndexOutcome::NotIndexed)
            })
        };

        assert_eq!(
            handle.wait_timeout(Duration::from_secs(5)),
            Some(IndexOutcome::NotIndexed)
        );
        assert!(releaser.join().unwrap());
    }

    #[test]
    fn test_release_all() {
        let tracker = GenerationTracker::new();
        let a = tracker.await_indexing(ComponentId(1));
        let b = tracker.await_indexing(ComponentId(2));
        assert_eq!(tracker.release_all(IndexOutcome::NotIndexed), 2);
        assert!(a.is_complete() && b.is_complete());
    }
}
