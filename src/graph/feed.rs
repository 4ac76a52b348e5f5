//! Commit notification feed
//!
//! In-process fan-out of commit notifications from the graph's commit
//! machinery to registered listeners. Listeners run on the publishing thread,
//! so a listener that blocks holds up the commit that triggered it.

use crate::ComponentId;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Changes made durable by one graph commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRecord {
    /// Records touched by the commit
    pub changed: Vec<ComponentId>,
    /// Set while a mass import runs; per-commit indexing is skipped
    pub bulk_load: bool,
}

impl CommitRecord {
    pub fn new(changed: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            changed: changed.into_iter().collect(),
            bulk_load: false,
        }
    }

    pub fn bulk(changed: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            changed: changed.into_iter().collect(),
            bulk_load: true,
        }
    }
}

/// Receives commit notifications
pub trait CommitListener: Send + Sync {
    fn on_commit(&self, commit: &CommitRecord);
}

/// Handle returned by [`CommitFeed::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Manages commit notification delivery to multiple listeners
#[derive(Default)]
pub struct CommitFeed {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn CommitListener>)>>,
    next_id: AtomicU64,
}

impl CommitFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every subsequent commit
    pub fn subscribe(&self, listener: Arc<dyn CommitListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        debug!("Commit listener {:?} subscribed", id);
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            debug!("Commit listener {:?} unsubscribed", id);
        }
        removed
    }

    /// Deliver a commit to every listener, returning how many were notified
    pub fn publish(&self, commit: &CommitRecord) -> usize {
        // Snapshot so listeners may unsubscribe while being notified
        let listeners: Vec<Arc<dyn CommitListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!(
            "Publishing commit with {} changes to {} listeners",
            commit.changed.len(),
            listeners.len()
        );
        for listener in &listeners {
            listener.on_commit(commit);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for CommitFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitFeed")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
