//! Generation visibility and the background reopen thread
//!
//! `Visibility` records which generation the shared searcher snapshot
//! currently reflects and lets callers block until a target generation is
//! published. `ReopenThread` periodically refreshes the reader: slowly when
//! nobody is waiting, quickly while a caller waits for a generation.

use crate::{Generation, WaitOutcome};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
struct VisibilityState {
    /// Generation published to readers
    searching: Generation,
    /// Targets of callers currently blocked in `wait_for`, with their counts
    waiting: BTreeMap<Generation, usize>,
    /// Set once the reopen thread must exit
    stopped: bool,
}

impl VisibilityState {
    fn register(&mut self, target: Generation) {
        *self.waiting.entry(target).or_default() += 1;
    }

    fn deregister(&mut self, target: Generation) {
        if let Some(count) = self.waiting.get_mut(&target) {
            *count -= 1;
            if *count == 0 {
                self.waiting.remove(&target);
            }
        }
    }

    /// True while some blocked caller wants a generation not yet published
    fn has_waiters(&self) -> bool {
        self.waiting
            .last_key_value()
            .is_some_and(|(target, _)| *target > self.searching)
    }
}

/// Published-generation bookkeeping shared by the index and its reopen thread
#[derive(Debug, Default)]
pub struct Visibility {
    state: Mutex<VisibilityState>,
    /// Signalled whenever a new generation is published
    published: Condvar,
    /// Signalled to wake the reopen thread early
    wake: Condvar,
}

impl Visibility {
    pub fn new(initial: Generation) -> Self {
        Self {
            state: Mutex::new(VisibilityState {
                searching: initial,
                ..VisibilityState::default()
            }),
            published: Condvar::new(),
            wake: Condvar::new(),
        }
    }

    /// Generation currently visible to new searchers
    pub fn current(&self) -> Generation {
        self.state.lock().searching
    }

    /// Record that readers now see `generation`; never moves backwards
    pub fn publish(&self, generation: Generation) {
        let mut state = self.state.lock();
        if generation > state.searching {
            state.searching = generation;
            trace!("Published generation {generation}");
        }
        self.published.notify_all();
    }

    /// Block until `target` is visible, or until `timeout` elapses
    pub fn wait_for(&self, target: Generation, timeout: Option<Duration>) -> WaitOutcome {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        if state.searching >= target {
            return WaitOutcome::Visible(state.searching);
        }

        state.register(target);
        // Let the reopen thread switch to its fast cadence
        self.wake.notify_all();

        let outcome = loop {
            if state.searching >= target {
                break WaitOutcome::Visible(state.searching);
            }
            if state.stopped {
                break WaitOutcome::NotYetVisible;
            }
            match deadline {
                Some(deadline) => {
                    if self.published.wait_until(&mut state, deadline).timed_out() {
                        break if state.searching >= target {
                            WaitOutcome::Visible(state.searching)
                        } else {
                            WaitOutcome::NotYetVisible
                        };
                    }
                }
                None => self.published.wait(&mut state),
            }
        };

        state.deregister(target);
        outcome
    }

    /// Number of callers blocked in `wait_for`
    pub fn waiters(&self) -> usize {
        self.state.lock().waiting.values().sum()
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        self.wake.notify_all();
        self.published.notify_all();
    }
}

/// Something the reopen thread can refresh
pub trait Refresh: Send + Sync + 'static {
    fn refresh(&self) -> Result<Generation, String>;
}

/// How often the reopen thread refreshes
#[derive(Debug, Clone, Copy)]
pub struct ReopenCadence {
    /// Interval when no caller waits
    pub max_stale: Duration,
    /// Interval while a caller waits for a generation
    pub min_stale: Duration,
}

/// Background loop exposing committed writer state to readers
pub struct ReopenThread {
    visibility: Arc<Visibility>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReopenThread {
    /// Spawn the loop; it runs until [`ReopenThread::stop`]
    pub fn spawn<R: Refresh>(
        target: Arc<R>,
        visibility: Arc<Visibility>,
        cadence: ReopenCadence,
    ) -> std::io::Result<Self> {
        let shared = Arc::clone(&visibility);
        let handle = std::thread::Builder::new()
            .name("termindex-reopen".to_string())
            .spawn(move || run(target, shared, cadence))?;

        Ok(Self {
            visibility,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop the loop and wait for it to exit; idempotent
    pub fn stop(&self) {
        self.visibility.stop();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Reopen thread panicked before shutdown");
            }
            debug!("Reopen thread stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for ReopenThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<R: Refresh>(target: Arc<R>, visibility: Arc<Visibility>, cadence: ReopenCadence) {
    debug!(
        "Reopen thread started (max_stale: {:?}, min_stale: {:?})",
        cadence.max_stale, cadence.min_stale
    );
    let mut state = visibility.state.lock();
    loop {
        if state.stopped {
            break;
        }
        let interval = if state.has_waiters() {
            cadence.min_stale
        } else {
            cadence.max_stale
        };

        // Being woken only shortens the next interval; refresh happens on timeout
        let timed_out = visibility.wake.wait_for(&mut state, interval).timed_out();
        if state.stopped {
            break;
        }
        if !timed_out {
            continue;
        }

        let outcome = MutexGuard::unlocked(&mut state, || target.refresh());
        if let Err(e) = outcome {
            warn!("Background reader refresh failed: {e}");
        }
    }
}
