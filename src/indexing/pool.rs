//! Bounded worker pool for per-record indexing jobs
//!
//! Jobs go through a bounded queue, so a burst of commits slows down the
//! committing threads instead of growing memory without limit. Every job
//! reports back through its own one-shot channel, and every failure is also
//! forwarded to a single monitor thread that logs and counts it.

use crate::{IndexError, IndexResult};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Result of one submitted job
#[derive(Debug)]
pub struct JobHandle<T> {
    result: Receiver<IndexResult<T>>,
}

impl<T> JobHandle<T> {
    /// Block until the job has run
    pub fn join(self) -> IndexResult<T> {
        self.result.recv().unwrap_or(Err(IndexError::PoolShutDown))
    }
}

/// Fixed set of worker threads fed from a bounded queue
pub struct WorkerPool {
    queue: Mutex<Option<Sender<Task>>>,
    failures: Mutex<Option<Sender<String>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    failed_jobs: Arc<AtomicU64>,
    threads: usize,
    queue_depth: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("queue_depth", &self.queue_depth)
            .field("failed_jobs", &self.failed_jobs())
            .field("running", &self.is_running())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(threads: usize, queue_depth: usize) -> IndexResult<Self> {
        let threads = threads.max(1);
        let queue_depth = queue_depth.max(1);
        let (queue_tx, queue_rx) = bounded::<Task>(queue_depth);
        let (failure_tx, failure_rx) = unbounded::<String>();
        let failed_jobs = Arc::new(AtomicU64::new(0));

        let spawn_error =
            |e: std::io::Error| IndexError::General(format!("Failed to spawn indexing thread: {e}"));

        let monitor = {
            let failed_jobs = Arc::clone(&failed_jobs);
            std::thread::Builder::new()
                .name("termindex-failures".to_string())
                .spawn(move || monitor_failures(failure_rx, failed_jobs))
                .map_err(spawn_error)?
        };

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let queue_rx = queue_rx.clone();
            let worker = std::thread::Builder::new()
                .name(format!("termindex-worker-{i}"))
                .spawn(move || {
                    while let Ok(task) = queue_rx.recv() {
                        task();
                    }
                })
                .map_err(spawn_error)?;
            workers.push(worker);
        }

        debug!("Started {threads} indexing workers (queue depth {queue_depth})");

        Ok(Self {
            queue: Mutex::new(Some(queue_tx)),
            failures: Mutex::new(Some(failure_tx)),
            workers: Mutex::new(workers),
            monitor: Mutex::new(Some(monitor)),
            failed_jobs,
            threads,
            queue_depth,
        })
    }

    /// Queue a job, blocking while the queue is full
    pub fn submit<T, F>(&self, job: F) -> IndexResult<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> IndexResult<T> + Send + 'static,
    {
        // Clone the senders so a blocked submit does not hold the locks
        let queue = self.queue.lock().clone().ok_or(IndexError::PoolShutDown)?;
        let failures = self
            .failures
            .lock()
            .clone()
            .ok_or(IndexError::PoolShutDown)?;

        let (result_tx, result_rx) = bounded(1);
        let task: Task = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                Err(IndexError::JobPanicked {
                    reason: panic_message(payload.as_ref()),
                })
            });
            if let Err(e) = &result {
                let _ = failures.send(e.to_string());
            }
            let _ = result_tx.send(result);
        });

        queue.send(task).map_err(|_| IndexError::PoolShutDown)?;
        Ok(JobHandle { result: result_rx })
    }

    /// Number of jobs that returned an error or panicked
    pub fn failed_jobs(&self) -> u64 {
        self.failed_jobs.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.queue.lock().is_some()
    }

    /// Stop accepting jobs, run everything already queued, join all threads
    pub fn shutdown(&self) {
        if self.queue.lock().take().is_none() {
            return;
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                warn!("Indexing worker exited with a panic");
            }
        }

        // Workers are gone, so this is the last failure sender
        self.failures.lock().take();
        if let Some(monitor) = self.monitor.lock().take() {
            let _ = monitor.join();
        }
        debug!("Indexing worker pool drained");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn monitor_failures(failures: Receiver<String>, failed_jobs: Arc<AtomicU64>) {
    for failure in failures {
        failed_jobs.fetch_add(1, Ordering::Relaxed);
        error!("Indexing job failed: {failure}");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
