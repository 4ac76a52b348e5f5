//! Commit-driven write pipeline
//!
//! Every graph commit fans out one job per changed record to the worker
//! pool. Once all jobs of the commit have finished, the writer commits once
//! and the reader is refreshed once, so the whole batch becomes visible at a
//! single generation.

use super::document::DocumentBuilder;
use super::generation::GenerationTracker;
use super::pool::{JobHandle, WorkerPool};
use super::progress::IndexCounters;
use crate::error::ErrorContext;
use crate::graph::{CommitListener, CommitRecord, ComponentSource};
use crate::storage::DocumentIndex;
use crate::{ComponentId, Generation, IndexError, IndexOutcome, IndexResult};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, trace};

/// Summary of one processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub jobs: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Generation the batch became visible at; `None` when nothing was committed
    pub generation: Option<Generation>,
}

impl CommitReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// State shared with every indexing job
struct JobContext {
    index: Arc<DocumentIndex>,
    builder: DocumentBuilder,
    source: Arc<dyn ComponentSource>,
    tracker: Arc<GenerationTracker>,
    counters: Arc<IndexCounters>,
    enabled: AtomicBool,
}

impl JobContext {
    /// Build and add the document for one record, then release its latch
    fn index_record(&self, id: ComponentId) -> IndexResult<IndexOutcome> {
        let result = self.build_and_add(id);
        let outcome = match &result {
            Ok(outcome) => *outcome,
            Err(_) => IndexOutcome::NotIndexed,
        };
        self.tracker.release(id, outcome);
        result
    }

    fn build_and_add(&self, id: ComponentId) -> IndexResult<IndexOutcome> {
        if !self.enabled.load(Ordering::Acquire) {
            return Ok(IndexOutcome::NotIndexed);
        }

        let component = self
            .source
            .fetch(id)
            .map_err(|reason| IndexError::RecordFetch { id, reason })?;
        let Some(component) = component else {
            trace!("Component {id} no longer exists; skipping");
            return Ok(IndexOutcome::NotIndexed);
        };

        let Some(built) = self.builder.build(&component) else {
            trace!("Component {id} has nothing to index");
            return Ok(IndexOutcome::NotIndexed);
        };

        let generation = self
            .index
            .add_document(built.document)
            .map_err(|e| IndexError::JobFailed {
                id,
                cause: e.to_string(),
            })?;
        self.counters.fields_written(&built.fields);
        Ok(IndexOutcome::Indexed(generation))
    }
}

/// Listens for graph commits and keeps the index in step with them
pub struct CommitPipeline {
    context: Arc<JobContext>,
    pool: WorkerPool,
    accepting: AtomicBool,
}

impl std::fmt::Debug for CommitPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitPipeline")
            .field("builder", &self.context.builder)
            .field("pool", &self.pool)
            .field("enabled", &self.is_enabled())
            .field("accepting", &self.accepting.load(Ordering::Relaxed))
            .finish()
    }
}

impl CommitPipeline {
    pub fn new(
        index: Arc<DocumentIndex>,
        builder: DocumentBuilder,
        source: Arc<dyn ComponentSource>,
        tracker: Arc<GenerationTracker>,
        counters: Arc<IndexCounters>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            context: Arc::new(JobContext {
                index,
                builder,
                source,
                tracker,
                counters,
                enabled: AtomicBool::new(true),
            }),
            pool,
            accepting: AtomicBool::new(true),
        }
    }

    /// Toggle indexing; while disabled, jobs release latches with `NotIndexed`
    pub fn set_enabled(&self, enabled: bool) {
        self.context.enabled.store(enabled, Ordering::Release);
        info!(
            "Indexing {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.context.enabled.load(Ordering::Acquire)
    }

    /// Index the records changed by one graph commit
    pub fn handle_commit(&self, commit: &CommitRecord) -> IndexResult<CommitReport> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(IndexError::ServiceShutDown);
        }
        if commit.bulk_load {
            trace!(
                "Bulk load in progress; not indexing {} changed records",
                commit.changed.len()
            );
            return Ok(CommitReport::default());
        }
        if commit.changed.is_empty() {
            return Ok(CommitReport::default());
        }

        self.run_batch(commit.changed.iter().copied())
    }

    /// Clear the index and rebuild it from every record the source knows
    pub fn reindex_all(&self) -> IndexResult<CommitReport> {
        let ids = self.context.source.all_ids();
        info!("Reindexing {} records", ids.len());

        self.context
            .index
            .clear()
            .context("clear index before reindex")?;
        let report = self.run_batch(ids)?;
        self.context.index.mark_reindexed();

        info!(
            "Reindex complete: {} indexed, {} skipped, {} failed",
            report.indexed, report.skipped, report.failed
        );
        Ok(report)
    }

    fn run_batch(&self, ids: impl IntoIterator<Item = ComponentId>) -> IndexResult<CommitReport> {
        let mut pending: Vec<(ComponentId, JobHandle<IndexOutcome>)> = Vec::new();
        for id in ids {
            let context = Arc::clone(&self.context);
            let handle = self.pool.submit(move || context.index_record(id))?;
            self.context.counters.job_submitted();
            pending.push((id, handle));
        }

        let mut report = CommitReport {
            jobs: pending.len(),
            ..CommitReport::default()
        };

        // Sibling jobs keep going when one fails
        for (id, handle) in pending {
            match handle.join() {
                Ok(IndexOutcome::Indexed(_)) => {
                    report.indexed += 1;
                    self.context.counters.record_indexed();
                }
                Ok(IndexOutcome::NotIndexed) => {
                    report.skipped += 1;
                    self.context.counters.record_skipped();
                }
                Err(e) => {
                    debug!("Record {id} failed: {e}");
                    // A panicking job never reached its own release
                    self.context.tracker.release(id, IndexOutcome::NotIndexed);
                    report.failed += 1;
                    self.context.counters.record_failed();
                }
            }
        }

        let generation = self
            .context
            .index
            .commit_and_refresh()
            .context("commit indexing batch")?;
        report.generation = Some(generation);

        if report.has_failures() {
            self.context.counters.commit_failed();
            error!(
                "Batch committed at generation {generation} with {} of {} records failed",
                report.failed, report.jobs
            );
        } else {
            debug!(
                "Batch of {} records committed at generation {generation}",
                report.jobs
            );
        }

        Ok(report)
    }

    /// Refuse further commits; jobs already queued still run
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Run every queued job and stop the workers
    pub fn drain(&self) {
        self.pool.shutdown();
    }

    pub fn failed_jobs(&self) -> u64 {
        self.pool.failed_jobs()
    }
}

impl CommitListener for CommitPipeline {
    fn on_commit(&self, commit: &CommitRecord) {
        if let Err(e) = self.handle_commit(commit) {
            error!("Failed to index commit of {} records: {e}", commit.changed.len());
        }
    }
}
