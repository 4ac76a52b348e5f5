//! The indexing service context
//!
//! Owns one named index together with everything that keeps it current: the
//! write pipeline and its worker pool, the generation tracker, and the
//! background reopen thread. Built explicitly from [`Settings`] and the graph
//! collaborators; nothing here is global.

use crate::config::Settings;
use crate::error::ErrorContext;
use crate::graph::{CommitFeed, ComponentSource, SubscriptionId, TagResolver};
use crate::indexing::{
    CommitPipeline, CommitReport, ConceptFields, DocumentBuilder, GenerationTracker,
    IndexCounters, IndexStats, IndexingHandle, WorkerPool,
};
use crate::storage::{DocumentIndex, ReopenCadence, ReopenThread, SearchQuery, StorageError};
use crate::types::millis;
use crate::{
    ComponentId, Generation, IndexError, IndexOutcome, IndexResult, SearchResult, SearchResults,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub struct IndexService {
    settings: Settings,
    index: Arc<DocumentIndex>,
    tracker: Arc<GenerationTracker>,
    counters: Arc<IndexCounters>,
    pipeline: Arc<CommitPipeline>,
    reopen: ReopenThread,
    subscription: Mutex<Option<(Arc<CommitFeed>, SubscriptionId)>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for IndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexService")
            .field("index", &self.index)
            .field("pipeline", &self.pipeline)
            .field("pending_latches", &self.tracker.pending())
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}

impl IndexService {
    /// Open the index and start its threads
    ///
    /// When `feed` is given, the write pipeline subscribes to it. If the
    /// on-disk index had to be rebuilt, a full reindex runs before this
    /// returns.
    pub fn start(
        settings: Settings,
        source: Arc<dyn ComponentSource>,
        tags: Arc<dyn TagResolver>,
        feed: Option<Arc<CommitFeed>>,
    ) -> IndexResult<Self> {
        settings
            .validate()
            .map_err(|reason| IndexError::ConfigError { reason })?;

        let directory = settings.index.directory();
        let index = Arc::new(DocumentIndex::open(
            &directory,
            settings.index.writer_heap_bytes(),
        )?);

        let cadence = ReopenCadence {
            max_stale: settings.refresh.max_stale(),
            min_stale: settings.refresh.min_stale(),
        };
        let reopen =
            ReopenThread::spawn(Arc::clone(&index), Arc::clone(index.visibility()), cadence)
                .map_err(|e| IndexError::General(format!("Failed to start reopen thread: {e}")))?;

        let mut builder = DocumentBuilder::new(index.schema().clone(), tags)
            .with_metadata_module(settings.index.metadata_module.map(ComponentId));
        if settings.indexing.index_concepts {
            builder = builder.with_contributor(Box::new(ConceptFields));
        }

        let tracker = Arc::new(GenerationTracker::new());
        let counters = Arc::new(IndexCounters::default());
        let pool = WorkerPool::new(
            settings.indexing.parallel_threads,
            settings.indexing.queue_depth,
        )?;
        let pipeline = Arc::new(CommitPipeline::new(
            Arc::clone(&index),
            builder,
            source,
            Arc::clone(&tracker),
            Arc::clone(&counters),
            pool,
        ));
        if !settings.index.enabled {
            pipeline.set_enabled(false);
        }

        let subscription = feed.map(|feed| {
            let id = feed.subscribe(pipeline.clone());
            (feed, id)
        });

        let service = Self {
            settings,
            index,
            tracker,
            counters,
            pipeline,
            reopen,
            subscription: Mutex::new(subscription),
            shut_down: AtomicBool::new(false),
        };

        if service.index.status().reindex_required {
            info!(
                "Index at {} must be rebuilt; reindexing before the service is ready",
                directory.display()
            );
            let report = service.reindex_in_background()?;
            info!(
                "Startup reindex finished: {} records indexed at generation {}",
                report.indexed,
                report.generation.unwrap_or_default()
            );
        }

        info!(
            "Index service ready at {} (validity: {})",
            directory.display(),
            service.index.status().validity
        );
        Ok(service)
    }

    fn reindex_in_background(&self) -> IndexResult<CommitReport> {
        let pipeline = Arc::clone(&self.pipeline);
        let worker = std::thread::Builder::new()
            .name("termindex-reindex".to_string())
            .spawn(move || pipeline.reindex_all())
            .map_err(|e| IndexError::General(format!("Failed to start reindex: {e}")))?;
        worker.join().map_err(|_| IndexError::JobPanicked {
            reason: "full reindex panicked".to_string(),
        })?
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    /// Parser-mode query with no restriction and no generation wait
    pub fn query(&self, text: &str, limit: usize) -> SearchResult<SearchResults> {
        self.search(&SearchQuery::parsed(text).with_limit(limit))
    }

    pub fn search(&self, query: &SearchQuery) -> SearchResult<SearchResults> {
        self.index.search(
            query,
            self.settings.search.dedup_headroom_percent,
            millis(self.settings.search.default_wait_timeout_ms),
        )
    }

    /// Handle resolving to the generation of the next write of `id`
    pub fn await_indexing(&self, id: ComponentId) -> IndexingHandle {
        self.tracker.await_indexing(id)
    }

    /// Clear the index and rebuild it from the record source
    pub fn reindex(&self) -> IndexResult<CommitReport> {
        self.ensure_running()?;
        self.pipeline.reindex_all()
    }

    pub fn commit_writer(&self) -> IndexResult<Generation> {
        self.index.commit().context("commit writer")
    }

    pub fn force_merge(&self) -> IndexResult<bool> {
        self.index.force_merge().context("force merge")
    }

    pub fn clear_index(&self) -> IndexResult<Generation> {
        self.index.clear().context("clear index")
    }

    pub fn close_writer(&self) -> IndexResult<()> {
        self.index.close_writer().context("close writer")
    }

    pub fn invalidate(&self) {
        self.index.invalidate();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.pipeline.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.pipeline.is_enabled()
    }

    pub fn stats(&self) -> IndexStats {
        let status = self.index.status();
        let mut stats = IndexStats::new(status.validity);
        stats.reindex_required = status.reindex_required;
        stats.documents = self.index.document_count();
        stats.visible_generation = self.index.visible_generation();
        self.counters.apply_to(&mut stats);
        stats
    }

    fn ensure_running(&self) -> IndexResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(IndexError::ServiceShutDown)
        } else {
            Ok(())
        }
    }

    /// Stop the service; idempotent
    ///
    /// Order: stop taking commits, drain the pool, commit what the jobs
    /// added, stop the reopen thread, close the writer.
    pub fn shutdown(&self) -> IndexResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("Shutting down index service");

        if let Some((feed, id)) = self.subscription.lock().take() {
            feed.unsubscribe(id);
        }
        self.pipeline.stop_accepting();
        self.pipeline.drain();

        let committed = match self.index.commit() {
            Ok(generation) => {
                debug!("Final commit at generation {generation}");
                Ok(())
            }
            // An administrator closed the writer earlier
            Err(StorageError::WriterClosed) => Ok(()),
            Err(e) => Err(IndexError::storage("final commit", e)),
        };

        self.reopen.stop();
        let closed = self.index.close_writer().context("close writer");

        let abandoned = self.tracker.release_all(IndexOutcome::NotIndexed);
        if abandoned > 0 {
            warn!("Released {abandoned} indexing latches that were never written");
        }

        info!("Index service at {} stopped", self.index.path().display());
        committed.and(closed)
    }
}

impl Drop for IndexService {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Index service shutdown failed: {e}");
        }
    }
}
