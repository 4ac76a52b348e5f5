//! Tantivy-backed component index
//!
//! Owns the writer and reader of one named index. Adds are concurrent and
//! append-only; commits, merges and close are serialized through the writer
//! lock. Each commit's opstamp is the generation readers see once the reader
//! has been refreshed past it.

use super::lifecycle::{self, IndexStatus, OpenedIndex};
use super::query::{SearchQuery, collapse, fetch_limit};
use super::reopen::{Refresh, Visibility};
use super::schema::{COMPONENT_ID, IndexSchema};
use super::{StorageError, StorageResult};
use crate::{
    ComponentId, Generation, GenerationTarget, IndexResult, IndexValidity, SearchHit,
    SearchResult, SearchResults, WaitOutcome,
};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, Query};
use tantivy::schema::Value;
use tantivy::{
    Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument as Document,
};
use tracing::{debug, info, trace};

/// Document index for full-text search over graph components
pub struct DocumentIndex {
    index: Index,
    reader: IndexReader,
    schema: IndexSchema,
    index_path: PathBuf,
    /// Read lock for adds, write lock for commit/merge/close
    writer: RwLock<Option<IndexWriter<Document>>>,
    status: Mutex<IndexStatus>,
    /// Highest opstamp handed out by the writer
    last_assigned: AtomicU64,
    /// Opstamp of the most recent durable commit
    last_committed: AtomicU64,
    /// Serializes reader reloads so publication stays ordered
    refresh_lock: Mutex<()>,
    visibility: Arc<Visibility>,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("index_path", &self.index_path)
            .field("status", &*self.status.lock())
            .field("last_assigned", &self.last_assigned.load(Ordering::Relaxed))
            .field("last_committed", &self.last_committed.load(Ordering::Relaxed))
            .field("visible", &self.visibility.current())
            .field("writer_open", &self.writer.read().is_some())
            .finish()
    }
}

impl DocumentIndex {
    /// Open (or create, or rebuild) the index at `index_path`
    pub fn open(index_path: impl AsRef<Path>, heap_bytes: usize) -> IndexResult<Self> {
        let opened = lifecycle::open(index_path, heap_bytes)?;
        let path = opened.path.clone();
        Self::from_opened(opened).map_err(|e| crate::IndexError::OpenError {
            path,
            source: Box::new(e),
        })
    }

    fn from_opened(opened: OpenedIndex) -> StorageResult<Self> {
        let OpenedIndex {
            index,
            writer,
            schema,
            path,
            status,
            generation,
        } = opened;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            schema,
            index_path: path,
            writer: RwLock::new(Some(writer)),
            status: Mutex::new(status),
            last_assigned: AtomicU64::new(generation),
            last_committed: AtomicU64::new(generation),
            refresh_lock: Mutex::new(()),
            visibility: Arc::new(Visibility::new(generation)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.index_path
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn visibility(&self) -> &Arc<Visibility> {
        &self.visibility
    }

    pub fn status(&self) -> IndexStatus {
        *self.status.lock()
    }

    /// Mark the full reindex as done
    pub fn mark_reindexed(&self) {
        let mut status = self.status.lock();
        status.reindex_required = false;
        status.validity = IndexValidity::Populated;
    }

    /// Administrative invalidation: the index must be rebuilt before use
    pub fn invalidate(&self) {
        let mut status = self.status.lock();
        status.validity = IndexValidity::Missing;
        status.reindex_required = true;
        info!("Index at {} invalidated", self.index_path.display());
    }

    /// Append one document; returns the generation assigned to it
    pub fn add_document(&self, doc: Document) -> StorageResult<Generation> {
        let guard = self.writer.read();
        let writer = guard.as_ref().ok_or(StorageError::WriterClosed)?;
        let opstamp = writer.add_document(doc)?;
        self.last_assigned.fetch_max(opstamp, Ordering::AcqRel);
        Ok(opstamp)
    }

    /// Durably commit everything added so far
    pub fn commit(&self) -> StorageResult<Generation> {
        let mut guard = self.writer.write();
        let writer = guard.as_mut().ok_or(StorageError::WriterClosed)?;
        let opstamp = writer.commit()?;
        self.last_assigned.fetch_max(opstamp, Ordering::AcqRel);
        self.last_committed.fetch_max(opstamp, Ordering::AcqRel);
        debug!("Committed index at generation {opstamp}");
        Ok(opstamp)
    }

    /// Reload the reader and publish the last committed generation
    pub fn refresh(&self) -> StorageResult<Generation> {
        let _guard = self.refresh_lock.lock();
        // Read before reloading: the reload sees at least this commit
        let generation = self.last_committed.load(Ordering::Acquire);
        self.reader.reload()?;
        self.visibility.publish(generation);
        Ok(generation)
    }

    /// Commit then refresh, returning the generation now visible
    pub fn commit_and_refresh(&self) -> StorageResult<Generation> {
        self.commit()?;
        self.refresh()
    }

    /// Block until `generation` is visible to new searchers
    pub fn wait_for_generation(
        &self,
        generation: Generation,
        timeout: Option<Duration>,
    ) -> StorageResult<WaitOutcome> {
        let last_assigned = self.last_assigned();
        if generation > last_assigned {
            return Err(StorageError::UnknownGeneration {
                requested: generation,
                last_assigned,
            });
        }
        Ok(self.visibility.wait_for(generation, timeout))
    }

    /// Merge all searchable segments into one; false if nothing to merge
    pub fn force_merge(&self) -> StorageResult<bool> {
        let segment_ids = self.index.searchable_segment_ids()?;
        if segment_ids.len() <= 1 {
            return Ok(false);
        }

        {
            let mut guard = self.writer.write();
            let writer = guard.as_mut().ok_or(StorageError::WriterClosed)?;
            writer.merge(&segment_ids).wait()?;
        }
        self.refresh()?;
        info!(
            "Merged {} segments in {}",
            segment_ids.len(),
            self.index_path.display()
        );
        Ok(true)
    }

    /// Remove every document; validity and format state are untouched
    ///
    /// Deletes by query rather than `delete_all_documents`, which rolls the
    /// writer's opstamp back to the last commit and would reissue generations.
    pub fn clear(&self) -> StorageResult<Generation> {
        {
            let guard = self.writer.read();
            let writer = guard.as_ref().ok_or(StorageError::WriterClosed)?;
            let opstamp = writer.delete_query(Box::new(AllQuery))?;
            self.last_assigned.fetch_max(opstamp, Ordering::AcqRel);
        }
        self.commit_and_refresh()
    }

    /// Close the writer, waiting for background merges; idempotent
    pub fn close_writer(&self) -> StorageResult<()> {
        let writer = self.writer.write().take();
        if let Some(writer) = writer {
            writer.wait_merging_threads()?;
            debug!("Closed index writer for {}", self.index_path.display());
        }
        Ok(())
    }

    pub fn is_writer_open(&self) -> bool {
        self.writer.read().is_some()
    }

    /// Acquire the current searcher snapshot; released on drop
    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    /// Get total number of documents visible to readers
    pub fn document_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn last_assigned(&self) -> Generation {
        self.last_assigned.load(Ordering::Acquire)
    }

    pub fn last_committed(&self) -> Generation {
        self.last_committed.load(Ordering::Acquire)
    }

    pub fn visible_generation(&self) -> Generation {
        self.visibility.current()
    }

    /// Run a query, honoring its generation target, and collapse duplicates
    ///
    /// `headroom_percent` inflates the internal fetch so that dropping
    /// duplicate components still leaves `query.limit` hits when possible.
    /// `default_timeout` bounds `GenerationTarget::At` waits that carry no
    /// timeout of their own.
    pub fn search(
        &self,
        query: &SearchQuery,
        headroom_percent: usize,
        default_timeout: Option<Duration>,
    ) -> SearchResult<SearchResults> {
        // Syntax errors surface before any generation wait
        let built = query.build(&self.index, &self.schema)?;

        let target_reached = match query.target {
            GenerationTarget::NoWait => true,
            GenerationTarget::At(generation) => {
                let timeout = query.wait_timeout.or(default_timeout);
                self.wait_for_generation(generation, timeout)?.is_visible()
            }
            GenerationTarget::Latest => {
                self.refresh()?;
                true
            }
        };

        // Read before acquiring: the snapshot holds at least this generation
        let generation = self.visible_generation();
        let hits = match built {
            Some(built) if query.limit > 0 => {
                self.collect_hits(built.as_ref(), query.limit, headroom_percent)?
            }
            _ => Vec::new(),
        };

        trace!(
            "Query '{}' returned {} hits at generation {generation}",
            query.text,
            hits.len()
        );

        Ok(SearchResults {
            hits,
            generation,
            target_reached,
        })
    }

    fn collect_hits(
        &self,
        query: &dyn Query,
        limit: usize,
        headroom_percent: usize,
    ) -> StorageResult<Vec<SearchHit>> {
        let searcher = self.reader.searcher();
        // Never ask the collector for more slots than there are documents
        let fetch = fetch_limit(limit, headroom_percent)
            .min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX));
        if fetch == 0 {
            return Ok(Vec::new());
        }
        let top_docs = searcher.search(query, &TopDocs::with_limit(fetch))?;

        let mut ranked = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: Document = searcher.doc(doc_address)?;
            let id = doc
                .get_first(self.schema.component_id)
                .and_then(|v| v.as_u64())
                .ok_or(StorageError::InvalidFieldValue {
                    field: COMPONENT_ID.to_string(),
                    reason: "document has no stored component id".to_string(),
                })?;
            ranked.push(SearchHit {
                component_id: ComponentId(id),
                score,
            });
        }

        Ok(collapse(ranked, limit))
    }
}

impl Refresh for DocumentIndex {
    fn refresh(&self) -> Result<Generation, String> {
        DocumentIndex::refresh(self).map_err(|e| e.to_string())
    }
}
