//! Generation-consistent full-text indexing for versioned terminology graphs
//!
//! A tantivy index kept in step with a commit-driven write stream. Writers
//! learn the generation their record landed at; readers can wait for that
//! generation before they search.

pub mod config;
pub mod error;
pub mod graph;
pub mod indexing;
pub mod logging;
pub mod service;
pub mod storage;
pub mod types;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{IndexError, IndexResult, SearchError, SearchResult};
pub use graph::{
    CommitFeed, CommitListener, CommitRecord, Component, ComponentKind, ComponentSource,
    JsonlComponentStore, TagResolver,
};
pub use indexing::{CommitReport, IndexStats, IndexingHandle};
pub use service::IndexService;
pub use storage::{DocumentIndex, SearchQuery, StorageError, StorageResult};
pub use types::{
    ComponentId, Generation, GenerationTarget, IndexOutcome, IndexValidity, SearchHit,
    SearchResults, WaitOutcome,
};
