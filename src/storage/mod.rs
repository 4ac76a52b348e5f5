//! Storage layer: the tantivy index, its on-disk lifecycle and queries

pub mod analysis;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod reopen;
pub mod schema;
pub mod tantivy;

pub use analysis::{Analysis, STANDARD_ANALYZER, WHITESPACE_ANALYZER, WHITESPACE_SUFFIX};
pub use error::{StorageError, StorageResult};
pub use lifecycle::IndexStatus;
pub use query::{QueryMode, SearchQuery};
pub use reopen::{ReopenCadence, ReopenThread, Visibility};
pub use schema::IndexSchema;
pub use tantivy::DocumentIndex;
