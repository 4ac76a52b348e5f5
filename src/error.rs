//! Error types for the terminology index
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::ComponentId;
use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// Index directory errors
    #[error("Failed to prepare index directory '{path}': {source}")]
    DirectoryError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open index at '{path}': {source}")]
    OpenError {
        path: PathBuf,
        source: Box<StorageError>,
    },

    /// Record source errors
    #[error("Failed to fetch component {id}: {reason}")]
    RecordFetch { id: ComponentId, reason: String },

    #[error("Failed to read records from '{path}': {reason}")]
    RecordSource { path: PathBuf, reason: String },

    /// Job errors
    #[error("Indexing job for component {id} failed: {cause}")]
    JobFailed { id: ComponentId, cause: String },

    #[error("Indexing job panicked: {reason}")]
    JobPanicked { reason: String },

    #[error("Worker pool is shut down; no further jobs are accepted")]
    PoolShutDown,

    #[error("Index service is shut down")]
    ServiceShutDown,

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    /// Storage layer errors
    #[error("Storage operation failed during {operation}: {source}")]
    Storage {
        operation: String,
        source: StorageError,
    },

    /// Corrupted index error
    #[error("Index appears to be corrupted: {reason}")]
    IndexCorrupted { reason: String },

    /// General errors for cases where we need to preserve existing behavior
    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Wrap a storage error with the name of the operation that produced it.
    pub fn storage(operation: impl Into<String>, source: StorageError) -> Self {
        Self::Storage {
            operation: operation.into(),
            source,
        }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::DirectoryError { .. } => "DIRECTORY_ERROR",
            Self::OpenError { .. } => "OPEN_ERROR",
            Self::RecordFetch { .. } => "RECORD_FETCH_ERROR",
            Self::RecordSource { .. } => "RECORD_SOURCE_ERROR",
            Self::JobFailed { .. } => "JOB_FAILED",
            Self::JobPanicked { .. } => "JOB_PANICKED",
            Self::PoolShutDown => "POOL_SHUT_DOWN",
            Self::ServiceShutDown => "SERVICE_SHUT_DOWN",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::IndexCorrupted { .. } => "INDEX_CORRUPTED",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::DirectoryError { .. } | Self::OpenError { .. } => vec![
                "Check disk space and permissions in the search data folder",
                "Make sure no other process holds the index writer lock",
            ],
            Self::Storage { .. } => vec![
                "Run 'termindex reindex' to rebuild the index",
                "Check disk space and permissions in the index directory",
            ],
            Self::IndexCorrupted { .. } => vec![
                "Run 'termindex reindex' to rebuild from scratch",
                "Check for disk errors or filesystem corruption",
            ],
            Self::RecordSource { .. } => vec![
                "Check that the records file exists and holds one JSON component per line",
            ],
            Self::PoolShutDown | Self::ServiceShutDown => {
                vec!["The index service was stopped; open a new one to continue"]
            }
            _ => vec![],
        }
    }
}

/// Errors surfaced to query callers
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query syntax in '{query}': {reason}")]
    QuerySyntax { query: String, reason: String },

    #[error("Search backend failure: {0}")]
    Backend(#[source] StorageError),

    #[error("Generation {requested} was never assigned (last assigned: {last_assigned})")]
    UnknownGeneration { requested: u64, last_assigned: u64 },
}

impl From<StorageError> for SearchError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::UnknownGeneration {
                requested,
                last_assigned,
            } => Self::UnknownGeneration {
                requested,
                last_assigned,
            },
            other => Self::Backend(other),
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T, IndexError>;
}

impl<T> ErrorContext<T> for Result<T, StorageError> {
    fn context(self, msg: &str) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::storage(msg, e))
    }
}
