//! Index directory lifecycle
//!
//! Classifies the on-disk directory at startup, opens (or creates) the
//! tantivy index and its writer, and rebuilds the directory from scratch when
//! the files on disk are in a format this build cannot read.

use super::analysis::register_analyzers;
use super::schema::IndexSchema;
use super::StorageError;
use crate::{IndexError, IndexResult, IndexValidity};
use std::path::{Path, PathBuf};
use tantivy::{Index, IndexWriter, TantivyDocument as Document, TantivyError};
use tracing::{debug, info, warn};

const META_FILE: &str = "meta.json";

/// Validity plus whether a full reindex must run before the index is usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStatus {
    pub validity: IndexValidity,
    pub reindex_required: bool,
}

/// A freshly opened index with its writer, after the bootstrap commit
pub struct OpenedIndex {
    pub index: Index,
    pub writer: IndexWriter<Document>,
    pub schema: IndexSchema,
    pub path: PathBuf,
    pub status: IndexStatus,
    /// Opstamp of the bootstrap commit
    pub generation: u64,
}

impl std::fmt::Debug for OpenedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedIndex")
            .field("path", &self.path)
            .field("status", &self.status)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Why an open attempt failed
enum OpenFailure {
    /// Files exist but cannot be read by this build; rebuild locally
    Incompatible(String),
    /// Anything else; not recoverable here
    Fatal(StorageError),
}

impl From<TantivyError> for OpenFailure {
    fn from(error: TantivyError) -> Self {
        if is_format_error(&error) {
            OpenFailure::Incompatible(error.to_string())
        } else {
            OpenFailure::Fatal(StorageError::Tantivy(error))
        }
    }
}

/// True for tantivy errors that mean "written by a different format"
pub fn is_format_error(error: &TantivyError) -> bool {
    matches!(
        error,
        TantivyError::IncompatibleIndex(_)
            | TantivyError::DataCorruption(_)
            | TantivyError::SchemaError(_)
    )
}

/// Classify a directory, creating it when absent
pub fn classify(path: &Path) -> IndexResult<IndexValidity> {
    let dir_error = |source| IndexError::DirectoryError {
        path: path.to_path_buf(),
        source,
    };

    if !path.exists() {
        std::fs::create_dir_all(path).map_err(dir_error)?;
        return Ok(IndexValidity::Missing);
    }

    let mut entries = std::fs::read_dir(path).map_err(dir_error)?;
    if entries.next().is_none() {
        Ok(IndexValidity::Missing)
    } else {
        Ok(IndexValidity::Populated)
    }
}

/// Open the index at `path`, recovering from an unreadable format
///
/// On return the writer is open and one commit has been made, so a reader
/// can always be created, even over a brand-new empty index.
pub fn open(path: impl AsRef<Path>, heap_bytes: usize) -> IndexResult<OpenedIndex> {
    let path = path.as_ref().to_path_buf();
    let mut validity = classify(&path)?;
    let mut reindex_required = false;

    let (index, writer) = match try_open(&path, heap_bytes) {
        Ok(opened) => opened,
        Err(OpenFailure::Incompatible(reason)) => {
            warn!(
                "Index at {} is in an unreadable format ({reason}); deleting it and rebuilding",
                path.display()
            );
            validity = IndexValidity::FormatIncompatible;
            reindex_required = true;

            wipe_directory(&path).map_err(|source| IndexError::DirectoryError {
                path: path.clone(),
                source,
            })?;

            match try_open(&path, heap_bytes) {
                Ok(opened) => opened,
                Err(OpenFailure::Incompatible(reason)) => {
                    return Err(IndexError::IndexCorrupted {
                        reason: format!("freshly created index is unreadable: {reason}"),
                    });
                }
                Err(OpenFailure::Fatal(source)) => {
                    return Err(IndexError::OpenError {
                        path,
                        source: Box::new(source),
                    });
                }
            }
        }
        Err(OpenFailure::Fatal(source)) => {
            return Err(IndexError::OpenError {
                path,
                source: Box::new(source),
            });
        }
    };

    let mut writer = writer;
    // An index with zero commits cannot be opened by a reader
    let generation = writer.commit().map_err(|e| IndexError::OpenError {
        path: path.clone(),
        source: Box::new(StorageError::Tantivy(e)),
    })?;

    let (_, schema) = IndexSchema::build();
    debug!(
        "Opened index at {} (validity: {validity}, generation: {generation})",
        path.display()
    );

    Ok(OpenedIndex {
        index,
        writer,
        schema,
        path,
        status: IndexStatus {
            validity,
            reindex_required,
        },
        generation,
    })
}

fn try_open(path: &Path, heap_bytes: usize) -> Result<(Index, IndexWriter<Document>), OpenFailure> {
    let (schema, _) = IndexSchema::build();

    let index = if path.join(META_FILE).exists() {
        let index = Index::open_in_dir(path)?;
        if let Some(reason) = IndexSchema::incompatibility(&index.schema()) {
            return Err(OpenFailure::Incompatible(format!("schema mismatch: {reason}")));
        }
        index
    } else if directory_has_entries(path).map_err(|e| OpenFailure::Fatal(e.into()))? {
        return Err(OpenFailure::Incompatible(format!(
            "no {META_FILE} among existing files"
        )));
    } else {
        Index::create_in_dir(path, schema)?
    };

    register_analyzers(&index);
    let writer = index.writer::<Document>(heap_bytes)?;
    Ok((index, writer))
}

fn directory_has_entries(path: &Path) -> std::io::Result<bool> {
    Ok(std::fs::read_dir(path)?.next().is_some())
}

/// Remove the directory and everything in it, then recreate it empty
pub fn wipe_directory(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        let mut attempts = 0;
        const MAX_ATTEMPTS: u32 = 3;

        loop {
            match std::fs::remove_dir_all(path) {
                Ok(()) => break,
                Err(e) if attempts < MAX_ATTEMPTS => {
                    attempts += 1;
                    // File handles may linger briefly on some platforms
                    warn!(
                        "Attempt {attempts}/{MAX_ATTEMPTS}: Failed to remove {} ({e}), retrying...",
                        path.display()
                    );
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
                Err(e) => return Err(e),
            }
        }
    }
    std::fs::create_dir_all(path)?;
    info!("Recreated empty index directory {}", path.display());
    Ok(())
}
