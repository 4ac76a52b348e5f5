use crate::Generation;
use tantivy::TantivyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] TantivyError),

    #[error("Tantivy operation error during {operation}: {cause}")]
    TantivyOperation { operation: String, cause: String },

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index writer is closed")]
    WriterClosed,

    #[error("Generation {requested} was never assigned (last assigned: {last_assigned})")]
    UnknownGeneration {
        requested: Generation,
        last_assigned: Generation,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert() {
        let err: StorageError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked").into();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(err.to_string(), "IO error: locked");
    }
}
