//! Error types for ledger, registry and catalog operations

use std::fmt::Display;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for every public operation in the crate
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur while reading or writing the classroom ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Unknown student or rule on read or mutate
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// Registering an id or name that already exists
    #[error("{what} already exists: {key}")]
    Duplicate { what: &'static str, key: String },

    /// Unusable input (empty id, non-integer value, bad timestamp)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Underlying file missing, unreadable or unwritable
    #[error("Storage unavailable at {}: {reason}", path.display())]
    StorageUnavailable { path: PathBuf, reason: String },
}

impl LedgerError {
    pub fn student_not_found(id: &str) -> Self {
        LedgerError::NotFound {
            what: "student",
            key: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::Duplicate { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, LedgerError::StorageUnavailable { .. })
    }
}

/// Build a `map_err` adapter that tags a low-level failure with the file it hit.
pub(crate) fn storage_err<E: Display>(path: &Path) -> impl FnOnce(E) -> LedgerError + '_ {
    move |e| LedgerError::StorageUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Log storage failures at the operation boundary and pass the result through.
pub(crate) fn logged<T>(operation: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
    if let Err(e) = &result {
        if e.is_storage() {
            tracing::warn!(operation, error = %e, "storage failure");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LedgerError::student_not_found("S001");
        assert_eq!(err.to_string(), "student not found: S001");
        assert!(err.is_not_found());

        let err = LedgerError::Duplicate {
            what: "score rule",
            key: "做操".to_string(),
        };
        assert_eq!(err.to_string(), "score rule already exists: 做操");
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_storage_err_keeps_path() {
        let path = Path::new("data/students.csv");
        let err = storage_err(path)("permission denied");
        assert!(err.is_storage());
        assert_eq!(
            err.to_string(),
            "Storage unavailable at data/students.csv: permission denied"
        );
    }
}
