use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every recoverable failure the engine can report.
///
/// All of these end up in the status-message sink of the running app; only
/// a failure to open the initial database file is treated as fatal, and that
/// decision is made by the binary, not here.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing table, column or row
    #[error("{0}")]
    DataNotFound(String),

    /// User text that cannot be coerced into the type of the cell it replaces
    #[error("Invalid value: {0}")]
    MalformedEdit(String),

    /// Copy/delete/open failure on a database or snapshot file
    #[error("Storage error on {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reported by the SQL driver, surfaced verbatim
    #[error("{0}")]
    QueryExecution(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::DataNotFound(what.into())
    }

    pub fn storage(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AppError::StorageIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True when the underlying cause is a file that does not exist
    pub fn is_missing_file(&self) -> bool {
        matches!(
            self,
            AppError::StorageIo { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::QueryExecution(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_detection() {
        let err = AppError::storage(
            "/nope/db.sqlite",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_missing_file());
        assert!(err.to_string().contains("/nope/db.sqlite"));

        let err = AppError::not_found("No such table: users");
        assert!(!err.is_missing_file());
        assert_eq!(err.to_string(), "No such table: users");
    }
}
