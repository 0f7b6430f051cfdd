//! Error types for graph search and storage.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors surfaced by graph storage adapters.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem failure while reading or writing dataset files.
    Io(io::Error),
    /// A dataset file failed its checksum or could not be decoded.
    Corrupted { path: PathBuf, detail: String },
    /// Loaded tables violate a structural invariant (dense ids, aligned docs).
    Misaligned(String),
    /// Document fetch past the end of the docs table.
    RowOutOfRange { row: u32, count: u64 },
    /// Backend-specific failure.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "dataset io error: {}", e),
            StoreError::Corrupted { path, detail } => {
                write!(f, "dataset file '{}' is corrupted: {}", path.display(), detail)
            }
            StoreError::Misaligned(msg) => write!(f, "dataset tables misaligned: {}", msg),
            StoreError::RowOutOfRange { row, count } => {
                write!(f, "document row {} out of range (docs table has {} rows)", row, count)
            }
            StoreError::Backend(msg) => write!(f, "storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Errors surfaced by the search engine and query sessions.
#[derive(Debug)]
pub enum SearchError {
    /// Query and stored vectors disagree on dimensionality.
    DimensionMismatch { expected: usize, actual: usize },
    /// A stored vector's encoding does not match the engine's distance strategy.
    VectorEncoding {
        expected: &'static str,
        found: &'static str,
    },
    /// A parameter is outside its documented domain.
    InvalidParameter(String),
    /// The query encoder failed to produce a vector.
    Embedding(String),
    /// Graph storage failure.
    Store(StoreError),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {}, got {}", expected, actual)
            }
            SearchError::VectorEncoding { expected, found } => {
                write!(f, "vector encoding mismatch: expected {}, found {}", expected, found)
            }
            SearchError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            SearchError::Embedding(msg) => write!(f, "query encoding failed: {}", msg),
            SearchError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SearchError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for SearchError {
    fn from(e: StoreError) -> Self {
        SearchError::Store(e)
    }
}

/// Convenience alias for results carrying a [`SearchError`].
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = SearchError::DimensionMismatch {
            expected: 384,
            actual: 512,
        };
        assert_eq!(e.to_string(), "dimension mismatch: expected 384, got 512");

        let e = StoreError::RowOutOfRange { row: 9, count: 3 };
        assert!(e.to_string().contains("row 9"));
        assert!(e.to_string().contains("3 rows"));
    }

    #[test]
    fn test_store_error_wraps_into_search_error() {
        let store_err = StoreError::Backend("socket closed".to_string());
        let search_err = SearchError::from(store_err);
        assert!(matches!(search_err, SearchError::Store(_)));
        assert!(search_err.to_string().contains("socket closed"));
    }

    #[test]
    fn test_io_error_source_is_preserved() {
        use std::error::Error;
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let e = StoreError::from(io_err);
        assert!(e.source().is_some());
    }
}
