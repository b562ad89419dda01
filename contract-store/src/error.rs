//! Error types for document storage.

use contract_primitives::DocumentPath;
use thiserror::Error;

/// Errors emitted by document stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists at the requested path.
    #[error("document `{path}` not found")]
    NotFound {
        /// Path that was requested.
        path: DocumentPath,
    },
    /// Underlying I/O failure while reading a document or walking the root.
    #[error("i/o error reading `{path}`: {source}")]
    Io {
        /// Path (or root-relative directory) being accessed.
        path: String,
        /// Source [`std::io::Error`].
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Returns `true` when the error means the document does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
