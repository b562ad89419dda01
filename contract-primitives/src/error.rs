//! Shared error definitions for contract primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the primitives crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided execution identifier could not be parsed.
    #[error("invalid execution id: {source}")]
    InvalidExecutionId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Document path failed validation.
    #[error("invalid document path `{path}`: {reason}")]
    InvalidDocumentPath {
        /// The offending path string.
        path: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
