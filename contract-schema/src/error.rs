//! Error types for schema resolution and validation.

use contract_store::StoreError;
use thiserror::Error;

/// Errors emitted while resolving or compiling schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The top-level schema document does not exist.
    #[error("schema `{reference}` not found")]
    NotFound {
        /// Reference that was requested.
        reference: String,
    },

    /// The schema reference is not a valid relative document path.
    #[error("invalid schema reference `{reference}`: {reason}")]
    InvalidReference {
        /// Reference that was requested.
        reference: String,
        /// Why the reference was rejected.
        reason: String,
    },

    /// A schema document could not be parsed.
    #[error("failed to parse schema `{path}`: {reason}")]
    Parse {
        /// Document that failed to parse.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// A schema document parsed to something other than an object.
    #[error("schema `{path}` is not an object")]
    NotAnObject {
        /// Offending document.
        path: String,
    },

    /// `$ref` expansion could not complete.
    #[error("failed to dereference `{path}`: {reason}")]
    Resolution {
        /// Document being dereferenced when the failure occurred.
        path: String,
        /// Missing target, unsupported scheme, or cycle description.
        reason: String,
    },

    /// The dereferenced document is not a usable JSON Schema.
    #[error("invalid schema `{path}`: {reason}")]
    InvalidSchema {
        /// Schema that failed to compile.
        path: String,
        /// Compiler message.
        reason: String,
    },

    /// Storage failure other than a missing document.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchemaError {
    pub(crate) fn resolution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
