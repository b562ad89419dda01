//! Document storage for templates and schemas.
//!
//! Documents are addressed by [`DocumentPath`](contract_primitives::DocumentPath)
//! relative to a storage root. Reads go to the backing store on every call
//! unless a [`DocumentCache`] has been injected, in which case a document is
//! re-read only when its modification time changes.

#![warn(missing_docs, clippy::pedantic)]

mod cache;
mod error;
mod fs;

pub use cache::DocumentCache;
pub use error::{StoreError, StoreResult};
pub use fs::FsStore;

use std::sync::Arc;

use async_trait::async_trait;
use contract_primitives::DocumentPath;

/// A document read from storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDocument {
    path: DocumentPath,
    contents: Arc<str>,
}

impl StoredDocument {
    /// Creates a document from its path and contents.
    #[must_use]
    pub fn new(path: DocumentPath, contents: impl Into<Arc<str>>) -> Self {
        Self {
            path,
            contents: contents.into(),
        }
    }

    /// Returns the path the document was read from.
    #[must_use]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Returns the raw document text.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// Read-only access to documents below a storage root.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the document at `path`.
    async fn read(&self, path: &DocumentPath) -> StoreResult<StoredDocument>;

    /// Lists every document whose file name ends with one of `suffixes`,
    /// sorted by path.
    async fn list(&self, suffixes: &[&str]) -> StoreResult<Vec<DocumentPath>>;
}
