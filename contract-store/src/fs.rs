//! Filesystem-backed document store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use contract_primitives::DocumentPath;
use tokio::fs;
use tracing::{debug, trace};

use crate::{DocumentCache, DocumentStore, StoreError, StoreResult, StoredDocument};

/// Store that reads documents from a directory tree.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    cache: Option<Arc<DocumentCache>>,
}

impl FsStore {
    /// Creates a store rooted at `root` that reads from disk on every call.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: None,
        }
    }

    /// Attaches a shared document cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<DocumentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the attached cache, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<DocumentCache>> {
        self.cache.as_ref()
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn read(&self, path: &DocumentPath) -> StoreResult<StoredDocument> {
        let full = path.under(&self.root);
        let metadata = match fs::metadata(&full).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(StoreError::NotFound { path: path.clone() }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { path: path.clone() });
            }
            Err(source) => return Err(io_error(path.as_str(), source)),
        };

        let modified = metadata.modified().ok();
        if let (Some(cache), Some(modified)) = (&self.cache, modified) {
            if let Some(contents) = cache.get(&full, modified).await {
                trace!(path = %path, "document served from cache");
                return Ok(StoredDocument::new(path.clone(), contents));
            }
        }

        let contents: Arc<str> = fs::read_to_string(&full)
            .await
            .map_err(|source| io_error(path.as_str(), source))?
            .into();
        debug!(path = %path, bytes = contents.len(), "document loaded");

        if let (Some(cache), Some(modified)) = (&self.cache, modified) {
            cache.insert(full, modified, Arc::clone(&contents)).await;
        }

        Ok(StoredDocument::new(path.clone(), contents))
    }

    async fn list(&self, suffixes: &[&str]) -> StoreResult<Vec<DocumentPath>> {
        let mut found = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(relative) = pending.pop() {
            let dir = if relative.is_empty() {
                self.root.clone()
            } else {
                self.root.join(&relative)
            };
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound && relative.is_empty() => {
                    return Ok(Vec::new());
                }
                Err(source) => return Err(io_error(&relative, source)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|source| io_error(&relative, source))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = if relative.is_empty() {
                    name.clone()
                } else {
                    format!("{relative}/{name}")
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|source| io_error(&child, source))?;

                if file_type.is_dir() {
                    pending.push(child);
                } else if suffixes.iter().any(|suffix| name.ends_with(suffix)) {
                    if let Ok(path) = DocumentPath::new(&child) {
                        found.push(path);
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

fn io_error(path: &str, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_owned(),
        source,
    }
}
