//! Process-scoped document cache invalidated by modification time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CachedEntry {
    modified: SystemTime,
    contents: Arc<str>,
}

/// Cache of document contents keyed by filesystem path.
///
/// Keys are the resolved file locations, not store-relative paths, so one
/// cache can back stores with different roots. An entry is only served while the modification time recorded with it matches
/// the one observed on disk, so editing a template or schema takes effect on the
/// next read without restarting the process.
#[derive(Debug, Default)]
pub struct DocumentCache {
    inner: RwLock<HashMap<PathBuf, CachedEntry>>,
}

impl DocumentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns cached contents when the entry was recorded at `modified`.
    pub async fn get(&self, path: &Path, modified: SystemTime) -> Option<Arc<str>> {
        let guard = self.inner.read().await;
        guard
            .get(path)
            .filter(|entry| entry.modified == modified)
            .map(|entry| Arc::clone(&entry.contents))
    }

    /// Records `contents` for `path` as observed at `modified`.
    pub async fn insert(&self, path: PathBuf, modified: SystemTime, contents: Arc<str>) {
        let mut guard = self.inner.write().await;
        guard.insert(path, CachedEntry { modified, contents });
    }

    /// Drops the entry for `path`, returning `true` if one existed.
    pub async fn invalidate(&self, path: &Path) -> bool {
        self.inner.write().await.remove(path).is_some()
    }

    /// Removes every entry.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Returns the number of cached documents.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
