//! Template lookup by id.

use std::sync::Arc;

use contract_primitives::DocumentPath;
use contract_store::{DocumentStore, StoreError, StoredDocument};
use tracing::{debug, instrument};

use crate::error::{TemplateError, TemplateResult};
use crate::template::TemplateDocument;

/// File extension appended to template ids that do not already carry one.
pub const DEFAULT_TEMPLATE_EXTENSION: &str = "prompt.hbs";

/// Loads template documents from a [`DocumentStore`].
#[derive(Clone)]
pub struct TemplateResolver {
    store: Arc<dyn DocumentStore>,
    extension: String,
}

impl TemplateResolver {
    /// Creates a resolver using [`DEFAULT_TEMPLATE_EXTENSION`].
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            extension: DEFAULT_TEMPLATE_EXTENSION.to_owned(),
        }
    }

    /// Overrides the template file extension (without a leading dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_owned();
        self
    }

    /// Returns the configured template extension.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Loads and parses the template identified by `template_id`.
    ///
    /// The id is tried with the template extension appended first, then as a
    /// literal path. Ids that are empty or escape the template root are
    /// reported as not found.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] when no document matches,
    /// [`TemplateError::FrontMatter`] when the front matter is malformed, and
    /// [`TemplateError::Store`] for other storage failures.
    #[instrument(skip(self))]
    pub async fn resolve(&self, template_id: &str) -> TemplateResult<TemplateDocument> {
        let not_found = || TemplateError::NotFound {
            template_id: template_id.to_owned(),
        };
        let literal = DocumentPath::new(template_id).map_err(|_| not_found())?;

        let mut candidates = Vec::with_capacity(2);
        if !literal.has_extension(&self.extension) {
            if let Ok(extended) = DocumentPath::new(format!("{literal}.{}", self.extension)) {
                candidates.push(extended);
            }
        }
        candidates.push(literal);

        for candidate in candidates {
            match self.store.read(&candidate).await {
                Ok(document) => {
                    debug!(path = %candidate, "template loaded");
                    return TemplateDocument::parse(
                        template_id,
                        document.path().clone(),
                        document.contents(),
                    );
                }
                Err(StoreError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        Err(not_found())
    }

    /// Reads a document referenced from template metadata, such as an
    /// example input, relative to the template root.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::AttachmentNotFound`] when the path is invalid
    /// or missing, and [`TemplateError::Store`] for other storage failures.
    pub async fn read_attachment(&self, relative: &str) -> TemplateResult<StoredDocument> {
        let missing = || TemplateError::AttachmentNotFound {
            path: relative.to_owned(),
        };
        let path = DocumentPath::new(relative).map_err(|_| missing())?;
        match self.store.read(&path).await {
            Ok(document) => Ok(document),
            Err(StoreError::NotFound { .. }) => Err(missing()),
            Err(err) => Err(err.into()),
        }
    }

    /// Lists the ids of every template in the store, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Store`] if the store cannot be listed.
    pub async fn discover(&self) -> TemplateResult<Vec<String>> {
        let suffix = format!(".{}", self.extension);
        let paths = self.store.list(&[suffix.as_str()]).await?;
        Ok(paths
            .iter()
            .filter_map(|path| path.as_str().strip_suffix(&suffix).map(str::to_owned))
            .collect())
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}
