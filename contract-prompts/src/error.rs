//! Error types for template loading and rendering.

use contract_store::StoreError;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// No template exists for the requested id, or the id escapes the root.
    #[error("template `{template_id}` not found")]
    NotFound {
        /// Requested template id.
        template_id: String,
    },

    /// A document referenced from template metadata does not exist.
    #[error("template attachment `{path}` not found")]
    AttachmentNotFound {
        /// Path as written in the metadata.
        path: String,
    },

    /// The front-matter block is malformed.
    #[error("invalid front matter in `{template_id}`: {reason}")]
    FrontMatter {
        /// Template whose metadata failed to parse.
        template_id: String,
        /// Parser message.
        reason: String,
    },

    /// The template body is not valid Handlebars.
    #[error("template `{template_id}` failed to compile: {reason}")]
    Compile {
        /// Template that failed to compile.
        template_id: String,
        /// Compiler message.
        reason: String,
    },

    /// Rendering failed, typically because a referenced variable is missing.
    #[error("template `{template_id}` failed to render: {reason}")]
    Render {
        /// Template that failed to render.
        template_id: String,
        /// Renderer message.
        reason: String,
    },

    /// Storage failure other than a missing document.
    #[error(transparent)]
    Store(#[from] StoreError),
}
