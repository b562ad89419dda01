//! Prompt templates with schema-bearing front matter.
//!
//! A template document is a YAML front-matter block naming its input and
//! output schemas, followed by a Handlebars body. [`TemplateResolver`] loads
//! documents by id and [`TemplateDocument::compile`] produces a strict
//! [`CompiledTemplate`] renderer.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod helpers;
mod metadata;
mod resolver;
mod template;

pub use error::{TemplateError, TemplateResult};
pub use metadata::{TemplateMetadata, split_front_matter};
pub use resolver::{DEFAULT_TEMPLATE_EXTENSION, TemplateResolver};
pub use template::{CompiledTemplate, TemplateDocument};
