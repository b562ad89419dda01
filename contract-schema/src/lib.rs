//! Schema resolution and contract validation.
//!
//! [`SchemaResolver`] turns a schema reference into a fully dereferenced
//! [`SchemaDocument`]; [`ContractValidator`] checks values against it and
//! reports ordered [`ErrorDetail`](contract_primitives::ErrorDetail)s.

#![warn(missing_docs, clippy::pedantic)]

mod closed;
mod document;
mod error;
mod resolver;
mod validator;

pub use closed::close_object_schemas;
pub use document::{SchemaDocument, unresolved_refs};
pub use error::{SchemaError, SchemaResult};
pub use resolver::{SCHEMA_SUFFIXES, SchemaResolver};
pub use validator::{ContractValidator, ValidationMode};
