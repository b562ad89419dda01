//! Core shared types for contract-validated prompt execution.

#![warn(missing_docs, clippy::pedantic)]

mod detail;
mod error;
mod ids;
mod path;

/// Validation outcome types shared by the validator and the orchestrator.
pub use detail::{ErrorDetail, ValidationResult};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier attached to a single execution for tracing.
pub use ids::ExecutionId;
/// Relative, traversal-safe path used to address stored documents.
pub use path::DocumentPath;
