//! Validation outcome types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single contract violation found while validating a value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// JSON pointer into the validated value (`""` for the root).
    pub path: String,
    /// Human-readable description of the violation.
    pub message: String,
    /// Schema keyword that produced the violation (`type`, `required`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

impl ErrorDetail {
    /// Creates a new error detail.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            keyword: None,
        }
    }

    /// Records the schema keyword responsible for the violation.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Returns `true` when this detail points at `pointer` or a location below it.
    #[must_use]
    pub fn is_at_or_below(&self, pointer: &str) -> bool {
        self.path == pointer
            || self
                .path
                .strip_prefix(pointer)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.message)
    }
}

/// Result of validating a value against a schema.
///
/// `valid` is `true` exactly when `errors` is empty. Errors keep the order in
/// which the validator reported them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    valid: bool,
    errors: Vec<ErrorDetail>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::passed()
    }
}

impl ValidationResult {
    /// Result describing a value with no violations.
    #[must_use]
    pub fn passed() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Builds a result from an ordered list of violations.
    #[must_use]
    pub fn from_errors(errors: Vec<ErrorDetail>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Returns `true` if the value satisfied the schema.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the ordered violations.
    #[must_use]
    pub fn errors(&self) -> &[ErrorDetail] {
        &self.errors
    }

    /// Consumes the result, returning the violations.
    #[must_use]
    pub fn into_errors(self) -> Vec<ErrorDetail> {
        self.errors
    }
}
