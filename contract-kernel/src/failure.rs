//! Failure taxonomy for contract executions.

use std::fmt;

use contract_primitives::ErrorDetail;
use serde::Serialize;

/// Category of an execution failure.
///
/// The category decides the HTTP status: caller errors map to 4xx so the
/// caller knows a different request could succeed, everything else to 500.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Malformed request, failed input validation or unsupported provider.
    BadRequest,
    /// The requested template does not exist.
    NotFound,
    /// Template metadata or referenced schemas are missing or broken.
    ServerMisconfiguration,
    /// The template failed to compile or render.
    TemplateRenderError,
    /// The model call failed or timed out.
    UpstreamError,
    /// The model output violated the declared output schema.
    UpstreamContractViolation,
}

impl FailureKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::ServerMisconfiguration => "SERVER_MISCONFIGURATION",
            Self::TemplateRenderError => "TEMPLATE_RENDER_ERROR",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::UpstreamContractViolation => "UPSTREAM_CONTRACT_VIOLATION",
        }
    }

    /// HTTP status code reported for this kind.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            _ => 500,
        }
    }

    /// Returns `true` when resubmitting a different request could succeed.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::BadRequest | Self::NotFound)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A failed execution, ready to be rendered as a structured response.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExecutionFailure {
    kind: FailureKind,
    message: String,
    errors: Vec<ErrorDetail>,
}

impl ExecutionFailure {
    /// Creates a failure of `kind` with `message`.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Attaches ordered validation details.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorDetail>) -> Self {
        self.errors = errors;
        self
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(FailureKind::BadRequest, message)
    }

    pub(crate) fn misconfigured(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ServerMisconfiguration, message)
    }

    pub(crate) fn upstream(message: impl Into<String>) -> Self {
        Self::new(FailureKind::UpstreamError, message)
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns validation details in validator order; empty when not applicable.
    #[must_use]
    pub fn errors(&self) -> &[ErrorDetail] {
        &self.errors
    }

    /// HTTP status code for this failure.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind.status()
    }
}
