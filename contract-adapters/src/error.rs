//! Failures reported by model adapters.

use std::time::Duration;

use thiserror::Error;

/// Result alias for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Why a provider could not produce a completion.
///
/// The orchestrator maps `UnsupportedProvider` to a bad request,
/// `Configuration` to a server misconfiguration and everything else to an
/// upstream error.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The requested `llmProvider` has no registered factory.
    #[error("unsupported llmProvider `{provider}`")]
    UnsupportedProvider {
        /// Name the caller asked for.
        provider: String,
    },

    /// Credentials or endpoint settings are missing or unusable.
    #[error("provider misconfigured: {reason}")]
    Configuration {
        /// What is wrong with the settings.
        reason: String,
    },

    /// The request could not be encoded for the provider.
    #[error("request rejected before sending: {reason}")]
    InvalidRequest {
        /// Encoding or shape problem.
        reason: String,
    },

    /// Connecting, sending or reading failed.
    #[error("provider unreachable: {reason}")]
    Transport {
        /// Underlying I/O or protocol failure.
        reason: String,
    },

    /// The adapter's own HTTP deadline passed.
    #[error("no completion within {elapsed:?}")]
    Timeout {
        /// Deadline that expired.
        elapsed: Duration,
    },

    /// HTTP 429 from the provider.
    #[error("provider throttled the call (retry after {retry_after:?})")]
    RateLimited {
        /// Delay advertised through `Retry-After`, when present.
        retry_after: Option<Duration>,
    },

    /// The provider answered, but not with a usable completion.
    #[error("unusable provider reply: {reason}")]
    Response {
        /// Status, refusal or decoding detail.
        reason: String,
    },
}

impl AdapterError {
    /// Builds [`AdapterError::Configuration`].
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Builds [`AdapterError::InvalidRequest`].
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Builds [`AdapterError::Transport`].
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Builds [`AdapterError::Response`].
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}
