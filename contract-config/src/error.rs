use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config `{}`: {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid YAML or has unknown keys.
    #[error("failed to parse config `{origin}`: {reason}")]
    Parse {
        /// File path, or `<inline>` for in-memory documents.
        origin: String,
        /// Parser message.
        reason: String,
    },

    /// An environment override could not be parsed.
    #[error("environment variable `{variable}` has invalid value `{value}`: {reason}")]
    Environment {
        /// Variable name.
        variable: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A loaded value is out of range.
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid {
        /// Dotted key of the offending setting.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}
