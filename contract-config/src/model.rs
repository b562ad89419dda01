//! Configuration structures.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use contract_schema::ValidationMode;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level service configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Root directory of prompt templates.
    pub templates_dir: PathBuf,
    /// Root directory of schema documents.
    pub schemas_dir: PathBuf,
    /// Suffix appended to template ids, without a leading dot.
    pub template_extension: String,
    /// How request input is validated.
    pub input_validation: ValidationMode,
    /// How model output is validated.
    pub output_validation: ValidationMode,
    /// Limit on a single model call, in seconds.
    pub model_timeout_secs: u64,
    /// Document cache settings.
    pub cache: CacheConfig,
    /// Model provider settings.
    pub providers: ProvidersConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub log: LogConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            schemas_dir: PathBuf::from("schemas"),
            template_extension: "prompt.hbs".to_owned(),
            input_validation: ValidationMode::Closed,
            output_validation: ValidationMode::Closed,
            model_timeout_secs: 60,
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
            server: ServerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Model call limit as a [`Duration`].
    #[must_use]
    pub const fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    /// Checks values that deserialise but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.templates_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("templates_dir", "must not be empty"));
        }
        if self.schemas_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("schemas_dir", "must not be empty"));
        }
        if self.template_extension.trim_start_matches('.').trim().is_empty() {
            return Err(ConfigError::invalid("template_extension", "must not be empty"));
        }
        if self.model_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "model_timeout_secs",
                "must be greater than zero",
            ));
        }
        if let Some(temperature) = self.providers.openai.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::invalid(
                    "providers.openai.temperature",
                    format!("{temperature} is outside 0.0..=2.0"),
                ));
            }
        }
        if self.providers.openai.api_key_env.trim().is_empty() {
            return Err(ConfigError::invalid(
                "providers.openai.api_key_env",
                "must name an environment variable",
            ));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::invalid("server.bind", "must not be empty"));
        }
        Ok(())
    }
}

/// Document cache settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Serve unchanged documents from memory, re-reading on modification.
    pub enabled: bool,
}

/// Settings for each supported model provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvidersConfig {
    /// `OpenAI` chat completions.
    pub openai: OpenAiSettings,
}

/// `OpenAI` provider settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiSettings {
    /// Alternative API base URL.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature applied when a request sets none.
    pub temperature: Option<f32>,
    /// Ask the provider to enforce the output schema strictly.
    pub strict_schema: bool,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_owned(),
            temperature: None,
            strict_schema: false,
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_owned(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}` (expected text or json)")),
        }
    }
}
