//! Service configuration for prompt contracts.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `PROMPT_CONTRACTS_*` environment variables. Command-line flags are applied
//! by the binary on top of the result.

#![warn(missing_docs, clippy::pedantic)]

mod env;
mod error;
mod model;

pub use env::ENV_PREFIX;
pub use error::{ConfigError, ConfigResult};
pub use model::{
    CacheConfig, LogConfig, LogFormat, OpenAiSettings, ProvidersConfig, ServerConfig, ServiceConfig,
};

use std::path::Path;

use tracing::info;

impl ServiceConfig {
    /// Parses a YAML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML, unknown keys or
    /// unknown enum values.
    pub fn from_yaml_str(contents: &str) -> ConfigResult<Self> {
        parse_yaml("<inline>", contents)
    }

    /// Reads and parses the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is malformed.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        parse_yaml(&path.display().to_string(), &contents)
    }

    /// Applies `PROMPT_CONTRACTS_*` overrides obtained through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Environment`] for values that do not parse.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        env::apply(self, &lookup)
    }

    /// Loads defaults, the optional file and the process environment, then
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Propagates read, parse, environment and validation errors.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        info!(
            source = %path.map_or_else(|| "defaults".to_owned(), |p| p.display().to_string()),
            templates_dir = %config.templates_dir.display(),
            schemas_dir = %config.schemas_dir.display(),
            input_validation = %config.input_validation,
            output_validation = %config.output_validation,
            "configuration loaded"
        );
        Ok(config)
    }
}

fn parse_yaml(origin: &str, contents: &str) -> ConfigResult<ServiceConfig> {
    if contents.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }
    serde_yaml::from_str(contents).map_err(|err| ConfigError::Parse {
        origin: origin.to_owned(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use contract_schema::ValidationMode;

    use super::*;

    #[test]
    fn defaults_are_closed_and_local() {
        let config = ServiceConfig::default();
        assert_eq!(config.templates_dir, PathBuf::from("templates"));
        assert_eq!(config.template_extension, "prompt.hbs");
        assert_eq!(config.input_validation, ValidationMode::Closed);
        assert_eq!(config.output_validation, ValidationMode::Closed);
        assert_eq!(config.model_timeout(), Duration::from_secs(60));
        assert!(!config.cache.enabled);
        assert_eq!(config.providers.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.log.format, LogFormat::Text);
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = ServiceConfig::from_yaml_str(
            "templates_dir: prompts\noutput_validation: open\ncache:\n  enabled: true\nproviders:\n  openai:\n    strict_schema: true\n",
        )
        .unwrap();
        assert_eq!(config.templates_dir, PathBuf::from("prompts"));
        assert_eq!(config.schemas_dir, PathBuf::from("schemas"));
        assert_eq!(config.output_validation, ValidationMode::Open);
        assert_eq!(config.input_validation, ValidationMode::Closed);
        assert!(config.cache.enabled);
        assert!(config.providers.openai.strict_schema);
        assert_eq!(config.providers.openai.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(
            ServiceConfig::from_yaml_str("  \n").unwrap(),
            ServiceConfig::default()
        );
    }

    #[test]
    fn unknown_keys_and_modes_are_rejected() {
        let err = ServiceConfig::from_yaml_str("template_dir: x\n").expect_err("typo");
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = ServiceConfig::from_yaml_str("input_validation: strict\n").expect_err("mode");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let zero = ServiceConfig {
            model_timeout_secs: 0,
            ..ServiceConfig::default()
        };
        assert!(matches!(
            zero.validate().expect_err("zero timeout"),
            ConfigError::Invalid { key: "model_timeout_secs", .. }
        ));

        let empty = ServiceConfig {
            schemas_dir: PathBuf::new(),
            ..ServiceConfig::default()
        };
        assert!(matches!(
            empty.validate().expect_err("empty dir"),
            ConfigError::Invalid { key: "schemas_dir", .. }
        ));

        let mut hot = ServiceConfig::default();
        hot.providers.openai.temperature = Some(3.5);
        assert!(hot.validate().is_err());
    }

    #[test]
    fn reads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        std::fs::write(&path, "model_timeout_secs: 5\nlog:\n  format: json\n").unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(config.model_timeout(), Duration::from_secs(5));
        assert_eq!(config.log.format, LogFormat::Json);

        let err = ServiceConfig::from_file(&dir.path().join("absent.yaml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
