//! `PROMPT_CONTRACTS_*` environment overrides.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{LogFormat, ServiceConfig};

/// Prefix shared by every override variable.
pub const ENV_PREFIX: &str = "PROMPT_CONTRACTS_";

/// Applies overrides read through `lookup` on top of `config`.
///
/// `lookup` receives full variable names such as
/// `PROMPT_CONTRACTS_TEMPLATES_DIR`; blank values are ignored.
pub(crate) fn apply(
    config: &mut ServiceConfig,
    lookup: &impl Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    let get = |suffix: &str| -> Option<(String, String)> {
        let variable = format!("{ENV_PREFIX}{suffix}");
        lookup(&variable)
            .filter(|value| !value.trim().is_empty())
            .map(|value| (variable, value.trim().to_owned()))
    };

    if let Some((_, value)) = get("TEMPLATES_DIR") {
        config.templates_dir = PathBuf::from(value);
    }
    if let Some((_, value)) = get("SCHEMAS_DIR") {
        config.schemas_dir = PathBuf::from(value);
    }
    if let Some((_, value)) = get("TEMPLATE_EXTENSION") {
        config.template_extension = value;
    }
    if let Some((variable, value)) = get("INPUT_VALIDATION") {
        config.input_validation = parse(&variable, &value)?;
    }
    if let Some((variable, value)) = get("OUTPUT_VALIDATION") {
        config.output_validation = parse(&variable, &value)?;
    }
    if let Some((variable, value)) = get("MODEL_TIMEOUT_SECS") {
        config.model_timeout_secs = parse(&variable, &value)?;
    }
    if let Some((variable, value)) = get("CACHE_ENABLED") {
        config.cache.enabled = parse_flag(&variable, &value)?;
    }
    if let Some((_, value)) = get("OPENAI_BASE_URL") {
        config.providers.openai.base_url = Some(value);
    }
    if let Some((_, value)) = get("OPENAI_API_KEY_ENV") {
        config.providers.openai.api_key_env = value;
    }
    if let Some((variable, value)) = get("OPENAI_TEMPERATURE") {
        config.providers.openai.temperature = Some(parse(&variable, &value)?);
    }
    if let Some((variable, value)) = get("OPENAI_STRICT_SCHEMA") {
        config.providers.openai.strict_schema = parse_flag(&variable, &value)?;
    }
    if let Some((_, value)) = get("BIND") {
        config.server.bind = value;
    }
    if let Some((_, value)) = get("LOG_FILTER") {
        config.log.filter = value;
    }
    if let Some((variable, value)) = get("LOG_FORMAT") {
        config.log.format = parse::<LogFormat>(&variable, &value)?;
    }

    debug!("environment overrides applied");
    Ok(())
}

fn parse<T>(variable: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: ToString,
{
    value.parse().map_err(|err: T::Err| ConfigError::Environment {
        variable: variable.to_owned(),
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_flag(variable: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Environment {
            variable: variable.to_owned(),
            value: value.to_owned(),
            reason: "expected a boolean".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use contract_schema::ValidationMode;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = ServiceConfig::default();
        apply(
            &mut config,
            &lookup(&[
                ("PROMPT_CONTRACTS_TEMPLATES_DIR", "/srv/templates"),
                ("PROMPT_CONTRACTS_INPUT_VALIDATION", "OPEN"),
                ("PROMPT_CONTRACTS_MODEL_TIMEOUT_SECS", "15"),
                ("PROMPT_CONTRACTS_CACHE_ENABLED", "yes"),
                ("PROMPT_CONTRACTS_OPENAI_TEMPERATURE", "0.2"),
                ("PROMPT_CONTRACTS_LOG_FORMAT", "json"),
                ("PROMPT_CONTRACTS_SCHEMAS_DIR", "   "),
            ]),
        )
        .unwrap();

        assert_eq!(config.templates_dir, PathBuf::from("/srv/templates"));
        assert_eq!(config.schemas_dir, PathBuf::from("schemas"));
        assert_eq!(config.input_validation, ValidationMode::Open);
        assert_eq!(config.output_validation, ValidationMode::Closed);
        assert_eq!(config.model_timeout_secs, 15);
        assert!(config.cache.enabled);
        assert_eq!(config.providers.openai.temperature, Some(0.2));
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn unparsable_overrides_name_the_variable() {
        let mut config = ServiceConfig::default();
        let err = apply(
            &mut config,
            &lookup(&[("PROMPT_CONTRACTS_OUTPUT_VALIDATION", "strict")]),
        )
        .expect_err("unknown mode");
        assert!(matches!(
            err,
            ConfigError::Environment { ref variable, .. } if variable == "PROMPT_CONTRACTS_OUTPUT_VALIDATION"
        ));

        let err = apply(&mut config, &lookup(&[("PROMPT_CONTRACTS_CACHE_ENABLED", "maybe")]))
            .expect_err("not a flag");
        assert!(matches!(err, ConfigError::Environment { .. }));
    }
}
