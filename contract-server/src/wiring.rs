//! Builds the executor and stores described by a [`ServiceConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use contract_adapters::openai::{OPENAI_PROVIDER, OpenAiConfig, OpenAiProvider};
use contract_adapters::registry::ProviderRegistry;
use contract_config::ServiceConfig;
use contract_kernel::ContractExecutor;
use contract_prompts::TemplateResolver;
use contract_schema::SchemaResolver;
use contract_store::{DocumentCache, DocumentStore, FsStore};
use tracing::info;

/// Creates the template and schema stores, sharing one cache when enabled.
#[must_use]
pub fn stores(config: &ServiceConfig) -> (Arc<dyn DocumentStore>, Arc<dyn DocumentStore>) {
    let mut templates = FsStore::new(&config.templates_dir);
    let mut schemas = FsStore::new(&config.schemas_dir);
    if config.cache.enabled {
        let cache = Arc::new(DocumentCache::new());
        templates = templates.with_cache(Arc::clone(&cache));
        schemas = schemas.with_cache(cache);
    }
    (Arc::new(templates), Arc::new(schemas))
}

/// Registers every configured model provider.
///
/// A missing API key does not fail here; executions naming the provider
/// report it as a server misconfiguration instead.
///
/// # Errors
///
/// Fails when a provider setting such as the base URL is invalid.
pub fn providers(config: &ServiceConfig) -> Result<ProviderRegistry> {
    let settings = &config.providers.openai;
    let mut openai = OpenAiConfig::new("")
        .with_api_key_from_env(&settings.api_key_env)
        .with_request_timeout(config.model_timeout())
        .with_strict_schema(settings.strict_schema);
    if let Some(base_url) = &settings.base_url {
        openai = openai
            .with_base_url(base_url)
            .context("invalid providers.openai.base_url")?;
    }
    if let Some(temperature) = settings.temperature {
        openai = openai.with_temperature(temperature);
    }

    Ok(ProviderRegistry::new().with_provider(OPENAI_PROVIDER, Arc::new(OpenAiProvider::new(openai))))
}

/// Builds a fully configured executor.
///
/// # Errors
///
/// Propagates provider configuration errors.
pub fn executor(config: &ServiceConfig) -> Result<ContractExecutor> {
    let (template_store, schema_store) = stores(config);
    let executor = ContractExecutor::new(
        TemplateResolver::new(template_store).with_extension(config.template_extension.clone()),
        SchemaResolver::new(schema_store),
        providers(config)?,
    )
    .with_input_validation(config.input_validation)
    .with_output_validation(config.output_validation)
    .with_model_timeout(config.model_timeout());

    info!(
        templates_dir = %config.templates_dir.display(),
        schemas_dir = %config.schemas_dir.display(),
        cache = config.cache.enabled,
        providers = ?executor.providers().names(),
        "executor ready"
    );
    Ok(executor)
}
