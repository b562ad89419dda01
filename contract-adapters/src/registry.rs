//! Provider selection by name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::traits::{AdapterError, AdapterResult, ModelAdapter};

/// Builds model adapters for one provider.
pub trait ProviderFactory: Send + Sync {
    /// Returns an adapter bound to `model`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the provider cannot be used,
    /// for example because credentials are missing.
    fn build(&self, model: &str) -> AdapterResult<Arc<dyn ModelAdapter>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&str) -> AdapterResult<Arc<dyn ModelAdapter>> + Send + Sync,
{
    fn build(&self, model: &str) -> AdapterResult<Arc<dyn ModelAdapter>> {
        self(model)
    }
}

/// Case-insensitive map from provider name to [`ProviderFactory`].
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: &str, factory: Arc<dyn ProviderFactory>) {
        self.providers.insert(normalise(name), factory);
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with_provider(mut self, name: &str, factory: Arc<dyn ProviderFactory>) -> Self {
        self.register(name, factory);
        self
    }

    /// Returns the registered provider names, lowercase and sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Returns `true` if a provider is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&normalise(name))
    }

    /// Builds an adapter for `model` from the provider registered as `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedProvider`] when no provider matches
    /// and propagates factory errors otherwise.
    pub fn build(&self, provider: &str, model: &str) -> AdapterResult<Arc<dyn ModelAdapter>> {
        let factory =
            self.providers
                .get(&normalise(provider))
                .ok_or_else(|| AdapterError::UnsupportedProvider {
                    provider: provider.to_owned(),
                })?;
        let adapter = factory.build(model)?;
        debug!(provider = adapter.metadata().provider(), model, "model adapter ready");
        Ok(adapter)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

fn normalise(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
