//! The adapter seam between the orchestrator and model providers.
//!
//! A rendered template becomes one [`InferenceRequest`]; an adapter turns it
//! into either free text or a JSON value shaped by an output schema.

use async_trait::async_trait;
use contract_schema::SchemaDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::error::{AdapterError, AdapterResult};

/// Identifies which provider and model an adapter talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterMetadata {
    provider: &'static str,
    model: String,
}

impl AdapterMetadata {
    /// Describes an adapter for `model` served by `provider`.
    #[must_use]
    pub fn new(provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Registry name of the provider.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Model name exactly as the caller requested it.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// A single rendered prompt plus optional sampling hints.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct InferenceRequest {
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl InferenceRequest {
    /// Wraps a rendered prompt. The prompt is sent verbatim as the user turn.
    #[must_use]
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            instructions: None,
            max_output_tokens: None,
            temperature: None,
        }
    }

    /// Adds provider-level instructions sent ahead of the prompt.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Caps the completion length.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Overrides the provider's default temperature for this call.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Rendered prompt text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Instructions, if any.
    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Completion length cap, if any.
    #[must_use]
    pub const fn max_output_tokens(&self) -> Option<u32> {
        self.max_output_tokens
    }

    /// Per-call temperature, if any.
    #[must_use]
    pub const fn temperature(&self) -> Option<f32> {
        self.temperature
    }
}

/// A model provider bound to one model.
///
/// Calls are attempted once. Deciding whether to retry belongs to whoever
/// holds the adapter.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Provider and model this adapter was built for.
    fn metadata(&self) -> &AdapterMetadata;

    /// Asks for an unconstrained text completion.
    async fn generate_text(&self, request: InferenceRequest) -> AdapterResult<String>;

    /// Asks for a JSON completion constrained by `schema`.
    ///
    /// Providers treat the schema as guidance; the value is returned as the
    /// provider produced it and conformance is checked by the caller.
    async fn generate_structured(
        &self,
        request: InferenceRequest,
        schema: &SchemaDocument,
    ) -> AdapterResult<Value>;
}
