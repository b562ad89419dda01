//! Contract-checked prompt execution.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contract_adapters::registry::ProviderRegistry;
use contract_adapters::traits::{AdapterError, AdapterResult, InferenceRequest};
use contract_primitives::{ErrorDetail, ExecutionId};
use contract_prompts::{TemplateDocument, TemplateError, TemplateResolver};
use contract_schema::{ContractValidator, SchemaDocument, SchemaError, SchemaResolver, ValidationMode};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{Instrument, debug, info_span, warn};

use crate::audit::TemplateAuditor;
use crate::failure::{ExecutionFailure, FailureKind};
use crate::outcome::{ExecutionOutcome, ExecutionSuccess, ModelOutput};
use crate::request::ExecutionRequest;
use crate::sink::{ExecutionSink, TracingExecutionSink};
use crate::state::{ExecutionEvent, ExecutionMachine};

/// Default limit on a single model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs execution requests through template loading, input validation,
/// rendering, model invocation and output validation.
///
/// The executor holds no per-request state; one instance serves any number of
/// concurrent executions.
#[derive(Clone)]
pub struct ContractExecutor {
    templates: TemplateResolver,
    schemas: SchemaResolver,
    providers: ProviderRegistry,
    input_validator: ContractValidator,
    output_validator: ContractValidator,
    model_timeout: Duration,
    sink: Arc<dyn ExecutionSink>,
}

impl fmt::Debug for ContractExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractExecutor")
            .field("templates", &self.templates)
            .field("providers", &self.providers)
            .field("input_validation", &self.input_validator.mode())
            .field("output_validation", &self.output_validator.mode())
            .field("model_timeout", &self.model_timeout)
            .finish_non_exhaustive()
    }
}

/// A template rendered against validated input.
#[derive(Debug)]
pub(crate) struct PreparedPrompt {
    pub(crate) template: TemplateDocument,
    pub(crate) prompt: String,
}

impl ContractExecutor {
    /// Creates an executor with closed validation and the default model timeout.
    #[must_use]
    pub fn new(
        templates: TemplateResolver,
        schemas: SchemaResolver,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            templates,
            schemas,
            providers,
            input_validator: ContractValidator::closed(),
            output_validator: ContractValidator::closed(),
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            sink: Arc::new(TracingExecutionSink),
        }
    }

    /// Sets how request input is validated.
    #[must_use]
    pub fn with_input_validation(mut self, mode: ValidationMode) -> Self {
        self.input_validator = ContractValidator::new(mode);
        self
    }

    /// Sets how model output is validated.
    #[must_use]
    pub fn with_output_validation(mut self, mode: ValidationMode) -> Self {
        self.output_validator = ContractValidator::new(mode);
        self
    }

    /// Sets the limit applied to each model call.
    #[must_use]
    pub fn with_model_timeout(mut self, limit: Duration) -> Self {
        self.model_timeout = limit;
        self
    }

    /// Replaces the outcome sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ExecutionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the template resolver.
    #[must_use]
    pub fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    /// Returns the schema resolver.
    #[must_use]
    pub fn schemas(&self) -> &SchemaResolver {
        &self.schemas
    }

    /// Returns the provider registry.
    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Returns a template auditor over the same template and schema stores.
    #[must_use]
    pub fn auditor(&self) -> TemplateAuditor {
        TemplateAuditor::new(self.templates.clone(), self.schemas.clone())
    }

    /// Parses `body` and executes it.
    ///
    /// Never fails: every failure is captured in the returned outcome.
    pub async fn execute_body(&self, body: Option<&[u8]>) -> ExecutionOutcome {
        let execution_id = ExecutionId::random();
        match ExecutionRequest::from_body(body) {
            Ok(request) => self.run(execution_id, request).await,
            Err(failure) => self.reject(execution_id, failure),
        }
    }

    /// Executes an already parsed request.
    ///
    /// Never fails: every failure is captured in the returned outcome.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        self.run(ExecutionId::random(), request).await
    }

    /// Loads `template_id`, validates `input` and renders the prompt without
    /// calling a model.
    ///
    /// # Errors
    ///
    /// Returns the same failures an execution would report before reaching
    /// the model.
    pub async fn render(&self, template_id: &str, input: &Value) -> Result<String, ExecutionFailure> {
        let mut machine = ExecutionMachine::new(ExecutionId::random());
        self.prepare(&mut machine, template_id, input)
            .await
            .map(|prepared| prepared.prompt)
    }

    fn reject(&self, execution_id: ExecutionId, failure: ExecutionFailure) -> ExecutionOutcome {
        let _span = info_span!("execute", execution_id = %execution_id).entered();
        let mut machine = ExecutionMachine::new(execution_id);
        fail(&mut machine, failure.kind());
        let outcome = ExecutionOutcome::new(execution_id, None, machine.history().to_vec(), Err(failure));
        self.sink.record(&outcome);
        outcome
    }

    async fn run(&self, execution_id: ExecutionId, request: ExecutionRequest) -> ExecutionOutcome {
        let span = info_span!(
            "execute",
            execution_id = %execution_id,
            template_id = %request.template_id
        );
        async move {
            let mut machine = ExecutionMachine::new(execution_id);
            let result = self.drive(&mut machine, &request).await;
            if let Err(failure) = &result {
                fail(&mut machine, failure.kind());
            }
            let outcome = ExecutionOutcome::new(
                execution_id,
                Some(request.template_id),
                machine.history().to_vec(),
                result,
            );
            self.sink.record(&outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        machine: &mut ExecutionMachine,
        request: &ExecutionRequest,
    ) -> Result<ExecutionSuccess, ExecutionFailure> {
        request.ensure_complete()?;
        let PreparedPrompt { template, prompt } = self
            .prepare(machine, &request.template_id, &request.input)
            .await?;

        let adapter = self
            .providers
            .build(&request.llm_provider, &request.model)
            .map_err(|err| map_adapter_error(&self.providers, err))?;

        let output_schema = match template.metadata().output_schema() {
            Some(reference) => Some(self.resolve_schema("output", reference).await?),
            None => None,
        };

        debug!(
            provider = adapter.metadata().provider(),
            model = adapter.metadata().model(),
            structured = output_schema.is_some(),
            "invoking model"
        );
        let invocation = InferenceRequest::from_prompt(prompt.clone());
        let output = match &output_schema {
            Some(schema) => {
                let value = self
                    .call_model(adapter.generate_structured(invocation, schema))
                    .await?;
                advance(machine, ExecutionEvent::InvokeModel)?;
                self.check_output(schema, &value)?;
                advance(machine, ExecutionEvent::ValidateOutput)?;
                ModelOutput::Validated(value)
            }
            None => {
                let text = self.call_model(adapter.generate_text(invocation)).await?;
                advance(machine, ExecutionEvent::InvokeModel)?;
                warn!(
                    template_id = %template.template_id(),
                    "output schema not declared; returning unvalidated model output"
                );
                ModelOutput::Unvalidated(text)
            }
        };

        advance(machine, ExecutionEvent::Complete)?;
        Ok(ExecutionSuccess::new(prompt, request.input.clone(), output))
    }

    /// Steps 2 to 4: load the template, validate the input and render.
    pub(crate) async fn prepare(
        &self,
        machine: &mut ExecutionMachine,
        template_id: &str,
        input: &Value,
    ) -> Result<PreparedPrompt, ExecutionFailure> {
        let template = self
            .templates
            .resolve(template_id)
            .await
            .map_err(map_template_error)?;
        let input_ref = template.metadata().input_schema().ok_or_else(|| {
            ExecutionFailure::misconfigured(format!(
                "template `{template_id}` does not declare an input_schema"
            ))
        })?;
        advance(machine, ExecutionEvent::LoadTemplate)?;

        let input_schema = self.resolve_schema("input", input_ref).await?;
        let validation = self
            .input_validator
            .validate(&input_schema, input)
            .map_err(|err| schema_failure("input", input_ref, &err))?;
        if !validation.is_valid() {
            return Err(ExecutionFailure::bad_request("input validation failed")
                .with_errors(validation.into_errors()));
        }
        advance(machine, ExecutionEvent::ValidateInput)?;

        let prompt = template
            .compile()
            .and_then(|compiled| compiled.render(input))
            .map_err(map_template_error)?;
        advance(machine, ExecutionEvent::RenderPrompt)?;

        Ok(PreparedPrompt { template, prompt })
    }

    async fn resolve_schema(
        &self,
        which: &str,
        reference: &str,
    ) -> Result<SchemaDocument, ExecutionFailure> {
        self.schemas
            .resolve(reference)
            .await
            .map_err(|err| schema_failure(which, reference, &err))
    }

    async fn call_model<T>(
        &self,
        call: impl Future<Output = AdapterResult<T>>,
    ) -> Result<T, ExecutionFailure> {
        match timeout(self.model_timeout, call).await {
            Ok(result) => result.map_err(|err| map_adapter_error(&self.providers, err)),
            Err(_) => Err(ExecutionFailure::upstream(format!(
                "model call timed out after {:?}",
                self.model_timeout
            ))),
        }
    }

    fn check_output(&self, schema: &SchemaDocument, value: &Value) -> Result<(), ExecutionFailure> {
        let validation = self
            .output_validator
            .validate(schema, value)
            .map_err(|err| schema_failure("output", schema.path().as_str(), &err))?;
        if validation.is_valid() {
            Ok(())
        } else {
            Err(ExecutionFailure::new(
                FailureKind::UpstreamContractViolation,
                "output validation failed",
            )
            .with_errors(validation.into_errors()))
        }
    }
}

fn advance(machine: &mut ExecutionMachine, event: ExecutionEvent) -> Result<(), ExecutionFailure> {
    machine
        .apply(event)
        .map(|_| ())
        .map_err(|err| ExecutionFailure::misconfigured(err.to_string()))
}

fn fail(machine: &mut ExecutionMachine, kind: FailureKind) {
    if let Err(err) = machine.apply(ExecutionEvent::Fail(kind)) {
        warn!(%err, "execution already finished");
    }
}

fn map_template_error(err: TemplateError) -> ExecutionFailure {
    match err {
        TemplateError::NotFound { .. } => ExecutionFailure::new(FailureKind::NotFound, err.to_string()),
        TemplateError::Compile { .. } | TemplateError::Render { .. } => ExecutionFailure::new(
            FailureKind::TemplateRenderError,
            format!("template render error: {err}"),
        ),
        TemplateError::FrontMatter { .. }
        | TemplateError::AttachmentNotFound { .. }
        | TemplateError::Store(_) => ExecutionFailure::misconfigured(err.to_string()),
    }
}

fn schema_failure(which: &str, reference: &str, err: &SchemaError) -> ExecutionFailure {
    ExecutionFailure::misconfigured(format!(
        "{which} schema `{reference}` could not be used: {err}"
    ))
}

fn map_adapter_error(providers: &ProviderRegistry, err: AdapterError) -> ExecutionFailure {
    match err {
        AdapterError::UnsupportedProvider { provider } => {
            let supported = providers.names().join(", ");
            ExecutionFailure::bad_request("unsupported llmProvider").with_errors(vec![
                ErrorDetail::new(
                    "/llmProvider",
                    format!("`{provider}` is not one of: {supported}"),
                )
                .with_keyword("enum"),
            ])
        }
        AdapterError::Configuration { .. } => {
            ExecutionFailure::misconfigured(format!("model provider unavailable: {err}"))
        }
        AdapterError::Timeout { .. } => ExecutionFailure::upstream(err.to_string()),
        other => ExecutionFailure::upstream(format!("model call failed: {other}")),
    }
}
