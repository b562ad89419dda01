//! Results of an execution and their response bodies.

use contract_primitives::ExecutionId;
use serde_json::{Map, Value, json};

use crate::failure::ExecutionFailure;
use crate::state::ExecutionState;

/// Warning attached to responses whose output was never checked.
pub const UNVALIDATED_OUTPUT_WARNING: &str =
    "output schema not declared; response was not validated";

/// What the model produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelOutput {
    /// Structured output that satisfied the declared output schema.
    Validated(Value),
    /// Free text returned without an output schema to check it against.
    Unvalidated(String),
}

/// A completed execution.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionSuccess {
    prompt: String,
    input: Value,
    output: ModelOutput,
    warnings: Vec<String>,
}

impl ExecutionSuccess {
    pub(crate) fn new(prompt: String, input: Value, output: ModelOutput) -> Self {
        let warnings = match output {
            ModelOutput::Validated(_) => Vec::new(),
            ModelOutput::Unvalidated(_) => vec![UNVALIDATED_OUTPUT_WARNING.to_owned()],
        };
        Self {
            prompt,
            input,
            output,
            warnings,
        }
    }

    /// Returns the rendered prompt sent to the model.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the validated caller input.
    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Returns the model output.
    #[must_use]
    pub fn output(&self) -> &ModelOutput {
        &self.output
    }

    /// Returns configuration warnings raised during the execution.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Final result of one execution, successful or not.
#[derive(Clone, Debug)]
pub struct ExecutionOutcome {
    execution_id: ExecutionId,
    template_id: Option<String>,
    history: Vec<ExecutionState>,
    result: Result<ExecutionSuccess, ExecutionFailure>,
}

impl ExecutionOutcome {
    pub(crate) fn new(
        execution_id: ExecutionId,
        template_id: Option<String>,
        history: Vec<ExecutionState>,
        result: Result<ExecutionSuccess, ExecutionFailure>,
    ) -> Self {
        Self {
            execution_id,
            template_id,
            history,
            result,
        }
    }

    /// Returns the execution identifier.
    #[must_use]
    pub const fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the requested template id, if the request got far enough to name one.
    #[must_use]
    pub fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    /// Returns every state the execution entered, oldest first.
    #[must_use]
    pub fn history(&self) -> &[ExecutionState] {
        &self.history
    }

    /// Returns the final state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.history
            .last()
            .copied()
            .unwrap_or(ExecutionState::ReceivingRequest)
    }

    /// Returns `true` if the execution entered `state` at some point.
    #[must_use]
    pub fn reached(&self, state: ExecutionState) -> bool {
        self.history.contains(&state)
    }

    /// Returns the success payload, if any.
    #[must_use]
    pub fn success(&self) -> Option<&ExecutionSuccess> {
        self.result.as_ref().ok()
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&ExecutionFailure> {
        self.result.as_ref().err()
    }

    /// Consumes the outcome, returning its result.
    ///
    /// # Errors
    ///
    /// Returns the [`ExecutionFailure`] of a failed execution.
    pub fn into_result(self) -> Result<ExecutionSuccess, ExecutionFailure> {
        self.result
    }

    /// HTTP status for the response.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.failure().map_or(200, ExecutionFailure::status)
    }

    /// Builds the JSON response body.
    ///
    /// Validated output is returned as `response` alongside the `input`;
    /// unvalidated output is returned as `result` with `warnings`. Failures
    /// carry `message`, `code` and, when present, the ordered `errors`.
    #[must_use]
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("execution_id".to_owned(), json!(self.execution_id));
        match &self.result {
            Ok(success) => {
                body.insert("prompt".to_owned(), json!(success.prompt));
                match &success.output {
                    ModelOutput::Validated(response) => {
                        body.insert("response".to_owned(), response.clone());
                        body.insert("input".to_owned(), success.input.clone());
                    }
                    ModelOutput::Unvalidated(result) => {
                        body.insert("result".to_owned(), json!(result));
                        body.insert("warnings".to_owned(), json!(success.warnings));
                    }
                }
            }
            Err(failure) => {
                body.insert("message".to_owned(), json!(failure.message()));
                body.insert("code".to_owned(), json!(failure.kind().code()));
                if !failure.errors().is_empty() {
                    body.insert("errors".to_owned(), json!(failure.errors()));
                }
            }
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use contract_primitives::ErrorDetail;

    use super::*;
    use crate::failure::FailureKind;

    fn outcome(result: Result<ExecutionSuccess, ExecutionFailure>) -> ExecutionOutcome {
        ExecutionOutcome::new(
            ExecutionId::random(),
            Some("detailed_analysis".to_owned()),
            vec![ExecutionState::ReceivingRequest],
            result,
        )
    }

    #[test]
    fn validated_body_carries_response_and_input() {
        let success = ExecutionSuccess::new(
            "Analyse Acme".to_owned(),
            json!({ "company": "Acme" }),
            ModelOutput::Validated(json!({ "analysis": {} })),
        );
        let body = outcome(Ok(success)).body();

        assert_eq!(body["prompt"], "Analyse Acme");
        assert_eq!(body["response"], json!({ "analysis": {} }));
        assert_eq!(body["input"], json!({ "company": "Acme" }));
        assert!(body.get("warnings").is_none());
        assert!(body["execution_id"].is_string());
    }

    #[test]
    fn unvalidated_body_is_flagged() {
        let success = ExecutionSuccess::new(
            "Summarise".to_owned(),
            json!({}),
            ModelOutput::Unvalidated("free text".to_owned()),
        );
        let outcome = outcome(Ok(success));
        let body = outcome.body();

        assert_eq!(outcome.status(), 200);
        assert_eq!(body["result"], "free text");
        assert_eq!(body["warnings"], json!([UNVALIDATED_OUTPUT_WARNING]));
        assert!(body.get("response").is_none());
    }

    #[test]
    fn failure_body_lists_errors_in_order() {
        let failure = ExecutionFailure::bad_request("input validation failed").with_errors(vec![
            ErrorDetail::new("/company/name", "is required"),
            ErrorDetail::new("/market", "is required"),
        ]);
        let outcome = outcome(Err(failure));
        let body = outcome.body();

        assert_eq!(outcome.status(), 400);
        assert_eq!(body["code"], FailureKind::BadRequest.code());
        assert_eq!(body["message"], "input validation failed");
        assert_eq!(body["errors"][0]["path"], "/company/name");
        assert_eq!(body["errors"][1]["path"], "/market");
    }
}
