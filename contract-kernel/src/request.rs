//! Execution request parsing.

use contract_primitives::ErrorDetail;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::failure::ExecutionFailure;

/// A shape-checked execution request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Caller data rendered into the template.
    pub input: Value,
    /// Template identifier, relative to the template root.
    pub template_id: String,
    /// Provider name, matched case-insensitively.
    pub llm_provider: String,
    /// Provider-specific model identifier.
    pub model: String,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    input: Option<Value>,
    #[serde(default, rename = "templateId", alias = "template-id")]
    template_id: Option<Value>,
    #[serde(default, rename = "llmProvider")]
    llm_provider: Option<Value>,
    #[serde(default)]
    model: Option<Value>,
}

impl ExecutionRequest {
    /// Creates a request from its parts.
    #[must_use]
    pub fn new(
        input: Value,
        template_id: impl Into<String>,
        llm_provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            input,
            template_id: template_id.into(),
            llm_provider: llm_provider.into(),
            model: model.into(),
        }
    }

    /// Parses a raw request body.
    ///
    /// # Errors
    ///
    /// Returns a `BadRequest` failure with message `body missing` when there is
    /// no body, and `missing required fields` when any of `input`,
    /// `templateId`, `llmProvider` or `model` is absent.
    pub fn from_body(body: Option<&[u8]>) -> Result<Self, ExecutionFailure> {
        let body = body.filter(|bytes| !bytes.iter().all(u8::is_ascii_whitespace));
        let Some(body) = body else {
            return Err(ExecutionFailure::bad_request("body missing"));
        };
        let value: Value = serde_json::from_slice(body).map_err(|err| {
            ExecutionFailure::bad_request(format!("request body is not valid JSON: {err}"))
        })?;
        Self::from_value(value)
    }

    /// Shape-checks an already decoded request body.
    ///
    /// # Errors
    ///
    /// See [`from_body`](Self::from_body).
    pub fn from_value(value: Value) -> Result<Self, ExecutionFailure> {
        if value.is_null() {
            return Err(ExecutionFailure::bad_request("body missing"));
        }
        if !value.is_object() {
            return Err(ExecutionFailure::bad_request(
                "request body must be a JSON object",
            ));
        }
        let raw: RawRequest = serde_json::from_value(value).map_err(|err| {
            ExecutionFailure::bad_request(format!("malformed request: {err}"))
        })?;

        let mut errors = Vec::new();
        let input = raw.input;
        if input.is_none() {
            errors.push(missing("input"));
        }
        let template_id = required_string(raw.template_id, "templateId", &mut errors);
        let llm_provider = required_string(raw.llm_provider, "llmProvider", &mut errors);
        let model = required_string(raw.model, "model", &mut errors);

        match (input, template_id, llm_provider, model) {
            (Some(input), Some(template_id), Some(llm_provider), Some(model)) if errors.is_empty() => {
                Ok(Self::new(input, template_id, llm_provider, model))
            }
            _ => Err(ExecutionFailure::bad_request("missing required fields").with_errors(errors)),
        }
    }

    /// Re-checks a request built with [`new`](Self::new).
    pub(crate) fn ensure_complete(&self) -> Result<(), ExecutionFailure> {
        let mut errors = Vec::new();
        if self.input.is_null() {
            errors.push(missing("input"));
        }
        for (field, value) in [
            ("templateId", &self.template_id),
            ("llmProvider", &self.llm_provider),
            ("model", &self.model),
        ] {
            if value.trim().is_empty() {
                errors.push(missing(field));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ExecutionFailure::bad_request("missing required fields").with_errors(errors))
        }
    }
}

fn required_string(value: Option<Value>, field: &str, errors: &mut Vec<ErrorDetail>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
        Some(Value::String(_)) | None => {
            errors.push(missing(field));
            None
        }
        Some(_) => {
            errors.push(
                ErrorDetail::new(format!("/{field}"), "must be a non-empty string")
                    .with_keyword("type"),
            );
            None
        }
    }
}

fn missing(field: &str) -> ErrorDetail {
    ErrorDetail::new(format!("/{field}"), "required field is missing").with_keyword("required")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::failure::FailureKind;

    #[test]
    fn parses_complete_requests() {
        let body = br#"{"input":{"a":1},"templateId":"detailed_analysis","llmProvider":"OpenAI","model":"gpt-x"}"#;
        let request = ExecutionRequest::from_body(Some(&body[..])).unwrap();
        assert_eq!(request.template_id, "detailed_analysis");
        assert_eq!(request.llm_provider, "OpenAI");
        assert_eq!(request.input, json!({ "a": 1 }));
    }

    #[test]
    fn accepts_the_hyphenated_template_key() {
        let request = ExecutionRequest::from_value(json!({
            "input": {}, "template-id": "t", "llmProvider": "openai", "model": "m"
        }))
        .unwrap();
        assert_eq!(request.template_id, "t");
    }

    #[test]
    fn empty_body_is_missing() {
        for body in [None, Some(&b""[..]), Some(&b"  \n"[..]), Some(&b"null"[..])] {
            let err = ExecutionRequest::from_body(body).expect_err("no body");
            assert_eq!(err.kind(), FailureKind::BadRequest);
            assert_eq!(err.message(), "body missing");
        }
    }

    #[test]
    fn absent_fields_are_listed() {
        let err = ExecutionRequest::from_value(json!({ "templateId": "t", "input": null, "model": 3 }))
            .expect_err("fields missing");
        assert_eq!(err.kind(), FailureKind::BadRequest);
        assert_eq!(err.message(), "missing required fields");
        let paths: Vec<_> = err.errors().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["/input", "/llmProvider", "/model"]);
    }

    #[test]
    fn constructed_requests_are_rechecked() {
        let request = ExecutionRequest::new(json!({}), " ", "openai", "");
        let err = request.ensure_complete().expect_err("blank fields");
        assert_eq!(err.errors().len(), 2);
        assert!(ExecutionRequest::new(json!({}), "t", "openai", "m").ensure_complete().is_ok());
    }

    #[test]
    fn malformed_json_and_non_objects_are_bad_requests() {
        let err = ExecutionRequest::from_body(Some(&b"{not json"[..])).expect_err("bad json");
        assert_eq!(err.kind(), FailureKind::BadRequest);

        let err = ExecutionRequest::from_value(json!([1, 2])).expect_err("array body");
        assert_eq!(err.kind(), FailureKind::BadRequest);
    }
}
