//! Contract validation of JSON values against dereferenced schemas.

use std::fmt;
use std::str::FromStr;

use contract_primitives::{ErrorDetail, ValidationResult};
use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::closed::close_object_schemas;
use crate::document::SchemaDocument;
use crate::error::{SchemaError, SchemaResult};

/// Whether undeclared object properties are accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Undeclared properties are allowed unless the schema forbids them.
    Open,
    /// Object schemas reject properties they do not declare.
    #[default]
    Closed,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown validation mode `{other}` (expected open or closed)")),
        }
    }
}

/// Validates values against [`SchemaDocument`]s.
///
/// Validation is a pure function of the schema, the value and the mode; the
/// error list keeps the order produced by the underlying validator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContractValidator {
    mode: ValidationMode,
}

impl ContractValidator {
    /// Creates a validator using `mode`.
    #[must_use]
    pub const fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    /// Validator that accepts undeclared properties.
    #[must_use]
    pub const fn open() -> Self {
        Self::new(ValidationMode::Open)
    }

    /// Validator that rejects undeclared properties.
    #[must_use]
    pub const fn closed() -> Self {
        Self::new(ValidationMode::Closed)
    }

    /// Returns the configured mode.
    #[must_use]
    pub const fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Validates `value` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidSchema`] if the schema itself cannot be
    /// compiled. Violations in `value` are reported through the returned
    /// [`ValidationResult`], never as an error.
    pub fn validate(&self, schema: &SchemaDocument, value: &Value) -> SchemaResult<ValidationResult> {
        let effective;
        let source = match self.mode {
            ValidationMode::Open => schema.value(),
            ValidationMode::Closed => {
                effective = close_object_schemas(schema.value());
                &effective
            }
        };

        let validator = jsonschema::validator_for(source).map_err(|err| SchemaError::InvalidSchema {
            path: schema.path().to_string(),
            reason: err.to_string(),
        })?;

        let mut details = Vec::new();
        for error in validator.iter_errors(value) {
            let path = error.instance_path.to_string();
            let schema_path = error.schema_path.to_string();
            let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_owned();
            let message = error.to_string();

            match &error.kind {
                ValidationErrorKind::Required { property } => {
                    let name = property
                        .as_str()
                        .map_or_else(|| property.to_string(), ToOwned::to_owned);
                    details.push(
                        ErrorDetail::new(child_pointer(&path, &name), message)
                            .with_keyword(keyword),
                    );
                }
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    for name in unexpected {
                        details.push(
                            ErrorDetail::new(
                                child_pointer(&path, name),
                                format!("additional property `{name}` is not allowed"),
                            )
                            .with_keyword(keyword.clone()),
                        );
                    }
                }
                ValidationErrorKind::FalseSchema if keyword == "additionalProperties" => {
                    let undeclared = undeclared_property(
                        source,
                        &schema_path,
                        value,
                        &path,
                        &error.instance,
                        &details,
                    );
                    let detail = match undeclared {
                        Some((pointer, name)) => ErrorDetail::new(
                            pointer,
                            format!("additional property `{name}` is not allowed"),
                        ),
                        None => ErrorDetail::new(path, message),
                    };
                    details.push(detail.with_keyword(keyword));
                }
                _ => details.push(ErrorDetail::new(path, message).with_keyword(keyword)),
            }
        }

        trace!(
            schema = %schema.path(),
            mode = %self.mode,
            violations = details.len(),
            "value validated"
        );
        Ok(ValidationResult::from_errors(details))
    }
}

/// Finds the property behind an `additionalProperties: false` rejection that
/// was reported at the enclosing object. Returns its pointer and name.
///
/// Candidates are the object's keys missing from the owning schema's
/// `properties` and not already reported; the one holding `rejected` wins.
fn undeclared_property(
    schema: &Value,
    schema_path: &str,
    value: &Value,
    object_path: &str,
    rejected: &Value,
    reported: &[ErrorDetail],
) -> Option<(String, String)> {
    let owner = schema.pointer(schema_path.strip_suffix("/additionalProperties")?)?;
    let declared = owner.get("properties").and_then(Value::as_object);
    let object = value.pointer(object_path)?.as_object()?;

    let candidates: Vec<(String, &String, &Value)> = object
        .iter()
        .filter(|(name, _)| declared.is_none_or(|declared| !declared.contains_key(*name)))
        .map(|(name, member)| (child_pointer(object_path, name), name, member))
        .filter(|(pointer, _, _)| reported.iter().all(|detail| detail.path != *pointer))
        .collect();

    candidates
        .iter()
        .find(|(_, _, member)| *member == rejected)
        .or_else(|| candidates.first())
        .map(|(pointer, name, _)| (pointer.clone(), (*name).clone()))
}

fn child_pointer(parent: &str, name: &str) -> String {
    let escaped = name.replace('~', "~0").replace('/', "~1");
    format!("{parent}/{escaped}")
}

#[cfg(test)]
mod tests {
    use contract_primitives::DocumentPath;
    use serde_json::json;

    use super::*;

    fn schema(value: Value) -> SchemaDocument {
        SchemaDocument::new(DocumentPath::new("test.schema.yaml").unwrap(), value)
    }

    fn company_schema() -> SchemaDocument {
        schema(json!({
            "type": "object",
            "required": ["company"],
            "properties": {
                "company": {
                    "type": "object",
                    "required": ["name", "financials"],
                    "properties": {
                        "name": { "type": "string" },
                        "financials": {
                            "type": "object",
                            "required": ["revenue"],
                            "properties": { "revenue": { "type": "number" } }
                        }
                    }
                },
                "trends": { "type": "array", "items": { "type": "string" } },
                "active": { "type": "boolean" }
            }
        }))
    }

    #[test]
    fn accepts_conforming_values() {
        let value = json!({
            "company": { "name": "Acme Corp", "financials": { "revenue": 500 } },
            "trends": ["a", "b"],
            "active": true
        });
        let result = ContractValidator::closed()
            .validate(&company_schema(), &value)
            .unwrap();
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn missing_required_field_points_at_the_field() {
        let value = json!({ "company": { "financials": { "revenue": 1 } } });
        let result = ContractValidator::open()
            .validate(&company_schema(), &value)
            .unwrap();

        assert!(!result.is_valid());
        let detail = &result.errors()[0];
        assert_eq!(detail.path, "/company/name");
        assert_eq!(detail.keyword.as_deref(), Some("required"));
    }

    #[test]
    fn type_mismatch_points_at_the_value() {
        let value = json!({
            "company": { "name": "Acme", "financials": { "revenue": "500" } }
        });
        let result = ContractValidator::closed()
            .validate(&company_schema(), &value)
            .unwrap();
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].path, "/company/financials/revenue");
        assert_eq!(result.errors()[0].keyword.as_deref(), Some("type"));
    }

    #[test]
    fn array_items_are_checked_homogeneously() {
        let value = json!({
            "company": { "name": "Acme", "financials": { "revenue": 1 } },
            "trends": ["ok", 3]
        });
        let result = ContractValidator::open()
            .validate(&company_schema(), &value)
            .unwrap();
        assert_eq!(result.errors()[0].path, "/trends/1");
    }

    #[test]
    fn closed_mode_rejects_undeclared_properties_open_mode_accepts() {
        let value = json!({
            "company": { "name": "Acme", "financials": { "revenue": 1 }, "ticker": "ACME" }
        });

        let open = ContractValidator::open()
            .validate(&company_schema(), &value)
            .unwrap();
        assert!(open.is_valid());

        let closed = ContractValidator::closed()
            .validate(&company_schema(), &value)
            .unwrap();
        assert!(!closed.is_valid());
        assert_eq!(closed.errors()[0].path, "/company/ticker");
    }

    #[test]
    fn closed_free_form_object_names_the_undeclared_key() {
        let doc = schema(json!({
            "type": "object",
            "properties": { "meta": { "type": "object" } }
        }));
        let value = json!({ "meta": { "x": 1, "y": 1 } });

        assert!(ContractValidator::open().validate(&doc, &value).unwrap().is_valid());

        let closed = ContractValidator::closed().validate(&doc, &value).unwrap();
        let mut paths: Vec<&str> = closed.errors().iter().map(|e| e.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, ["/meta/x", "/meta/y"]);
        assert!(
            closed
                .errors()
                .iter()
                .all(|e| e.keyword.as_deref() == Some("additionalProperties"))
        );
    }

    #[test]
    fn closed_mode_accepts_properties_declared_through_all_of() {
        let doc = schema(json!({
            "type": "object",
            "allOf": [
                { "properties": { "name": { "type": "string" } }, "required": ["name"] },
                { "properties": { "revenue": { "type": "number" } } }
            ]
        }));

        let valid = ContractValidator::closed()
            .validate(&doc, &json!({ "name": "Acme", "revenue": 5 }))
            .unwrap();
        assert!(valid.is_valid(), "{:?}", valid.errors());

        let extra = ContractValidator::closed()
            .validate(&doc, &json!({ "name": "Acme", "ticker": "ACME" }))
            .unwrap();
        assert_eq!(extra.errors().len(), 1);
        assert_eq!(extra.errors()[0].path, "/ticker");
    }

    #[test]
    fn validation_is_deterministic() {
        let value = json!({ "company": { "name": 1 }, "active": "yes" });
        let validator = ContractValidator::closed();
        let first = validator.validate(&company_schema(), &value).unwrap();
        let second = validator.validate(&company_schema(), &value).unwrap();
        assert_eq!(first, second);
        assert!(first.errors().len() >= 3);
    }

    #[test]
    fn invalid_schema_is_an_error_not_a_violation() {
        let bad = schema(json!({ "type": "not-a-type" }));
        let err = ContractValidator::open()
            .validate(&bad, &json!({}))
            .expect_err("schema should not compile");
        assert!(matches!(err, SchemaError::InvalidSchema { .. }));
    }

    #[test]
    fn parses_modes() {
        assert_eq!("Closed".parse::<ValidationMode>(), Ok(ValidationMode::Closed));
        assert_eq!(" open ".parse::<ValidationMode>(), Ok(ValidationMode::Open));
        assert!("strict".parse::<ValidationMode>().is_err());
    }

    #[test]
    fn escapes_pointer_segments() {
        assert_eq!(child_pointer("/a", "b/c~d"), "/a/b~1c~0d");
    }
}
