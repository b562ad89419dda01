//! Dereferenced schema documents.

use contract_primitives::DocumentPath;
use serde_json::Value;

/// A schema with every `$ref` expanded in place.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDocument {
    path: DocumentPath,
    schema: Value,
}

impl SchemaDocument {
    /// Wraps an already dereferenced schema value.
    #[must_use]
    pub fn new(path: DocumentPath, schema: Value) -> Self {
        Self { path, schema }
    }

    /// Returns the path of the top-level document this schema was resolved from.
    #[must_use]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Returns the dereferenced schema value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.schema
    }

    /// Returns a short name suitable for provider structured-output requests.
    #[must_use]
    pub fn name(&self) -> String {
        let stem = self.path.as_str();
        let stem = [".schema.yaml", ".schema.yml", ".schema.json", ".yaml", ".yml", ".json"]
            .iter()
            .find_map(|suffix| stem.strip_suffix(suffix))
            .unwrap_or(stem);
        stem.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }

    /// Consumes the document, returning the schema value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.schema
    }
}

/// Collects every string-valued `$ref` remaining in `value`, in document order.
#[must_use]
pub fn unresolved_refs(value: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_refs(value, &mut refs);
    refs
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                out.push(reference.clone());
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, out)),
        _ => {}
    }
}
