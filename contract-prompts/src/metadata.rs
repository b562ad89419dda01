//! Front-matter metadata carried by template documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const DELIMITER: &str = "---";

/// Named options recognised in template front matter.
///
/// Any other keys are kept verbatim in [`TemplateMetadata::extra`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    /// Schema reference the request input must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<String>,
    /// Schema reference the model output must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,
    /// Example input used by template audits, relative to the template root.
    #[serde(
        default,
        alias = "inputExampleFile",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_example_file: Option<String>,
    /// Unrecognised keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TemplateMetadata {
    /// Returns the input schema reference, if declared and non-blank.
    #[must_use]
    pub fn input_schema(&self) -> Option<&str> {
        non_blank(self.input_schema.as_deref())
    }

    /// Returns the output schema reference, if declared and non-blank.
    #[must_use]
    pub fn output_schema(&self) -> Option<&str> {
        non_blank(self.output_schema.as_deref())
    }

    /// Returns the example input file, if declared and non-blank.
    #[must_use]
    pub fn input_example_file(&self) -> Option<&str> {
        non_blank(self.input_example_file.as_deref())
    }

    /// Returns an unrecognised key's value when it is a string.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Splits a document into its front-matter YAML (if any) and body.
///
/// Front matter must start on the first line with `---` and end with a line
/// containing only `---`. A document without an opening delimiter has no front
/// matter and is returned whole as the body.
///
/// # Errors
///
/// Returns a description when the front-matter block is never closed.
pub fn split_front_matter(content: &str) -> Result<(Option<&str>, &str), String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(rest) = strip_delimiter_line(content) else {
        return Ok((None, content));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }

    Err("front matter opened with `---` but never closed".to_owned())
}

fn strip_delimiter_line(content: &str) -> Option<&str> {
    let rest = content.strip_prefix(DELIMITER)?;
    if let Some(rest) = rest.strip_prefix("\r\n") {
        Some(rest)
    } else {
        rest.strip_prefix('\n')
    }
}
