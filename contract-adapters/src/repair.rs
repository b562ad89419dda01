//! Recovery of JSON values from model text.
//!
//! Models asked for JSON sometimes wrap it in a Markdown fence or surround it
//! with prose. [`extract_json`] tries, in order: the whole text, the first
//! fenced block, the outermost `{..}` span, and the outermost `[..]` span.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").ok());

/// Parses the first JSON value recoverable from `content`.
#[must_use]
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(captures) = FENCED_BLOCK.as_ref().and_then(|re| re.captures(trimmed)) {
        if let Ok(value) = serde_json::from_str(&captures[1]) {
            debug!("extracted JSON from fenced block");
            return Some(value);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    debug!(delimiter = %open, "extracted embedded JSON");
                    return Some(value);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_plain_json() {
        assert_eq!(extract_json(r#" {"name": "Test"} "#), Some(json!({ "name": "Test" })));
    }

    #[test]
    fn extracts_fenced_json() {
        let content = "Here's the result:\n\n```json\n{\"name\": \"Test Corp\"}\n```\n\nThat's all!";
        assert_eq!(extract_json(content), Some(json!({ "name": "Test Corp" })));
    }

    #[test]
    fn extracts_embedded_object_and_array() {
        let content = r#"The analysis shows {"apex": {"name": "Acme"}} which indicates..."#;
        assert_eq!(extract_json(content).unwrap()["apex"]["name"], "Acme");

        assert_eq!(extract_json("values: [1, 2, 3] done"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn gives_up_on_prose() {
        assert_eq!(extract_json("no json here } {"), None);
    }
}
