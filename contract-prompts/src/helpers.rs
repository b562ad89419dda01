//! Handlebars helpers available to every template.

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde_json::Value;

pub(crate) fn register(registry: &mut Handlebars<'static>) {
    registry.register_helper("json", Box::new(json_helper));
    registry.register_helper("uppercase", Box::new(uppercase_helper));
    registry.register_helper("lowercase", Box::new(lowercase_helper));
    registry.register_helper("join", Box::new(join_helper));
}

fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if let Some(param) = h.param(0) {
        let pretty = h.hash_get("pretty").and_then(|v| v.value().as_bool()) == Some(true);
        let rendered = if pretty {
            serde_json::to_string_pretty(param.value())
        } else {
            serde_json::to_string(param.value())
        };
        out.write(&rendered.unwrap_or_default())?;
    }
    Ok(())
}

fn uppercase_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&param.to_uppercase())?;
    Ok(())
}

fn lowercase_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&param.to_lowercase())?;
    Ok(())
}

/// `{{join items ", "}}` joins array elements; strings are written bare.
fn join_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let separator = h.param(1).and_then(|v| v.value().as_str()).unwrap_or(", ");
    if let Some(Value::Array(items)) = h.param(0).map(|v| v.value()) {
        let joined = items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(separator);
        out.write(&joined)?;
    }
    Ok(())
}
