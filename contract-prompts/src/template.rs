//! Parsed and compiled template documents.

use std::fmt;

use contract_primitives::DocumentPath;
use handlebars::Handlebars;
use serde::Serialize;
use tracing::trace;

use crate::error::{TemplateError, TemplateResult};
use crate::helpers;
use crate::metadata::{TemplateMetadata, split_front_matter};

const TEMPLATE_NAME: &str = "prompt";

/// A template document split into metadata and body.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateDocument {
    template_id: String,
    path: DocumentPath,
    metadata: TemplateMetadata,
    body: String,
}

impl TemplateDocument {
    /// Parses raw document text loaded from `path` under the id `template_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::FrontMatter`] when the front-matter block is
    /// unterminated or is not a YAML mapping of recognised option types.
    pub fn parse(
        template_id: impl Into<String>,
        path: DocumentPath,
        contents: &str,
    ) -> TemplateResult<Self> {
        let template_id = template_id.into();
        let front_matter_error = |reason: String| TemplateError::FrontMatter {
            template_id: template_id.clone(),
            reason,
        };

        let (yaml, body) = split_front_matter(contents).map_err(front_matter_error)?;
        let metadata = match yaml {
            Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str::<TemplateMetadata>(yaml)
                .map_err(|err| front_matter_error(err.to_string()))?,
            _ => TemplateMetadata::default(),
        };

        Ok(Self {
            body: body.to_owned(),
            template_id,
            path,
            metadata,
        })
    }

    /// Returns the id the template was requested under.
    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Returns the storage path the template was read from.
    #[must_use]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Returns the front-matter metadata.
    #[must_use]
    pub fn metadata(&self) -> &TemplateMetadata {
        &self.metadata
    }

    /// Returns the Handlebars body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Compiles the body into a strict renderer.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Compile`] when the body is not valid Handlebars.
    pub fn compile(&self) -> TemplateResult<CompiledTemplate> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        helpers::register(&mut registry);
        registry
            .register_template_string(TEMPLATE_NAME, &self.body)
            .map_err(|err| TemplateError::Compile {
                template_id: self.template_id.clone(),
                reason: err.to_string(),
            })?;

        Ok(CompiledTemplate {
            template_id: self.template_id.clone(),
            registry,
        })
    }
}

/// A compiled template; rendering is deterministic for a given input.
///
/// Variables are looked up strictly, so a reference to a field absent from the
/// input is a render error rather than an empty string. Output is not
/// HTML-escaped.
pub struct CompiledTemplate {
    template_id: String,
    registry: Handlebars<'static>,
}

impl CompiledTemplate {
    /// Returns the id of the template this renderer was compiled from.
    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Renders the template with `data` as the root context.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Render`] when a referenced variable is missing
    /// or a helper fails.
    pub fn render<T: Serialize>(&self, data: &T) -> TemplateResult<String> {
        let rendered = self
            .registry
            .render(TEMPLATE_NAME, data)
            .map_err(|err| TemplateError::Render {
                template_id: self.template_id.clone(),
                reason: err.to_string(),
            })?;
        trace!(template_id = %self.template_id, chars = rendered.len(), "template rendered");
        Ok(rendered)
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("template_id", &self.template_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn document(contents: &str) -> TemplateDocument {
        TemplateDocument::parse(
            "stock/detailed_analysis",
            DocumentPath::new("stock/detailed_analysis.prompt.hbs").unwrap(),
            contents,
        )
        .unwrap()
    }

    #[test]
    fn parses_metadata_and_body() {
        let doc = document(
            "---\ninput_schema: stock/analysis/input.schema.yaml\noutput_schema: stock/analysis/output.schema.yaml\n---\nAnalyse {{company.name}}.",
        );
        assert_eq!(
            doc.metadata().input_schema(),
            Some("stock/analysis/input.schema.yaml")
        );
        assert_eq!(
            doc.metadata().output_schema(),
            Some("stock/analysis/output.schema.yaml")
        );
        assert_eq!(doc.body(), "Analyse {{company.name}}.");
        assert_eq!(doc.template_id(), "stock/detailed_analysis");
    }

    #[test]
    fn document_without_front_matter_has_empty_metadata() {
        let doc = document("Just {{text}}");
        assert_eq!(doc.metadata(), &TemplateMetadata::default());
    }

    #[test]
    fn malformed_front_matter_is_reported() {
        let err = TemplateDocument::parse(
            "t",
            DocumentPath::new("t.prompt.hbs").unwrap(),
            "---\ninput_schema: [unclosed\n---\nbody",
        )
        .expect_err("yaml should not parse");
        assert!(matches!(err, TemplateError::FrontMatter { .. }));

        let err = TemplateDocument::parse(
            "t",
            DocumentPath::new("t.prompt.hbs").unwrap(),
            "---\ninput_schema: a.yaml\nbody",
        )
        .expect_err("front matter never closed");
        assert!(matches!(err, TemplateError::FrontMatter { .. }));
    }

    #[test]
    fn renders_deterministically_without_escaping() {
        let compiled = document("Company: {{company.name}} ({{uppercase company.ticker}}) {{json tags}}")
            .compile()
            .unwrap();
        let input = json!({
            "company": { "name": "Acme & Sons <Ltd>", "ticker": "acme" },
            "tags": ["growth", "tech"]
        });

        let first = compiled.render(&input).unwrap();
        let second = compiled.render(&input).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            r#"Company: Acme & Sons <Ltd> (ACME) ["growth","tech"]"#
        );
    }

    #[test]
    fn join_helper_joins_arrays() {
        let compiled = document("{{join trends \"; \"}}|{{join numbers}}").compile().unwrap();
        let rendered = compiled
            .render(&json!({ "trends": ["up", "down"], "numbers": [1, 2] }))
            .unwrap();
        assert_eq!(rendered, "up; down|1, 2");
    }

    #[test]
    fn missing_variable_is_a_render_error() {
        let compiled = document("Hello {{company.name}}").compile().unwrap();
        let err = compiled
            .render(&json!({ "company": {} }))
            .expect_err("strict mode rejects missing variables");
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn malformed_body_fails_to_compile() {
        let err = document("Hello {{#if name}}unterminated")
            .compile()
            .expect_err("unclosed block");
        assert!(matches!(err, TemplateError::Compile { .. }));
    }
}
