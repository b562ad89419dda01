//! Offline checks that every template renders with its example input.

use contract_primitives::ErrorDetail;
use contract_prompts::{TemplateError, TemplateResolver};
use contract_schema::{ContractValidator, SchemaResolver};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Result of auditing one template.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditStatus {
    /// The example validated and rendered.
    Passed {
        /// Prompt rendered from the example input.
        prompt: String,
    },
    /// The template declares no example input.
    Skipped {
        /// Why the template was not exercised.
        reason: String,
    },
    /// Loading, validating or rendering failed.
    Failed {
        /// Description of the failure.
        reason: String,
        /// Validation details, when the example violated the input schema.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<ErrorDetail>,
    },
}

/// Audit result for a single template.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemplateAudit {
    /// Template id as discovered.
    pub template_id: String,
    /// Outcome.
    #[serde(flatten)]
    pub status: AuditStatus,
}

/// Audit results for every discovered template.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AuditReport {
    templates: Vec<TemplateAudit>,
}

impl AuditReport {
    /// Returns the per-template results in discovery order.
    #[must_use]
    pub fn templates(&self) -> &[TemplateAudit] {
        &self.templates
    }

    /// Number of templates that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, AuditStatus::Failed { .. }))
    }

    /// Number of templates that passed.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(|status| matches!(status, AuditStatus::Passed { .. }))
    }

    /// Returns `true` when no template failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, predicate: impl Fn(&AuditStatus) -> bool) -> usize {
        self.templates
            .iter()
            .filter(|audit| predicate(&audit.status))
            .count()
    }
}

/// Renders each template against the example input named in its metadata.
///
/// Example inputs are validated in open mode: an example may carry more than
/// the schema requires.
#[derive(Clone, Debug)]
pub struct TemplateAuditor {
    templates: TemplateResolver,
    schemas: SchemaResolver,
    validator: ContractValidator,
}

impl TemplateAuditor {
    /// Creates an auditor over the given stores.
    #[must_use]
    pub fn new(templates: TemplateResolver, schemas: SchemaResolver) -> Self {
        Self {
            templates,
            schemas,
            validator: ContractValidator::open(),
        }
    }

    /// Audits every discovered template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Store`] if templates cannot be listed.
    /// Per-template problems are reported in the [`AuditReport`].
    pub async fn audit_all(&self) -> Result<AuditReport, TemplateError> {
        let mut templates = Vec::new();
        for template_id in self.templates.discover().await? {
            let status = self.audit(&template_id).await;
            match &status {
                AuditStatus::Passed { .. } => info!(template_id = %template_id, "template audit passed"),
                AuditStatus::Skipped { reason } => {
                    warn!(template_id = %template_id, reason = %reason, "template audit skipped");
                }
                AuditStatus::Failed { reason, errors } => {
                    warn!(
                        template_id = %template_id,
                        reason = %reason,
                        errors = errors.len(),
                        "template audit failed"
                    );
                }
            }
            templates.push(TemplateAudit {
                template_id,
                status,
            });
        }
        Ok(AuditReport { templates })
    }

    /// Audits one template.
    pub async fn audit(&self, template_id: &str) -> AuditStatus {
        match self.try_audit(template_id).await {
            Ok(status) => status,
            Err((reason, errors)) => AuditStatus::Failed { reason, errors },
        }
    }

    async fn try_audit(&self, template_id: &str) -> Result<AuditStatus, (String, Vec<ErrorDetail>)> {
        let template = self.templates.resolve(template_id).await.map_err(plain)?;
        let compiled = template.compile().map_err(plain)?;

        let Some(example_file) = template.metadata().input_example_file() else {
            return Ok(AuditStatus::Skipped {
                reason: "no input_example_file declared".to_owned(),
            });
        };
        let example = self
            .templates
            .read_attachment(example_file)
            .await
            .map_err(plain)?;
        let input: Value = serde_json::from_str(example.contents()).map_err(|err| {
            (
                format!("example input `{example_file}` is not valid JSON: {err}"),
                Vec::new(),
            )
        })?;

        if let Some(schema_ref) = template.metadata().input_schema() {
            let schema = self.schemas.resolve(schema_ref).await.map_err(plain)?;
            let validation = self.validator.validate(&schema, &input).map_err(plain)?;
            if !validation.is_valid() {
                return Err((
                    format!("example input `{example_file}` does not satisfy `{schema_ref}`"),
                    validation.into_errors(),
                ));
            }
        }

        let prompt = compiled.render(&input).map_err(plain)?;
        Ok(AuditStatus::Passed { prompt })
    }
}

fn plain(err: impl ToString) -> (String, Vec<ErrorDetail>) {
    (err.to_string(), Vec::new())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use contract_store::FsStore;

    use super::*;

    fn write(root: &Path, relative: &str, contents: &str) {
        let full = root.join(relative);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }

    fn auditor(root: &Path) -> TemplateAuditor {
        TemplateAuditor::new(
            TemplateResolver::new(Arc::new(FsStore::new(root.join("templates")))),
            SchemaResolver::new(Arc::new(FsStore::new(root.join("schemas")))),
        )
    }

    #[tokio::test]
    async fn reports_each_template() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "schemas/greeting.yaml",
            "type: object\nrequired: [name]\nproperties:\n  name: { type: string }\n",
        );
        write(
            root,
            "templates/good.prompt.hbs",
            "---\ninput_schema: greeting.yaml\ninputExampleFile: examples/good.json\n---\nHello {{name}}",
        );
        write(root, "templates/examples/good.json", r#"{"name": "Ada", "extra": true}"#);
        write(
            root,
            "templates/invalid.prompt.hbs",
            "---\ninput_schema: greeting.yaml\ninput_example_file: examples/invalid.json\n---\nHello {{name}}",
        );
        write(root, "templates/examples/invalid.json", r#"{"nom": "Ada"}"#);
        write(root, "templates/plain.prompt.hbs", "No example here");
        write(
            root,
            "templates/strict.prompt.hbs",
            "---\ninput_example_file: examples/good.json\n---\n{{missing.field}}",
        );

        let report = auditor(root).audit_all().await.unwrap();
        let statuses: Vec<_> = report
            .templates()
            .iter()
            .map(|audit| (audit.template_id.as_str(), &audit.status))
            .collect();

        assert_eq!(statuses.len(), 4);
        assert_eq!(
            statuses[0],
            (
                "good",
                &AuditStatus::Passed {
                    prompt: "Hello Ada".to_owned()
                }
            )
        );
        assert!(matches!(
            statuses[1],
            ("invalid", AuditStatus::Failed { errors, .. }) if errors[0].path == "/name"
        ));
        assert!(matches!(statuses[2], ("plain", AuditStatus::Skipped { .. })));
        assert!(matches!(statuses[3], ("strict", AuditStatus::Failed { .. })));
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 2);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn missing_example_file_fails_the_template() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "templates/t.prompt.hbs",
            "---\ninput_example_file: examples/absent.json\n---\nbody",
        );
        let status = auditor(dir.path()).audit("t").await;
        assert!(matches!(status, AuditStatus::Failed { .. }));
    }

    #[test]
    fn statuses_serialise_with_a_tag() {
        let audit = TemplateAudit {
            template_id: "t".to_owned(),
            status: AuditStatus::Skipped {
                reason: "none".to_owned(),
            },
        };
        let value = serde_json::to_value(&audit).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["template_id"], "t");
    }
}
