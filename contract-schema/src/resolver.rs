//! Loads schema documents and expands `$ref` pointers.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use contract_primitives::DocumentPath;
use contract_store::{DocumentStore, StoreError, StoredDocument};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::document::{SchemaDocument, unresolved_refs};
use crate::error::{SchemaError, SchemaResult};

/// File suffixes recognised as schema documents.
pub const SCHEMA_SUFFIXES: &[&str] = &[".yaml", ".yml", ".json"];

/// Resolves schema references against a [`DocumentStore`].
///
/// Internal references (`#/definitions/x`) and relative cross-document
/// references (`../entities/company.schema.yaml`, optionally with a
/// `#/pointer` fragment) are supported. Remote schemes are rejected, as are
/// reference cycles, since a cyclic schema has no finite expansion.
#[derive(Clone)]
pub struct SchemaResolver {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver").finish_non_exhaustive()
    }
}

impl SchemaResolver {
    /// Creates a resolver reading from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Loads `schema_ref` and returns it fully dereferenced.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NotFound`] if the top-level document is missing,
    /// [`SchemaError::Resolution`] if a nested reference is missing, uses an
    /// unsupported scheme or forms a cycle, and parse errors for malformed
    /// documents.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, schema_ref: &str) -> SchemaResult<SchemaDocument> {
        let root = DocumentPath::new(schema_ref).map_err(|err| SchemaError::InvalidReference {
            reference: schema_ref.to_owned(),
            reason: err.to_string(),
        })?;

        let documents = self.collect(&root).await?;
        let mut expander = Expander {
            documents: &documents,
            stack: Vec::new(),
        };
        let source = documents
            .get(&root)
            .ok_or_else(|| SchemaError::NotFound {
                reference: schema_ref.to_owned(),
            })?;
        let schema = expander.expand(&root, source)?;
        debug!(
            schema = %root,
            documents = documents.len(),
            "schema dereferenced"
        );
        Ok(SchemaDocument::new(root, schema))
    }

    /// Lists every schema document below the store root.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn discover(&self) -> SchemaResult<Vec<DocumentPath>> {
        Ok(self.store.list(SCHEMA_SUFFIXES).await?)
    }

    /// Loads every schema document below the store root without dereferencing.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NotAnObject`] if any document is not an object.
    pub async fn load_all(&self) -> SchemaResult<BTreeMap<DocumentPath, Value>> {
        let mut schemas = BTreeMap::new();
        for path in self.discover().await? {
            let document = self.store.read(&path).await?;
            let value = parse_document(&document)?;
            schemas.insert(path, value);
        }
        Ok(schemas)
    }

    /// Loads the root document and every document it transitively references.
    async fn collect(&self, root: &DocumentPath) -> SchemaResult<HashMap<DocumentPath, Value>> {
        let mut documents = HashMap::new();
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(path) = queue.pop_front() {
            if documents.contains_key(&path) {
                continue;
            }
            let stored = match self.store.read(&path).await {
                Ok(stored) => stored,
                Err(StoreError::NotFound { .. }) if &path == root => {
                    return Err(SchemaError::NotFound {
                        reference: root.to_string(),
                    });
                }
                Err(StoreError::NotFound { path: missing }) => {
                    return Err(SchemaError::resolution(
                        root.as_str(),
                        format!("referenced document `{missing}` not found"),
                    ));
                }
                Err(err) => return Err(err.into()),
            };
            let value = parse_document(&stored)?;

            for reference in unresolved_refs(&value) {
                let target = split_reference(&path, &reference)?;
                if !documents.contains_key(&target.document) {
                    queue.push_back(target.document);
                }
            }
            documents.insert(path, value);
        }

        Ok(documents)
    }
}

fn parse_document(document: &StoredDocument) -> SchemaResult<Value> {
    let path = document.path();
    let value: Value = if path.has_extension("json") {
        serde_json::from_str(document.contents()).map_err(|err| SchemaError::Parse {
            path: path.to_string(),
            reason: err.to_string(),
        })?
    } else {
        serde_yaml::from_str(document.contents()).map_err(|err| SchemaError::Parse {
            path: path.to_string(),
            reason: err.to_string(),
        })?
    };

    if !value.is_object() {
        return Err(SchemaError::NotAnObject {
            path: path.to_string(),
        });
    }
    Ok(value)
}

struct RefTarget {
    document: DocumentPath,
    pointer: String,
}

fn split_reference(current: &DocumentPath, reference: &str) -> SchemaResult<RefTarget> {
    let (location, fragment) = reference
        .split_once('#')
        .unwrap_or((reference, ""));

    if location.contains("://") || location.starts_with("urn:") {
        return Err(SchemaError::resolution(
            current.as_str(),
            format!("unsupported reference scheme in `{reference}`"),
        ));
    }
    if !fragment.is_empty() && !fragment.starts_with('/') {
        return Err(SchemaError::resolution(
            current.as_str(),
            format!("unsupported fragment in `{reference}`; only JSON pointers are allowed"),
        ));
    }

    let document = if location.is_empty() {
        current.clone()
    } else {
        current.resolve_sibling(location).map_err(|err| {
            SchemaError::resolution(current.as_str(), format!("bad reference `{reference}`: {err}"))
        })?
    };

    Ok(RefTarget {
        document,
        pointer: fragment.to_owned(),
    })
}

struct Expander<'a> {
    documents: &'a HashMap<DocumentPath, Value>,
    stack: Vec<(DocumentPath, String)>,
}

impl Expander<'_> {
    fn expand(&mut self, current: &DocumentPath, value: &Value) -> SchemaResult<Value> {
        match value {
            Value::Object(map) => match map.get("$ref") {
                Some(Value::String(reference)) => self.expand_reference(current, reference, map),
                _ => {
                    let mut expanded = Map::with_capacity(map.len());
                    for (key, child) in map {
                        expanded.insert(key.clone(), self.expand(current, child)?);
                    }
                    Ok(Value::Object(expanded))
                }
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(current, item))
                .collect::<SchemaResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn expand_reference(
        &mut self,
        current: &DocumentPath,
        reference: &str,
        holder: &Map<String, Value>,
    ) -> SchemaResult<Value> {
        let target = split_reference(current, reference)?;
        let key = (target.document.clone(), target.pointer.clone());
        if self.stack.contains(&key) {
            return Err(SchemaError::resolution(
                current.as_str(),
                format!("reference cycle through `{reference}`"),
            ));
        }

        let document = self.documents.get(&target.document).ok_or_else(|| {
            SchemaError::resolution(
                current.as_str(),
                format!("referenced document `{}` not loaded", target.document),
            )
        })?;
        let referenced = document.pointer(&target.pointer).ok_or_else(|| {
            SchemaError::resolution(
                current.as_str(),
                format!("`{reference}` does not point at anything"),
            )
        })?;

        self.stack.push(key);
        let expanded = self.expand(&target.document, referenced);
        self.stack.pop();
        let mut expanded = expanded?;

        let siblings: Vec<_> = holder.iter().filter(|(key, _)| key.as_str() != "$ref").collect();
        if !siblings.is_empty() {
            if let Value::Object(merged) = &mut expanded {
                for (key, child) in siblings {
                    let child = self.expand(current, child)?;
                    merged.insert(key.clone(), child);
                }
            }
        }
        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use contract_store::FsStore;
    use serde_json::json;

    use super::*;

    fn write(root: &Path, relative: &str, contents: &str) {
        let full = root.join(relative);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }

    fn resolver(root: &Path) -> SchemaResolver {
        SchemaResolver::new(Arc::new(FsStore::new(root)))
    }

    #[tokio::test]
    async fn expands_internal_references() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "internal.schema.yaml",
            r"
type: object
properties:
  price: { $ref: '#/definitions/money' }
  history:
    type: array
    items: { $ref: '#/definitions/money' }
definitions:
  money:
    type: number
",
        );

        let doc = resolver(dir.path())
            .resolve("internal.schema.yaml")
            .await
            .unwrap();
        assert!(unresolved_refs(doc.value()).is_empty());
        assert_eq!(doc.value()["properties"]["price"], json!({ "type": "number" }));
        assert_eq!(
            doc.value()["properties"]["history"]["items"],
            json!({ "type": "number" })
        );
    }

    #[tokio::test]
    async fn expands_cross_document_references() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "stock/entities/company.schema.yaml",
            r"
type: object
required: [name]
properties:
  name: { type: string }
  financials: { $ref: '#/definitions/financials' }
definitions:
  financials:
    type: object
    properties:
      revenue: { type: number }
",
        );
        write(
            dir.path(),
            "stock/analysis/input.schema.yaml",
            r"
type: object
properties:
  company: { $ref: '../entities/company.schema.yaml' }
  revenue: { $ref: '../entities/company.schema.yaml#/definitions/financials/properties/revenue' }
",
        );

        let doc = resolver(dir.path())
            .resolve("stock/analysis/input.schema.yaml")
            .await
            .unwrap();
        let company = &doc.value()["properties"]["company"];
        assert_eq!(company["required"], json!(["name"]));
        assert_eq!(
            company["properties"]["financials"]["properties"]["revenue"],
            json!({ "type": "number" })
        );
        assert_eq!(doc.value()["properties"]["revenue"], json!({ "type": "number" }));
        assert!(unresolved_refs(doc.value()).is_empty());
    }

    #[tokio::test]
    async fn dereferencing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.schema.yaml",
            "properties: { x: { $ref: '#/definitions/x' } }\ndefinitions: { x: { type: string } }\n",
        );
        let resolver = resolver(dir.path());
        let first = resolver.resolve("a.schema.yaml").await.unwrap();

        write(
            dir.path(),
            "b.schema.json",
            &serde_json::to_string(first.value()).unwrap(),
        );
        let second = resolver.resolve("b.schema.json").await.unwrap();
        assert_eq!(first.value(), second.value());
    }

    #[tokio::test]
    async fn sibling_keywords_override_referenced_ones() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "s.yaml",
            "properties:\n  a: { $ref: '#/definitions/a', description: local }\ndefinitions:\n  a: { type: string, description: shared }\n",
        );
        let doc = resolver(dir.path()).resolve("s.yaml").await.unwrap();
        assert_eq!(
            doc.value()["properties"]["a"],
            json!({ "type": "string", "description": "local" })
        );
    }

    #[tokio::test]
    async fn missing_top_level_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver(dir.path())
            .resolve("absent.schema.yaml")
            .await
            .expect_err("missing");
        assert!(matches!(err, SchemaError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_nested_document_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "s.yaml", "properties: { a: { $ref: 'gone.yaml' } }\n");
        let err = resolver(dir.path())
            .resolve("s.yaml")
            .await
            .expect_err("nested missing");
        assert!(matches!(err, SchemaError::Resolution { .. }));
    }

    #[tokio::test]
    async fn missing_pointer_target_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "s.yaml", "properties: { a: { $ref: '#/definitions/nope' } }\n");
        let err = resolver(dir.path())
            .resolve("s.yaml")
            .await
            .expect_err("bad pointer");
        assert!(matches!(err, SchemaError::Resolution { .. }));
    }

    #[tokio::test]
    async fn rejects_remote_references_and_cycles() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "remote.yaml",
            "properties: { a: { $ref: 'https://example.com/s.json' } }\n",
        );
        write(
            dir.path(),
            "cycle.yaml",
            "properties: { node: { $ref: '#/definitions/node' } }\ndefinitions:\n  node:\n    properties:\n      child: { $ref: '#/definitions/node' }\n",
        );
        let resolver = resolver(dir.path());

        let err = resolver.resolve("remote.yaml").await.expect_err("remote");
        assert!(matches!(err, SchemaError::Resolution { .. }));
        let err = resolver.resolve("cycle.yaml").await.expect_err("cycle");
        assert!(matches!(err, SchemaError::Resolution { ref reason, .. } if reason.contains("cycle")));
    }

    #[tokio::test]
    async fn rejects_non_object_documents_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "list.yaml", "- 1\n- 2\n");
        let resolver = resolver(dir.path());

        let err = resolver.resolve("list.yaml").await.expect_err("array");
        assert!(matches!(err, SchemaError::NotAnObject { .. }));
        let err = resolver.resolve("../escape.yaml").await.expect_err("traversal");
        assert!(matches!(err, SchemaError::InvalidReference { .. }));
    }

    #[tokio::test]
    async fn discovers_and_loads_all_schemas() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stock/a.schema.yaml", "type: object\n");
        write(dir.path(), "stock/b.schema.json", "{\"type\": \"object\"}");
        write(dir.path(), "README.md", "# not a schema");

        let all = resolver(dir.path()).load_all().await.unwrap();
        let keys: Vec<_> = all.keys().map(DocumentPath::as_str).collect();
        assert_eq!(keys, ["stock/a.schema.yaml", "stock/b.schema.json"]);
    }
}
