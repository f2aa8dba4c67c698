//! # Schema Registry
//!
//! Named, immutable schemas, typically loaded once from a directory of
//! descriptor documents and shared behind an `Arc` for the life of the
//! process.
//!
//! A document's identifier is its file stem: `schemas/users.yaml` registers
//! schema `users`. Record references between documents are resolved after
//! every document is loaded, so load order does not matter.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use params_core::ConfigurationError;
use serde_json::Value as Json;

use crate::compile::Compiler;
use crate::descriptor::{Kind, Schema};
use crate::document::{load_document, DocumentChecker, DocumentFormat};
use crate::functions::FunctionRegistry;

/// Immutable map of schema identifier → schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under `id`, replacing any previous one.
    pub fn insert(&mut self, id: impl Into<String>, schema: Schema) -> &mut Self {
        self.schemas.insert(id.into(), Arc::new(schema));
        self
    }

    /// Load every `*.yaml`, `*.yml` and `*.json` document in `dir`.
    ///
    /// Each document is structurally checked, compiled, and finally every
    /// record reference is resolved against the loaded set.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] encountered, including two
    /// documents sharing a file stem.
    pub fn load_dir(
        dir: impl AsRef<Path>,
        functions: &FunctionRegistry,
    ) -> Result<Self, ConfigurationError> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && DocumentFormat::from_path(p).is_some())
            .collect();
        paths.sort();

        let checker = DocumentChecker::new()?;
        let compiler = Compiler::new(functions);
        let mut registry = Self::new();
        for path in &paths {
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| ConfigurationError::DocumentLoad {
                    path: path.display().to_string(),
                    reason: "file name is not valid UTF-8".into(),
                })?
                .to_string();
            if registry.schemas.contains_key(&id) {
                return Err(ConfigurationError::DocumentLoad {
                    path: path.display().to_string(),
                    reason: format!("schema '{id}' is already defined by another document"),
                });
            }
            let doc = load_document(path)?;
            checker.check(&path.display().to_string(), &doc)?;
            let schema = compiler.compile_schema(&doc)?;
            tracing::debug!(schema = %id, fields = schema.len(), "loaded descriptor document");
            registry.insert(id, schema);
        }

        registry.check_references()?;
        tracing::info!(dir = %dir.display(), schemas = registry.len(), "schema registry loaded");
        Ok(registry)
    }

    /// Build a registry from in-memory documents.
    ///
    /// # Errors
    ///
    /// As for [`SchemaRegistry::load_dir`].
    pub fn from_documents<'d, I>(
        documents: I,
        functions: &FunctionRegistry,
    ) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (&'d str, &'d Json)>,
    {
        let checker = DocumentChecker::new()?;
        let compiler = Compiler::new(functions);
        let mut registry = Self::new();
        for (id, doc) in documents {
            checker.check(id, doc)?;
            registry.insert(id, compiler.compile_schema(doc)?);
        }
        registry.check_references()?;
        Ok(registry)
    }

    /// Look up a schema.
    pub fn get(&self, id: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Number of schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Resolve every record reference in every schema.
    ///
    /// A whole-record reference needs the target schema; a single-field
    /// reference also needs that field to be primitive.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownSchema`] or
    /// [`ConfigurationError::UnknownSchemaField`], wrapped with the owning
    /// schema and field path.
    pub fn check_references(&self) -> Result<(), ConfigurationError> {
        for (owner, schema) in &self.schemas {
            for site in schema.external_refs() {
                self.resolve(&site.schema, site.field.as_deref())
                    .map_err(|e| e.in_field(format!("{owner}.{}", site.path)))?;
            }
        }
        Ok(())
    }

    fn resolve(&self, schema: &str, field: Option<&str>) -> Result<(), ConfigurationError> {
        let target = self.get(schema).ok_or_else(|| ConfigurationError::UnknownSchema {
            schema: schema.to_string(),
        })?;
        let Some(field) = field else {
            return Ok(());
        };
        match target.get(field).map(|f| f.descriptor().kind()) {
            Some(Kind::Primitive(_)) => Ok(()),
            _ => Err(ConfigurationError::UnknownSchemaField {
                schema: schema.to_string(),
                field: field.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_documents_resolves_references() {
        let users = json!({"email": {"type": "string", "format": "@"}, "name": "string"});
        let posts = json!({
            "author": {"type": "record", "schema": "users", "field": "email"},
            "editor": {"type": "record", "schema": "users"}
        });
        let functions = FunctionRegistry::new();
        let registry =
            SchemaRegistry::from_documents([("users", &users), ("posts", &posts)], &functions)
                .unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["posts", "users"]);
        assert_eq!(registry.get("users").unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_schema_reference() {
        let posts = json!({"author": {"type": "record", "schema": "people"}});
        let err = SchemaRegistry::from_documents([("posts", &posts)], &FunctionRegistry::new())
            .unwrap_err();
        assert!(matches!(err.root_cause(), ConfigurationError::UnknownSchema { schema } if schema == "people"));
        assert!(err.to_string().contains("posts.author"));
    }

    #[test]
    fn test_reference_to_non_primitive_field() {
        let users = json!({"roles": {"type": "array", "items": "string"}});
        let posts = json!({"role": {"type": "record", "schema": "users", "field": "roles"}});
        let err = SchemaRegistry::from_documents(
            [("users", &users), ("posts", &posts)],
            &FunctionRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ConfigurationError::UnknownSchemaField { .. }
        ));
    }

    #[test]
    fn test_structural_check_runs_before_compile() {
        let bad = json!({"name": {"type": "string", "lenght": 3}});
        let err = SchemaRegistry::from_documents([("bad", &bad)], &FunctionRegistry::new())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::Document { .. }));
    }
}
