//! # External Schema Delegate
//!
//! Record references (`type: record`) are validated by whoever owns the
//! record schema. The walker talks to that owner through [`SchemaDelegate`]
//! and splices the outcome back into its own path scheme.
//!
//! [`RecordSchemas`] is the in-process implementation: record schemas live
//! in a [`SchemaRegistry`] and are validated by the engine itself.

use std::sync::Arc;

use params_core::{Changes, ConfigurationError, FieldError, PrimitiveKind};
use params_schema::{Kind, SchemaRegistry};
use serde_json::{Map, Value as Json};
use thiserror::Error;

use crate::walker::Walker;
use crate::ParseOptions;

/// Changes and errors of one record validation. Errors carry paths relative
/// to the record; both may be non-empty at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelegateOutcome {
    /// Coerced fields that were present and cast.
    pub changes: Changes,
    /// Violations, relative to the record root.
    pub errors: Vec<FieldError>,
}

/// A delegate could not validate a record.
#[derive(Error, Debug)]
pub enum DelegateError {
    /// The schema identifier is unknown. Aborts the call.
    #[error("unknown schema {0:?}")]
    UnknownSchema(String),

    /// The record schema itself is misconfigured. Aborts the call.
    #[error("schema {schema:?} is misconfigured: {source}")]
    Configuration {
        /// The record schema.
        schema: String,
        /// Underlying problem.
        #[source]
        source: ConfigurationError,
    },

    /// The delegate failed for this record. Reported as a field error.
    #[error("{0}")]
    Failed(String),
}

/// Owner of record schemas referenced by `ExternalRef` descriptors.
pub trait SchemaDelegate: Send + Sync {
    /// Validate `raw` against record schema `schema`.
    fn validate_record(
        &self,
        schema: &str,
        raw: &Map<String, Json>,
    ) -> Result<DelegateOutcome, DelegateError>;

    /// Primitive kind of `field` on `schema`, or `None` if there is no such
    /// primitive field.
    fn field_primitive_type(&self, schema: &str, field: &str) -> Option<PrimitiveKind>;

    /// Payload key that `field` of `schema` is read from. Record fields
    /// referenced by a descriptor are handed to [`validate_record`] under
    /// this key.
    ///
    /// [`validate_record`]: SchemaDelegate::validate_record
    fn field_source_key(&self, _schema: &str, field: &str) -> String {
        field.to_string()
    }

    /// Whether `schema` is known.
    fn has_schema(&self, schema: &str) -> bool;
}

/// Registry-backed delegate validating records with the engine.
#[derive(Debug, Clone)]
pub struct RecordSchemas {
    registry: Arc<SchemaRegistry>,
    options: ParseOptions,
}

impl RecordSchemas {
    /// Delegate over `registry` with default options.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            options: ParseOptions::default(),
        }
    }

    /// Use `options` for record validation.
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }
}

impl SchemaDelegate for RecordSchemas {
    fn validate_record(
        &self,
        schema: &str,
        raw: &Map<String, Json>,
    ) -> Result<DelegateOutcome, DelegateError> {
        let record = self
            .registry
            .get(schema)
            .ok_or_else(|| DelegateError::UnknownSchema(schema.to_string()))?;
        tracing::trace!(schema, fields = raw.len(), "validating record");
        let walked = Walker::new(Some(self as &dyn SchemaDelegate), self.options)
            .walk_map(record, raw)
            .map_err(|source| DelegateError::Configuration {
                schema: schema.to_string(),
                source,
            })?;
        Ok(DelegateOutcome {
            changes: walked.changes,
            errors: walked.errors,
        })
    }

    fn field_primitive_type(&self, schema: &str, field: &str) -> Option<PrimitiveKind> {
        match self.registry.get(schema)?.get(field)?.descriptor().kind() {
            Kind::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    fn field_source_key(&self, schema: &str, field: &str) -> String {
        self.registry
            .get(schema)
            .and_then(|record| record.get(field))
            .map_or(field, |f| f.source_key())
            .to_string()
    }

    fn has_schema(&self, schema: &str) -> bool {
        self.registry.get(schema).is_some()
    }
}
