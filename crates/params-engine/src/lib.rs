//! # params-engine — Recursive Validation & Coercion
//!
//! Walks a raw JSON payload against a [`Schema`], casting every field to its
//! declared kind, applying rules, recursing into composites and delegating
//! record references. The outcome is a [`ParseResult`]: either the coerced
//! changes or every violation found, each tagged with the path of the
//! offending value.
//!
//! ## Entry points
//!
//! - [`parse`] validates one payload against a schema with no delegate.
//! - [`Validator`] binds a schema, an optional [`SchemaDelegate`] and
//!   [`ParseOptions`], and validates single payloads or batches.
//! - [`get_validated_changes`] turns a result into `Result<Changes, ValidationFailed>`.
//!
//! ## Errors
//!
//! Payload problems are data, reported in [`ParseResult::Invalid`]. A
//! [`ConfigurationError`] means the schema or delegate setup is broken and
//! aborts the call.
//!
//! ## Crate Policy
//!
//! - Synchronous and allocation-only; no I/O.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod accumulator;
pub mod delegate;
pub mod result;
pub mod rules;
pub mod walker;

use std::fmt;
use std::sync::Arc;

use params_core::{Changes, ConfigurationError};
use params_schema::Schema;
use serde::Deserialize;
use serde_json::Value as Json;

pub use accumulator::{dedup, ErrorAccumulator};
pub use delegate::{DelegateError, DelegateOutcome, RecordSchemas, SchemaDelegate};
pub use result::{get_validated_changes, ParseResult};
pub use walker::{Walked, Walker};

/// Per-call parsing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Treat strings that are empty after trimming as absent.
    pub empty_string_as_nil: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            empty_string_as_nil: true,
        }
    }
}

/// Validate `payload` against `schema` without a delegate.
///
/// # Errors
///
/// Returns [`ConfigurationError::MissingDelegate`] if the schema references
/// a record schema that the payload actually exercises.
pub fn parse(
    schema: &Schema,
    payload: &Json,
    options: ParseOptions,
) -> Result<ParseResult, ConfigurationError> {
    let walked = Walker::new(None, options).walk_root(schema, payload)?;
    Ok(finish(walked))
}

/// Check that every record reference in `schema` resolves through `delegate`.
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownSchema`] or
/// [`ConfigurationError::UnknownSchemaField`], located at the referencing field.
pub fn check_references(
    schema: &Schema,
    delegate: &dyn SchemaDelegate,
) -> Result<(), ConfigurationError> {
    for site in schema.external_refs() {
        if !delegate.has_schema(&site.schema) {
            return Err(ConfigurationError::UnknownSchema {
                schema: site.schema.clone(),
            }
            .in_field(site.path.to_string()));
        }
        if let Some(field) = &site.field {
            if delegate.field_primitive_type(&site.schema, field).is_none() {
                return Err(ConfigurationError::UnknownSchemaField {
                    schema: site.schema.clone(),
                    field: field.clone(),
                }
                .in_field(site.path.to_string()));
            }
        }
    }
    Ok(())
}

fn finish(walked: Walked) -> ParseResult {
    let mut acc = ErrorAccumulator::new();
    acc.extend(walked.errors);
    acc.finish(walked.changes)
}

/// A schema bound to its delegate and options.
#[derive(Clone)]
pub struct Validator {
    schema: Arc<Schema>,
    delegate: Option<Arc<dyn SchemaDelegate>>,
    options: ParseOptions,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("fields", &self.schema.len())
            .field("delegate", &self.delegate.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Validator {
    /// A validator with default options and no delegate.
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            schema: schema.into(),
            delegate: None,
            options: ParseOptions::default(),
        }
    }

    /// Resolve record references through `delegate`.
    ///
    /// # Errors
    ///
    /// Fails if any reference in the schema does not resolve, see
    /// [`check_references`].
    pub fn with_delegate(
        mut self,
        delegate: Arc<dyn SchemaDelegate>,
    ) -> Result<Self, ConfigurationError> {
        check_references(&self.schema, delegate.as_ref())?;
        self.delegate = Some(delegate);
        Ok(self)
    }

    /// Replace the parsing options.
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// The bound schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The parsing options.
    pub fn options(&self) -> ParseOptions {
        self.options
    }

    fn walker(&self) -> Walker<'_> {
        Walker::new(self.delegate.as_deref(), self.options)
    }

    /// Validate one payload.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a record reference cannot be
    /// resolved at call time.
    pub fn parse(&self, payload: &Json) -> Result<ParseResult, ConfigurationError> {
        let walked = self.walker().walk_root(&self.schema, payload)?;
        tracing::debug!(
            changes = walked.changes.len(),
            errors = walked.errors.len(),
            "parsed payload"
        );
        Ok(finish(walked))
    }

    /// Validate independent payloads as one batch.
    ///
    /// Valid only if every payload is valid. Errors keep the paths they have
    /// within their own payload and are de-duplicated across the batch, so a
    /// mistake repeated in every payload is reported once.
    ///
    /// # Errors
    ///
    /// As for [`Validator::parse`].
    pub fn parse_many(
        &self,
        payloads: &[Json],
    ) -> Result<ParseResult<Vec<Changes>>, ConfigurationError> {
        let walker = self.walker();
        let mut all = Vec::with_capacity(payloads.len());
        let mut errors = Vec::new();
        for payload in payloads {
            let walked = walker.walk_root(&self.schema, payload)?;
            errors.extend(walked.errors);
            all.push(walked.changes);
        }
        let total = errors.len();
        let mut acc = ErrorAccumulator::new();
        acc.extend(dedup(errors));
        tracing::debug!(
            payloads = payloads.len(),
            errors = acc.len(),
            duplicates = total - acc.len(),
            "parsed batch"
        );
        Ok(acc.finish(all))
    }
}

