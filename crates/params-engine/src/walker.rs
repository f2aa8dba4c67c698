//! # Recursive Walker
//!
//! Validates one map-shaped payload node against a [`Schema`] and recurses
//! into composite fields. Each node goes through the same phases:
//!
//! ```text
//! Partition → CastSelf → RunRules → DescendComposite → DelegateExternal → Merge
//! ```
//!
//! - **Partition** sorts fields into primitive, composite and record buckets.
//! - **CastSelf** checks presence and casts primitive fields. A field that
//!   fails to cast runs no rules.
//! - **RunRules** applies rules to the primitive fields that cast.
//! - **DescendComposite** recurses into arrays, nested maps, map values and
//!   joined strings. Rules on the composite itself run only when its
//!   contents produced no errors.
//! - **DelegateExternal** hands record references to the [`SchemaDelegate`].
//!   Single-field references to the same schema share one delegate call.
//! - **Merge** collects changes and path-prefixed errors, in phase order.
//!
//! Absent values (missing, `null`, blank strings unless disabled, empty
//! map-values maps) never reach a cast: they are either a required error,
//! a default, or skipped.

use std::collections::HashMap;

use params_core::{
    Changes, ConfigurationError, FieldError, FieldPath, PathSegment, PrimitiveKind, Validation,
    Value,
};
use params_schema::{Bucket, Field, Kind, Schema, Splitter, TypeDescriptor};
use serde_json::{Map, Value as Json};

use crate::accumulator::ErrorAccumulator;
use crate::delegate::{DelegateError, DelegateOutcome, SchemaDelegate};
use crate::rules::{self, RuleContext};
use crate::ParseOptions;

/// Changes and errors of one walked node. Errors are relative to the node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Walked {
    /// Coerced values of the fields that were present and cast.
    pub changes: Changes,
    /// Every violation found beneath the node, in report order.
    pub errors: Vec<FieldError>,
}

/// Result of descending into one value.
#[derive(Debug)]
struct Descent {
    value: Value,
    errors: Vec<FieldError>,
}

impl Descent {
    fn ok(value: Value) -> Self {
        Self {
            value,
            errors: Vec::new(),
        }
    }

    fn failed(error: FieldError) -> Self {
        Self {
            value: Value::Null,
            errors: vec![error],
        }
    }
}

/// One delegate call for single-field record references.
struct Batch<'s> {
    schema: &'s str,
    raw: Map<String, Json>,
    members: Vec<(&'s Field, &'s str)>,
}

/// Walks payloads against schemas.
#[derive(Clone, Copy)]
pub struct Walker<'a> {
    delegate: Option<&'a dyn SchemaDelegate>,
    options: ParseOptions,
}

impl<'a> Walker<'a> {
    /// A walker resolving record references through `delegate`.
    pub fn new(delegate: Option<&'a dyn SchemaDelegate>, options: ParseOptions) -> Self {
        Self { delegate, options }
    }

    /// Walk a whole payload. A non-object payload is one cast error at the root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for record references that cannot be
    /// resolved. Payload problems are never errors here.
    pub fn walk_root(&self, schema: &Schema, payload: &Json) -> Result<Walked, ConfigurationError> {
        match payload.as_object() {
            Some(raw) => self.walk_map(schema, raw),
            None => Ok(Walked {
                changes: Changes::new(),
                errors: vec![FieldError::cast("map")],
            }),
        }
    }

    /// Walk one map node.
    ///
    /// # Errors
    ///
    /// As for [`Walker::walk_root`].
    pub fn walk_map(
        &self,
        schema: &Schema,
        raw: &Map<String, Json>,
    ) -> Result<Walked, ConfigurationError> {
        // Partition
        let mut own = Vec::new();
        let mut composite = Vec::new();
        let mut external = Vec::new();
        for field in schema.fields() {
            match field.descriptor().kind().bucket() {
                Bucket::SelfField => own.push(field),
                Bucket::Composite => composite.push(field),
                Bucket::External => external.push(field),
            }
        }

        let mut changes = Changes::new();
        let mut acc = ErrorAccumulator::new();

        // CastSelf
        let mut cast = Vec::with_capacity(own.len());
        for field in own {
            let Some(value) = self.present(field, raw, &mut changes, &mut acc) else {
                continue;
            };
            match field.descriptor().cast_raw(value) {
                Ok(coerced) => cast.push((field, coerced)),
                Err(e) => {
                    tracing::trace!(field = field.name(), error = %e, "cast failed");
                    acc.merge(segment(field), [e.to_field_error()]);
                }
            }
        }

        // RunRules
        for (field, value) in &cast {
            let ctx = RuleContext::field(field.name(), raw, self.options.empty_string_as_nil);
            acc.extend(rules::apply_all(field.descriptor(), value, &ctx));
        }
        changes.extend(
            cast.into_iter()
                .map(|(field, value)| (field.name().to_string(), value)),
        );

        // DescendComposite
        for field in composite {
            let Some(value) = self.present(field, raw, &mut changes, &mut acc) else {
                continue;
            };
            let descent = self.descend(field.descriptor(), value, field.name())?;
            acc.merge(segment(field), descent.errors);
            changes.insert(field.name().to_string(), descent.value);
        }

        // DelegateExternal
        let mut single = self.delegate_fields(&external, raw)?;
        for field in external {
            let Some(value) = self.present(field, raw, &mut changes, &mut acc) else {
                continue;
            };
            let descent = match single.remove(field.name()) {
                Some(descent) => self.field_rules(field, descent, raw),
                None => self.descend(field.descriptor(), value, field.name())?,
            };
            acc.merge(segment(field), descent.errors);
            if !descent.value.is_null() {
                changes.insert(field.name().to_string(), descent.value);
            }
        }

        // Merge
        tracing::debug!(
            fields = schema.len(),
            changes = changes.len(),
            errors = acc.len(),
            "walked map node"
        );
        Ok(Walked {
            changes,
            errors: acc.into_errors(),
        })
    }

    /// The raw value of `field` if present. Otherwise records a required
    /// error or inserts the default, and returns `None`.
    fn present<'j>(
        &self,
        field: &Field,
        raw: &'j Map<String, Json>,
        changes: &mut Changes,
        acc: &mut ErrorAccumulator,
    ) -> Option<&'j Json> {
        let desc = field.descriptor();
        let value = self.lookup(field, raw);
        if value.is_none() {
            if desc.is_required() {
                tracing::trace!(field = field.name(), "required field absent");
                acc.push(FieldError::required().at(FieldPath::field(field.name())));
            } else if let Some(default) = desc.default() {
                changes.insert(field.name().to_string(), default);
            }
        }
        value
    }

    fn lookup<'j>(&self, field: &Field, raw: &'j Map<String, Json>) -> Option<&'j Json> {
        raw.get(field.source_key())
            .filter(|value| !self.is_absent(field.descriptor(), value))
    }

    fn is_absent(&self, desc: &TypeDescriptor, raw: &Json) -> bool {
        if rules::is_blank(raw, self.options.empty_string_as_nil) {
            return true;
        }
        matches!((desc.kind(), raw), (Kind::MapValuesOf(_), Json::Object(m)) if m.is_empty())
    }

    // ─── Descent ─────────────────────────────────────────────────────

    /// Validate a present value against any descriptor, returning errors
    /// relative to the value.
    fn descend(
        &self,
        desc: &TypeDescriptor,
        raw: &Json,
        field: &str,
    ) -> Result<Descent, ConfigurationError> {
        let mut descent = match desc.kind() {
            Kind::Primitive(_) => match desc.cast_raw(raw) {
                Ok(value) => Descent::ok(value),
                Err(e) => return Ok(Descent::failed(e.to_field_error())),
            },
            Kind::ArrayOf(item) => match raw.as_array() {
                Some(elements) => self.descend_items(item, elements)?,
                None => return Ok(Descent::failed(FieldError::cast("array"))),
            },
            Kind::MapOf(schema) => match raw.as_object() {
                Some(obj) => {
                    let walked = self.walk_map(schema, obj)?;
                    Descent {
                        value: Value::Object(walked.changes),
                        errors: walked.errors,
                    }
                }
                None => return Ok(Descent::failed(FieldError::cast("map"))),
            },
            Kind::MapValuesOf(value_desc) => match raw.as_object() {
                Some(obj) => self.descend_values(value_desc, obj)?,
                None => return Ok(Descent::failed(FieldError::cast("map"))),
            },
            Kind::JoinedString { item, splitter } => self.descend_joined(item, splitter, raw)?,
            Kind::ExternalRef { schema, field: None } => match raw.as_object() {
                Some(obj) => self.delegate_record(schema, obj)?,
                None => return Ok(Descent::failed(FieldError::cast("map"))),
            },
            Kind::ExternalRef {
                schema,
                field: Some(record_field),
            } => self.delegate_single(schema, record_field, raw)?,
        };

        if descent.errors.is_empty() {
            let ctx = RuleContext {
                field,
                ..RuleContext::element(self.options.empty_string_as_nil)
            };
            descent.errors = rules::apply_all(desc, &descent.value, &ctx);
        }
        Ok(descent)
    }

    fn descend_items(
        &self,
        item: &TypeDescriptor,
        elements: &[Json],
    ) -> Result<Descent, ConfigurationError> {
        let mut values = Vec::with_capacity(elements.len());
        let mut acc = ErrorAccumulator::new();
        for (i, element) in elements.iter().enumerate() {
            if self.is_absent(item, element) {
                if item.is_required() {
                    acc.push(FieldError::required().prefixed(PathSegment::Index(i)));
                }
                values.push(Value::Null);
                continue;
            }
            let descent = self.descend(item, element, "")?;
            acc.merge(PathSegment::Index(i), descent.errors);
            values.push(descent.value);
        }
        Ok(Descent {
            value: Value::Array(values),
            errors: acc.into_errors(),
        })
    }

    fn descend_values(
        &self,
        value_desc: &TypeDescriptor,
        obj: &Map<String, Json>,
    ) -> Result<Descent, ConfigurationError> {
        let mut values = Changes::new();
        let mut acc = ErrorAccumulator::new();
        for (key, raw) in obj {
            let segment = PathSegment::Key(key.clone());
            if self.is_absent(value_desc, raw) {
                if value_desc.is_required() {
                    acc.push(FieldError::required().prefixed(segment));
                }
                continue;
            }
            let descent = self.descend(value_desc, raw, "")?;
            acc.merge(segment, descent.errors);
            values.insert(key.clone(), descent.value);
        }
        Ok(Descent {
            value: Value::Object(values),
            errors: acc.into_errors(),
        })
    }

    fn descend_joined(
        &self,
        item: &TypeDescriptor,
        splitter: &Splitter,
        raw: &Json,
    ) -> Result<Descent, ConfigurationError> {
        let tokens: Vec<Json> = match raw {
            Json::String(s) => splitter
                .split(s)
                .into_iter()
                .map(|t| Json::String(t.to_string()))
                .collect(),
            Json::Array(parts) => {
                let Some(parts) = parts.iter().map(Json::as_str).collect::<Option<Vec<_>>>() else {
                    return Ok(Descent::failed(FieldError::cast("joined_string")));
                };
                parts
                    .into_iter()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| Json::String(t.to_string()))
                    .collect()
            }
            _ => return Ok(Descent::failed(FieldError::cast("joined_string"))),
        };

        let mut descent = self.descend_items(item, &tokens)?;
        if descent
            .errors
            .iter()
            .any(|e| e.validation() == Validation::Cast)
        {
            descent.errors.insert(0, FieldError::cast("joined_string"));
        }
        Ok(descent)
    }

    // ─── Delegation ──────────────────────────────────────────────────

    fn delegate_for(&self, schema: &str) -> Result<&'a dyn SchemaDelegate, ConfigurationError> {
        self.delegate.ok_or_else(|| ConfigurationError::MissingDelegate {
            schema: schema.to_string(),
        })
    }

    /// Primitive kind of a referenced record field, or a configuration error.
    fn record_field_kind(
        &self,
        delegate: &dyn SchemaDelegate,
        schema: &str,
        field: &str,
    ) -> Result<PrimitiveKind, ConfigurationError> {
        if !delegate.has_schema(schema) {
            return Err(ConfigurationError::UnknownSchema {
                schema: schema.to_string(),
            });
        }
        delegate
            .field_primitive_type(schema, field)
            .ok_or_else(|| ConfigurationError::UnknownSchemaField {
                schema: schema.to_string(),
                field: field.to_string(),
            })
    }

    /// Whole-record reference.
    fn delegate_record(
        &self,
        schema: &str,
        obj: &Map<String, Json>,
    ) -> Result<Descent, ConfigurationError> {
        let delegate = self.delegate_for(schema)?;
        tracing::debug!(schema, "delegating record");
        match delegate.validate_record(schema, obj) {
            Ok(outcome) => Ok(Descent {
                value: Value::Object(outcome.changes),
                errors: outcome.errors,
            }),
            Err(e) => Ok(Descent::failed(delegate_failure(e)?)),
        }
    }

    /// Single-field reference outside a map node, validated on its own.
    fn delegate_single(
        &self,
        schema: &str,
        record_field: &str,
        raw: &Json,
    ) -> Result<Descent, ConfigurationError> {
        let delegate = self.delegate_for(schema)?;
        let kind = self.record_field_kind(delegate, schema, record_field)?;
        let mut obj = Map::new();
        obj.insert(delegate.field_source_key(schema, record_field), raw.clone());
        match delegate.validate_record(schema, &obj) {
            Ok(outcome) => Ok(redistribute(&outcome, record_field, kind)),
            Err(e) => Ok(Descent::failed(delegate_failure(e)?)),
        }
    }

    /// Batch the single-field references of one map node, one delegate
    /// call per schema. A record field referenced twice goes to a second
    /// batch, so each batch maps record fields to exactly one local field.
    fn delegate_fields<'s>(
        &self,
        fields: &[&'s Field],
        raw: &Map<String, Json>,
    ) -> Result<HashMap<&'s str, Descent>, ConfigurationError> {
        let mut batches: Vec<Batch<'s>> = Vec::new();
        for &field in fields {
            let Kind::ExternalRef {
                schema,
                field: Some(record_field),
            } = field.descriptor().kind()
            else {
                continue;
            };
            let schema = schema.as_str();
            let Some(value) = self.lookup(field, raw) else {
                continue;
            };
            let record_field = record_field.as_str();
            let key = self.delegate_for(schema)?.field_source_key(schema, record_field);
            match batches
                .iter_mut()
                .find(|b| b.schema == schema && !b.raw.contains_key(&key))
            {
                Some(batch) => {
                    batch.raw.insert(key, value.clone());
                    batch.members.push((field, record_field));
                }
                None => {
                    let mut batch_raw = Map::new();
                    batch_raw.insert(key, value.clone());
                    batches.push(Batch {
                        schema,
                        raw: batch_raw,
                        members: vec![(field, record_field)],
                    });
                }
            }
        }

        let mut results = HashMap::new();
        for batch in batches {
            let delegate = self.delegate_for(batch.schema)?;
            tracing::debug!(
                schema = batch.schema,
                fields = batch.members.len(),
                "delegating record fields"
            );
            match delegate.validate_record(batch.schema, &batch.raw) {
                Ok(outcome) => {
                    for (field, record_field) in batch.members {
                        let kind = self.record_field_kind(delegate, batch.schema, record_field)?;
                        results.insert(field.name(), redistribute(&outcome, record_field, kind));
                    }
                }
                Err(e) => {
                    let error = delegate_failure(e)?;
                    for (field, _) in batch.members {
                        results.insert(field.name(), Descent::failed(error.clone()));
                    }
                }
            }
        }
        Ok(results)
    }

    /// Apply a record-field reference's own rules once the delegate accepted it.
    fn field_rules(&self, field: &Field, mut descent: Descent, raw: &Map<String, Json>) -> Descent {
        if descent.errors.is_empty() && !descent.value.is_null() {
            let ctx = RuleContext {
                path: FieldPath::root(),
                ..RuleContext::field(field.name(), raw, self.options.empty_string_as_nil)
            };
            descent.errors = rules::apply_all(field.descriptor(), &descent.value, &ctx);
        }
        descent
    }
}

fn segment(field: &Field) -> PathSegment {
    PathSegment::Field(field.name().to_string())
}

/// Pick one record field's value and errors out of a delegate outcome.
///
/// Errors on other record fields are dropped; cast errors are re-tagged with
/// the record field's primitive type.
fn redistribute(outcome: &DelegateOutcome, record_field: &str, kind: PrimitiveKind) -> Descent {
    let errors = outcome
        .errors
        .iter()
        .filter(|e| matches!(e.path.first(), Some(PathSegment::Field(f)) if f == record_field))
        .map(|e| {
            let mut e = e.clone();
            e.path.pop_first();
            if e.validation() == Validation::Cast && e.path.is_root() {
                e = e.with("type", kind.as_str());
            }
            e
        })
        .collect();
    Descent {
        value: outcome
            .changes
            .get(record_field)
            .cloned()
            .unwrap_or(Value::Null),
        errors,
    }
}

/// Map a delegate failure to a field error, or abort for configuration problems.
fn delegate_failure(err: DelegateError) -> Result<FieldError, ConfigurationError> {
    match err {
        DelegateError::UnknownSchema(schema) => Err(ConfigurationError::UnknownSchema { schema }),
        DelegateError::Configuration { source, .. } => Err(source),
        DelegateError::Failed(reason) => {
            tracing::warn!(%reason, "schema delegate failed");
            Ok(FieldError::new(Validation::Delegate, "could not be validated").with("reason", reason))
        }
    }
}
