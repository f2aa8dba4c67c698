//! # Error Types — Field Errors and Configuration Errors
//!
//! Two families of failure exist and they never mix:
//!
//! - **Per-field violations** ([`FieldError`]) are recovered locally and
//!   accumulated, so a single validation call always reports the complete set
//!   of problems with a payload. Each carries a [`FieldPath`], a human-readable
//!   message and structured metadata naming the [`Validation`] that failed.
//!
//! - **Configuration errors** ([`ConfigurationError`]) describe a malformed
//!   descriptor or an unresolvable external reference. They are not a property
//!   of the payload, and they are the only failure allowed to abort a call.
//!
//! [`ValidationFailed`] is the fail-fast form of an invalid result, for call
//! sites that prefer `?` over inspecting the result.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::{FieldPath, PathSegment};

// ─── Validation names ────────────────────────────────────────────────

/// The check that produced a [`FieldError`].
///
/// Rule names are a closed set; the walker dispatches on this enum and never
/// synthesizes rule names at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    /// The raw value could not be cast to the declared kind.
    Cast,
    /// A required value was absent.
    Required,
    /// A boolean that must be `true` was not.
    Acceptance,
    /// A user-supplied predicate rejected the value.
    Change,
    /// The `<field>_confirmation` sibling did not match.
    Confirmation,
    /// The value is in a disallowed set.
    Exclusion,
    /// The value did not match a pattern.
    Format,
    /// The value is not in the allowed set.
    Inclusion,
    /// The value is too short or too long.
    Length,
    /// A numeric comparison failed.
    Number,
    /// A collection contains an element outside the allowed set.
    Subset,
    /// The external schema delegate failed.
    Delegate,
}

impl Validation {
    /// Returns the snake_case identifier used in error metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cast => "cast",
            Self::Required => "required",
            Self::Acceptance => "acceptance",
            Self::Change => "change",
            Self::Confirmation => "confirmation",
            Self::Exclusion => "exclusion",
            Self::Format => "format",
            Self::Inclusion => "inclusion",
            Self::Length => "length",
            Self::Number => "number",
            Self::Subset => "subset",
            Self::Delegate => "delegate",
        }
    }

    /// The error category this validation belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cast => ErrorCategory::Cast,
            Self::Required => ErrorCategory::RequiredMissing,
            Self::Delegate => ErrorCategory::Delegate,
            Self::Acceptance
            | Self::Change
            | Self::Confirmation
            | Self::Exclusion
            | Self::Format
            | Self::Inclusion
            | Self::Length
            | Self::Number
            | Self::Subset => ErrorCategory::RuleViolation,
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of field errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Shape or type mismatch.
    Cast,
    /// A semantic rule failed.
    RuleViolation,
    /// A required value was absent. Never a cast failure.
    RequiredMissing,
    /// The external schema delegate failed for this field.
    Delegate,
}

// ─── Field errors ────────────────────────────────────────────────────

/// Structured metadata attached to a [`FieldError`].
///
/// Serializes flat: `{"validation": "length", "kind": "min", "count": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMeta {
    /// The check that failed.
    pub validation: Validation,
    /// Sub-kind of the check (`min`, `less_than`, ...), when it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Any further rule-specific detail (`count`, `number`, `type`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A single violation, qualified by the path of the offending value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Location of the offending value, relative to the node that reported it
    /// until the walk has fully unwound.
    pub path: FieldPath,
    /// Human-readable message.
    pub message: String,
    /// Structured metadata.
    #[serde(flatten)]
    pub meta: ErrorMeta,
}

impl FieldError {
    /// Create an error at the root path.
    pub fn new(validation: Validation, message: impl Into<String>) -> Self {
        Self {
            path: FieldPath::root(),
            message: message.into(),
            meta: ErrorMeta {
                validation,
                kind: None,
                extra: BTreeMap::new(),
            },
        }
    }

    /// A cast failure for the named type.
    pub fn cast(type_name: &str) -> Self {
        Self::new(Validation::Cast, "is invalid").with("type", type_name)
    }

    /// A required value is absent.
    pub fn required() -> Self {
        Self::new(Validation::Required, "can't be blank")
    }

    /// A failure reported by a user predicate.
    pub fn change(message: impl Into<String>) -> Self {
        Self::new(Validation::Change, message)
    }

    /// Set the path.
    pub fn at(mut self, path: FieldPath) -> Self {
        self.path = path;
        self
    }

    /// Set the metadata sub-kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.meta.kind = Some(kind.into());
        self
    }

    /// Add a metadata entry.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.extra.insert(key.to_string(), value.into());
        self
    }

    /// Prefix the path with `segment`, as the walk unwinds one level.
    pub fn prefixed(mut self, segment: PathSegment) -> Self {
        self.path.prefix(segment);
        self
    }

    /// The validation that produced this error.
    pub fn validation(&self) -> Validation {
        self.meta.validation
    }

    /// The error category.
    pub fn category(&self) -> ErrorCategory {
        self.meta.validation.category()
    }

    /// Identity used for batch de-duplication: `(path, validation, kind)`.
    pub fn dedup_key(&self) -> (String, Validation, Option<String>) {
        (
            self.path.to_string(),
            self.meta.validation,
            self.meta.kind.clone(),
        )
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "  (root): {} [{}]", self.message, self.meta.validation)
        } else {
            write!(f, "  {}: {} [{}]", self.path, self.message, self.meta.validation)
        }
    }
}

/// Ordered collection of field errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Returns the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns a slice of all errors.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Iterate the errors in report order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<FieldError> {
        self.errors
    }

    /// Errors whose rendered path equals `path`.
    pub fn at_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.path.to_string() == path)
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// An invalid result converted into an error for fail-fast call sites.
#[derive(Error, Debug, Clone)]
#[error("validation failed with {count} error(s):\n{errors}", count = .errors.len())]
pub struct ValidationFailed {
    /// The full error list.
    pub errors: ValidationErrors,
}

// ─── Configuration errors ────────────────────────────────────────────

/// A malformed descriptor or unresolvable external reference.
///
/// Not recoverable per request: raised when a schema is constructed, or
/// the first time an external reference is exercised if it could not be
/// checked earlier.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Context wrapper naming the field whose descriptor is malformed.
    #[error("field '{field}': {source}")]
    Field {
        /// Field name.
        field: String,
        /// Underlying problem.
        #[source]
        source: Box<ConfigurationError>,
    },

    /// A type name that is not a known primitive or composite kind.
    #[error("unknown type {name:?}")]
    UnknownType {
        /// The unrecognized name.
        name: String,
    },

    /// A descriptor is internally inconsistent.
    #[error("invalid descriptor: {reason}")]
    InvalidDescriptor {
        /// What is wrong.
        reason: String,
    },

    /// The same field name was declared twice in one schema.
    #[error("duplicate field {field:?}")]
    DuplicateField {
        /// The duplicated name.
        field: String,
    },

    /// A regular expression failed to compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// A predicate or cast function name is not registered.
    #[error("unknown function {name:?}")]
    UnknownFunction {
        /// The unregistered name.
        name: String,
    },

    /// A rule was attached to a kind it cannot check.
    #[error("rule '{rule}' cannot be applied to {kind}")]
    RuleNotApplicable {
        /// The rule.
        rule: Validation,
        /// The descriptor kind.
        kind: String,
    },

    /// A default value does not match the declared kind.
    #[error("invalid default: {reason}")]
    InvalidDefault {
        /// What is wrong.
        reason: String,
    },

    /// An external reference names a schema the delegate does not know.
    #[error("unknown external schema {schema:?}")]
    UnknownSchema {
        /// The schema identifier.
        schema: String,
    },

    /// An external reference names a field the schema does not have.
    #[error("external schema {schema:?} has no primitive field {field:?}")]
    UnknownSchemaField {
        /// The schema identifier.
        schema: String,
        /// The missing field.
        field: String,
    },

    /// A schema with external references was used without a delegate.
    #[error("external reference to {schema:?} but no schema delegate is configured")]
    MissingDelegate {
        /// The referenced schema.
        schema: String,
    },

    /// A descriptor document failed its structural check.
    #[error("descriptor document '{source_name}' is malformed:\n{}", .violations.join("\n"))]
    Document {
        /// Document name or path.
        source_name: String,
        /// One line per violation.
        violations: Vec<String>,
    },

    /// A descriptor document could not be read or parsed.
    #[error("document load error for '{path}': {reason}")]
    DocumentLoad {
        /// Path to the document.
        path: String,
        /// Reason.
        reason: String,
    },

    /// IO error reading descriptor documents.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigurationError {
    /// Wrap this error with the name of the field it occurred in.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every [`ConfigurationError::Field`] wrapper removed.
    pub fn root_cause(&self) -> &ConfigurationError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
