//! # Error Accumulator
//!
//! Collects field errors for one node of the walk. Child results are merged
//! by prefixing their paths with the segment that leads to the child, so
//! by the time the walk has unwound every path is absolute.
//!
//! Ordering is append-only: whatever is pushed first is reported first. The
//! walker pushes a node's own errors before descending, so parent errors
//! always precede child errors.

use std::collections::HashSet;

use params_core::{FieldError, PathSegment, ValidationErrors};

use crate::result::ParseResult;

/// Ordered error collection for one walk node.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    errors: Vec<FieldError>,
}

impl ErrorAccumulator {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error whose path is already relative to this node.
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Append errors whose paths are already relative to this node.
    pub fn extend(&mut self, errors: impl IntoIterator<Item = FieldError>) {
        self.errors.extend(errors);
    }

    /// Append a child's errors, prefixing each path with `segment`.
    pub fn merge(&mut self, segment: PathSegment, child: impl IntoIterator<Item = FieldError>) {
        self.errors
            .extend(child.into_iter().map(|e| e.prefixed(segment.clone())));
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors recorded.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Take the errors out.
    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// `Valid(value)` if nothing was recorded, `Invalid` otherwise.
    pub fn finish<T>(self, value: T) -> ParseResult<T> {
        if self.errors.is_empty() {
            ParseResult::Valid(value)
        } else {
            ParseResult::Invalid(ValidationErrors::from(self.errors))
        }
    }
}

/// Drop errors structurally identical to an earlier one.
///
/// Identity is `(path, validation, kind)`; the first occurrence wins and
/// order is otherwise preserved. Used only when independent payloads are
/// validated as a batch.
pub fn dedup(errors: impl IntoIterator<Item = FieldError>) -> Vec<FieldError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|e| seen.insert(e.dedup_key()))
        .collect()
}
