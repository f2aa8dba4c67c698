//! # Parse Results
//!
//! [`ParseResult`] is either the coerced changes or the complete error
//! list, never both. It serializes to the response shape callers hand back
//! to clients:
//!
//! ```json
//! {"valid": true, "changes": {"age": 42}}
//! {"valid": false, "errors": [{"path": "age", "message": "is invalid", "validation": "cast", "type": "integer"}]}
//! ```

use params_core::{Changes, ValidationErrors, ValidationFailed};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Outcome of validating one payload (or a batch).
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult<T = Changes> {
    /// Every field cast and passed its rules.
    Valid(T),
    /// At least one violation; the full list, in report order.
    Invalid(ValidationErrors),
}

impl<T> ParseResult<T> {
    /// Whether the payload was valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The changes, if valid.
    pub fn changes(&self) -> Option<&T> {
        match self {
            Self::Valid(changes) => Some(changes),
            Self::Invalid(_) => None,
        }
    }

    /// The errors, if invalid.
    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(errors) => Some(errors),
        }
    }

    /// Map the valid value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseResult<U> {
        match self {
            Self::Valid(changes) => ParseResult::Valid(f(changes)),
            Self::Invalid(errors) => ParseResult::Invalid(errors),
        }
    }

    /// The changes, or the errors as a [`ValidationFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailed`] carrying every error when invalid.
    pub fn into_changes(self) -> Result<T, ValidationFailed> {
        match self {
            Self::Valid(changes) => Ok(changes),
            Self::Invalid(errors) => Err(ValidationFailed { errors }),
        }
    }
}

/// Fail-fast accessor: the validated changes, or [`ValidationFailed`].
///
/// # Errors
///
/// Returns [`ValidationFailed`] when `result` is invalid.
pub fn get_validated_changes<T>(result: ParseResult<T>) -> Result<T, ValidationFailed> {
    result.into_changes()
}

impl<T: Serialize> Serialize for ParseResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ParseResult", 2)?;
        match self {
            Self::Valid(changes) => {
                state.serialize_field("valid", &true)?;
                state.serialize_field("changes", changes)?;
            }
            Self::Invalid(errors) => {
                state.serialize_field("valid", &false)?;
                state.serialize_field("errors", errors)?;
            }
        }
        state.end()
    }
}
