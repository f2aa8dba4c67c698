//! # Coercion & Cast Engine
//!
//! Converts one raw JSON value into a typed [`Value`] of a declared
//! [`PrimitiveKind`].
//!
//! ## Casting Rules
//!
//! Permissive about representation, strict about content:
//!
//! 1. **Absence is not a failure.** `null` always casts to [`Value::Null`];
//!    whether absence is acceptable is the `required` rule's decision.
//! 2. **Numeric strings must be fully consumed.** `"42"` casts to an integer,
//!    `"42abc"` and `" 42"` do not. Non-finite floats are rejected.
//! 3. **Canonical boolean tokens only.** `true`/`false`, `"true"`/`"false"`,
//!    `"1"`/`"0"`.
//! 4. **Temporal values are ISO 8601.** UTC datetimes accept any offset and
//!    convert to UTC; naive inputs are assumed UTC. Naive datetimes discard an
//!    offset and keep the wall clock. Kinds without `_usec` truncate to
//!    seconds, `_usec` kinds truncate to microseconds.
//!
//! A failed cast is reported as exactly one [`CastError`], which renders as a
//! `validation: cast` field error carrying the expected type name.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde_json::Value as Json;
use thiserror::Error;
use uuid::Uuid;

use crate::error::FieldError;
use crate::kind::PrimitiveKind;
use crate::value::Value;

/// A raw value whose shape does not match the declared type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot cast {found} to {expected}")]
pub struct CastError {
    /// Name of the type that was expected.
    pub expected: String,
    /// Shape of the raw value that was supplied.
    pub found: &'static str,
}

impl CastError {
    /// Build a cast error for `raw` against the named type.
    pub fn new(expected: impl Into<String>, raw: &Json) -> Self {
        Self {
            expected: expected.into(),
            found: json_type_name(raw),
        }
    }

    /// Render as a root-path `validation: cast` field error.
    pub fn to_field_error(&self) -> FieldError {
        FieldError::cast(&self.expected)
    }
}

/// Name of a raw JSON value's shape.
pub fn json_type_name(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Cast `raw` to `kind`.
///
/// # Errors
///
/// Returns [`CastError`] when the raw value's shape or content is not a valid
/// representation of `kind`. `null` never fails.
pub fn cast(kind: PrimitiveKind, raw: &Json) -> Result<Value, CastError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match kind {
        PrimitiveKind::Id | PrimitiveKind::Integer => cast_integer(raw).map(Value::Integer),
        PrimitiveKind::BinaryId => raw
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Value::Uuid),
        PrimitiveKind::Float => cast_float(raw).map(Value::Float),
        PrimitiveKind::Boolean => cast_boolean(raw).map(Value::Boolean),
        PrimitiveKind::String => raw.as_str().map(|s| Value::String(s.to_string())),
        PrimitiveKind::Binary => raw.as_str().map(|s| Value::Binary(s.as_bytes().to_vec())),
        PrimitiveKind::Map => raw.as_object().map(|m| Value::Map(m.clone())),
        PrimitiveKind::Decimal => cast_decimal(raw).map(Value::Decimal),
        PrimitiveKind::Date => raw.as_str().and_then(parse_date).map(Value::Date),
        PrimitiveKind::Time => raw
            .as_str()
            .and_then(parse_time)
            .map(|t| Value::Time(truncate_time(t, Precision::Seconds))),
        PrimitiveKind::TimeUsec => raw
            .as_str()
            .and_then(parse_time)
            .map(|t| Value::Time(truncate_time(t, Precision::Micros))),
        PrimitiveKind::NaiveDatetime => raw
            .as_str()
            .and_then(parse_naive_datetime)
            .map(|dt| Value::NaiveDateTime(truncate_naive(dt, Precision::Seconds))),
        PrimitiveKind::NaiveDatetimeUsec => raw
            .as_str()
            .and_then(parse_naive_datetime)
            .map(|dt| Value::NaiveDateTime(truncate_naive(dt, Precision::Micros))),
        PrimitiveKind::UtcDatetime => raw
            .as_str()
            .and_then(parse_utc_datetime)
            .map(|dt| Value::UtcDateTime(truncate_utc(dt, Precision::Seconds))),
        PrimitiveKind::UtcDatetimeUsec => raw
            .as_str()
            .and_then(parse_utc_datetime)
            .map(|dt| Value::UtcDateTime(truncate_utc(dt, Precision::Micros))),
    };

    value.ok_or_else(|| CastError::new(kind.as_str(), raw))
}

// ─── Scalars ─────────────────────────────────────────────────────────

const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn cast_integer(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= -I64_BOUND && *f < I64_BOUND)
                .map(|f| f as i64)
        }),
        Json::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

fn cast_float(raw: &Json) -> Option<f64> {
    let parsed = match raw {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn cast_boolean(raw: &Json) -> Option<bool> {
    match raw {
        Json::Bool(b) => Some(*b),
        Json::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn cast_decimal(raw: &Json) -> Option<Decimal> {
    match raw {
        Json::Number(n) => parse_decimal(&n.to_string()),
        Json::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Parse `[+-]digits[.digits][(e|E)[+-]digits]` without rounding.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let literal = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-' | b'e' | b'E'));
    if !literal || !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.contains(['e', 'E']) {
        Decimal::from_scientific(s).ok()
    } else {
        Decimal::from_str_exact(s).ok()
    }
}

// ─── Temporal ────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Precision {
    Seconds,
    Micros,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

fn parse_utc_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| parse_naive_datetime(s).map(|naive| naive.and_utc()))
}

fn truncated_nanos(nanos: u32, precision: Precision) -> u32 {
    match precision {
        Precision::Seconds => 0,
        Precision::Micros => nanos / 1_000 * 1_000,
    }
}

fn truncate_time(t: NaiveTime, precision: Precision) -> NaiveTime {
    t.with_nanosecond(truncated_nanos(t.nanosecond(), precision))
        .unwrap_or(t)
}

fn truncate_naive(dt: NaiveDateTime, precision: Precision) -> NaiveDateTime {
    dt.with_nanosecond(truncated_nanos(dt.nanosecond(), precision))
        .unwrap_or(dt)
}

fn truncate_utc(dt: DateTime<Utc>, precision: Precision) -> DateTime<Utc> {
    dt.with_nanosecond(truncated_nanos(dt.nanosecond(), precision))
        .unwrap_or(dt)
}
