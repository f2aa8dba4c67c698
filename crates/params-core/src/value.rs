//! # Coerced Values
//!
//! [`Value`] is what the cast engine produces: a raw JSON value turned into a
//! typed one. Composite results nest as [`Value::Array`] and
//! [`Value::Object`].
//!
//! ## Re-encoding
//!
//! [`Value::to_json`] renders a value back into the raw payload shape, using
//! the same textual formats the cast engine accepts. Casting the re-encoded
//! form yields an equal value, which is what makes re-validation of a
//! successful result idempotent.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Validated output of one map-of-fields: identifier → coerced value.
pub type Changes = BTreeMap<String, Value>;

/// A typed value produced by casting a raw payload value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit absence, kept in arrays so element indices stay stable.
    Null,
    /// Integer (also used for `id`).
    Integer(i64),
    /// Float, always finite.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// String.
    String(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
    /// Exact decimal number. Equality is numeric, so `1.0 == 1.00`.
    Decimal(Decimal),
    /// Calendar date.
    Date(NaiveDate),
    /// Wall-clock time.
    Time(NaiveTime),
    /// Date and time without zone.
    NaiveDateTime(NaiveDateTime),
    /// UTC date and time.
    UtcDateTime(DateTime<Utc>),
    /// Untyped JSON object (the `map` primitive).
    Map(serde_json::Map<String, serde_json::Value>),
    /// Array of coerced values.
    Array(Vec<Value>),
    /// Map of coerced values (a validated map-of-fields or map-of-values).
    Object(Changes),
}

impl Value {
    /// Short name of the value's shape, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Uuid(_) => "binary_id",
            Self::Decimal(_) => "decimal",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::NaiveDateTime(_) => "naive_datetime",
            Self::UtcDateTime(_) => "utc_datetime",
            Self::Map(_) => "map",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Approximate float view of a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Exact decimal view of a numeric value.
    ///
    /// Integers and decimals convert without loss. Floats convert through
    /// their shortest round-trip text, so `0.1` becomes exactly `0.1`.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Float(f) => Decimal::from_str_exact(&f.to_string()).ok(),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// String view of textual values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an array value.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Re-encode into the raw payload shape.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Integer(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Boolean(b) => Json::Bool(*b),
            Self::String(s) => Json::String(s.clone()),
            Self::Binary(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
            Self::Uuid(u) => Json::String(u.hyphenated().to_string()),
            Self::Decimal(d) => Json::String(d.to_string()),
            Self::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => Json::String(t.format("%H:%M:%S%.f").to_string()),
            Self::NaiveDateTime(dt) => {
                Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Self::UtcDateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Map(map) => Json::Object(map.clone()),
            Self::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Object(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}
