//! # Primitive Kinds
//!
//! The closed set of scalar types the cast engine knows how to produce.
//! Composite shapes (arrays, nested maps, joined strings) are described by
//! the descriptor model in `params-schema`; this enum only covers leaves.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigurationError;

/// A primitive (leaf) type that a raw payload value can be cast into.
///
/// The string identifiers match the names used in descriptor documents and in
/// the `type` metadata of cast errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// Integer record identifier.
    Id,
    /// UUID identifier.
    BinaryId,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// UTF-8 string.
    String,
    /// Raw bytes (supplied as a string).
    Binary,
    /// Generic JSON object, passed through untyped.
    Map,
    /// Arbitrary-precision decimal.
    Decimal,
    /// Calendar date.
    Date,
    /// Wall-clock time, seconds precision.
    Time,
    /// Wall-clock time, microsecond precision.
    TimeUsec,
    /// Date and time without zone, seconds precision.
    NaiveDatetime,
    /// Date and time without zone, microsecond precision.
    NaiveDatetimeUsec,
    /// UTC date and time, seconds precision.
    UtcDatetime,
    /// UTC date and time, microsecond precision.
    UtcDatetimeUsec,
}

impl PrimitiveKind {
    /// Returns every primitive kind in declaration order.
    pub fn all() -> &'static [PrimitiveKind] {
        &[
            Self::Id,
            Self::BinaryId,
            Self::Integer,
            Self::Float,
            Self::Boolean,
            Self::String,
            Self::Binary,
            Self::Map,
            Self::Decimal,
            Self::Date,
            Self::Time,
            Self::TimeUsec,
            Self::NaiveDatetime,
            Self::NaiveDatetimeUsec,
            Self::UtcDatetime,
            Self::UtcDatetimeUsec,
        ]
    }

    /// Returns the snake_case identifier for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::BinaryId => "binary_id",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Map => "map",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Time => "time",
            Self::TimeUsec => "time_usec",
            Self::NaiveDatetime => "naive_datetime",
            Self::NaiveDatetimeUsec => "naive_datetime_usec",
            Self::UtcDatetime => "utc_datetime",
            Self::UtcDatetimeUsec => "utc_datetime_usec",
        }
    }

    /// Whether values of this kind can be compared numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Id | Self::Integer | Self::Float | Self::Decimal)
    }

    /// Whether values of this kind have a textual length.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Binary)
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimitiveKind {
    type Err = ConfigurationError;

    /// Parse a primitive kind from its identifier.
    ///
    /// Accepts the identifiers produced by [`PrimitiveKind::as_str()`] plus
    /// a handful of common spellings (`uuid`, `bool`, `int`, `datetime`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "binary_id" | "uuid" => Ok(Self::BinaryId),
            "integer" | "int" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "string" => Ok(Self::String),
            "binary" => Ok(Self::Binary),
            "map" => Ok(Self::Map),
            "decimal" => Ok(Self::Decimal),
            "date" => Ok(Self::Date),
            "time" => Ok(Self::Time),
            "time_usec" => Ok(Self::TimeUsec),
            "naive_datetime" => Ok(Self::NaiveDatetime),
            "naive_datetime_usec" => Ok(Self::NaiveDatetimeUsec),
            "utc_datetime" | "datetime" => Ok(Self::UtcDatetime),
            "utc_datetime_usec" => Ok(Self::UtcDatetimeUsec),
            other => Err(ConfigurationError::UnknownType {
                name: other.to_string(),
            }),
        }
    }
}
