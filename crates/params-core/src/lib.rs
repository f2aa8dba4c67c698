//! # params-core — Foundational Types for the Validation Engine
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: what a coerced value looks like, which primitive kinds exist,
//! how a location inside a nested payload is named, and how a violation is
//! reported. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One coerced value type.** [`Value`] is the typed counterpart of a raw
//!    `serde_json::Value`. Every value re-encodes to the raw payload shape via
//!    [`Value::to_json`], so re-validating a successful result is idempotent.
//!
//! 2. **Structured paths, rendered late.** [`FieldPath`] keeps segments
//!    (`Field`, `Index`, `Key`) and only renders to `a.b[0].c` notation at the
//!    edge. The walk prefixes a segment per level as it unwinds.
//!
//! 3. **Permissive-but-strict casting.** [`cast()`] accepts the usual textual
//!    encodings of each primitive kind but requires them to be fully consumed;
//!    `null` is absence, never a cast failure.
//!
//! 4. **Closed error taxonomy.** Per-field violations are [`FieldError`]s tagged
//!    with a [`Validation`] name drawn from a fixed enum. Malformed descriptors
//!    are a [`ConfigurationError`], never a field error.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `params-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod cast;
pub mod error;
pub mod kind;
pub mod path;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use cast::{cast, parse_decimal, CastError};
pub use error::{
    ConfigurationError, ErrorCategory, ErrorMeta, FieldError, Validation, ValidationErrors,
    ValidationFailed,
};
pub use kind::PrimitiveKind;
pub use path::{FieldPath, PathSegment};
pub use rust_decimal::Decimal;
pub use value::{Changes, Value};
