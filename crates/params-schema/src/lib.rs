//! # params-schema — Type Descriptors & Descriptor Documents
//!
//! The declarative side of the engine: what a field is and how it is
//! constrained. Nothing here touches a payload.
//!
//! ## Building schemas in code (`descriptor`, `rule`)
//!
//! [`TypeDescriptor`] constructors and builder methods describe a field;
//! [`Schema::new`] assembles fields and rejects inconsistent descriptors
//! with a [`ConfigurationError`](params_core::ConfigurationError).
//!
//! ## Building schemas from documents (`compile`, `document`, `registry`)
//!
//! Descriptor documents in YAML or JSON are structurally checked against
//! the bundled JSON Schema, compiled by [`Compiler`], and collected into a
//! [`SchemaRegistry`] keyed by file stem. Named predicates and casts come
//! from a [`FunctionRegistry`].
//!
//! ## Crate Policy
//!
//! - Depends only on `params-core` internally.
//! - Schemas are immutable after construction and safe to share across threads.

pub mod compile;
pub mod descriptor;
pub mod document;
pub mod functions;
pub mod registry;
pub mod rule;

pub use compile::Compiler;
pub use descriptor::{Bucket, ExternalRefSite, Field, Kind, Schema, Splitter, TypeDescriptor};
pub use document::{load_document, parse_document, DocumentChecker, DocumentFormat, Violation};
pub use functions::{Caster, FunctionRegistry, Predicate};
pub use registry::SchemaRegistry;
pub use rule::{Comparison, CountUnit, LengthRule, NumberRule, Rule};
