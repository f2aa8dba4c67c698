//! # Named Functions
//!
//! Descriptors are data, but two escape hatches need code: `change`
//! predicates (cross-field or business checks) and custom casts. Documents
//! refer to them by name; a [`FunctionRegistry`] resolves those names when
//! the document is compiled. An unregistered name is a configuration error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use params_core::{CastError, ConfigurationError, FieldError, Value};
use serde_json::Value as Json;

type PredicateFn = dyn Fn(&str, &Value) -> Vec<FieldError> + Send + Sync;
type CastFn = dyn Fn(&Json) -> Result<Value, CastError> + Send + Sync;

/// A user predicate `(field, value) → errors` backing the `change` rule.
///
/// Errors returned at the root path are attributed to the field itself;
/// errors with a path are nested beneath the field.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    /// Wrap a closure under a name.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &Value) -> Vec<FieldError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the predicate.
    pub fn call(&self, field: &str, value: &Value) -> Vec<FieldError> {
        (self.func)(field, value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.name).finish()
    }
}

/// A custom cast replacing the primitive cast of a field.
#[derive(Clone)]
pub struct Caster {
    name: String,
    func: Arc<CastFn>,
}

impl Caster {
    /// Wrap a closure under a name.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Json) -> Result<Value, CastError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the cast. Never called with `null`.
    pub fn cast(&self, raw: &Json) -> Result<Value, CastError> {
        (self.func)(raw)
    }
}

impl fmt::Debug for Caster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Caster").field(&self.name).finish()
    }
}

/// Name → function lookup used while compiling descriptor documents.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    predicates: HashMap<String, Predicate>,
    casters: HashMap<String, Caster>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `change` predicate.
    pub fn register_predicate<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&str, &Value) -> Vec<FieldError> + Send + Sync + 'static,
    {
        self.predicates
            .insert(name.to_string(), Predicate::new(name, func));
        self
    }

    /// Register a custom cast.
    pub fn register_cast<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&Json) -> Result<Value, CastError> + Send + Sync + 'static,
    {
        self.casters.insert(name.to_string(), Caster::new(name, func));
        self
    }

    /// Look up a predicate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownFunction`] if `name` is not registered.
    pub fn predicate(&self, name: &str) -> Result<Predicate, ConfigurationError> {
        self.predicates
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFunction {
                name: name.to_string(),
            })
    }

    /// Look up a custom cast.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownFunction`] if `name` is not registered.
    pub fn caster(&self, name: &str) -> Result<Caster, ConfigurationError> {
        self.casters
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFunction {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registered_predicate_runs() {
        let mut registry = FunctionRegistry::new();
        registry.register_predicate("never", |_, _| vec![FieldError::change("nope")]);
        let predicate = registry.predicate("never").unwrap();
        assert_eq!(predicate.name(), "never");
        assert_eq!(predicate.call("x", &Value::Null).len(), 1);
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        assert!(matches!(
            registry.caster("upcase"),
            Err(ConfigurationError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_registered_cast_runs() {
        let mut registry = FunctionRegistry::new();
        registry.register_cast("upcase", |raw| {
            raw.as_str()
                .map(|s| Value::String(s.to_uppercase()))
                .ok_or_else(|| CastError::new("upcase", raw))
        });
        let caster = registry.caster("upcase").unwrap();
        assert_eq!(caster.cast(&json!("abc")).unwrap(), Value::from("ABC"));
        assert!(caster.cast(&json!(1)).is_err());
    }
}
