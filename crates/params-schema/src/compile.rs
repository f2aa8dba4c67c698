//! # Descriptor Document Compiler
//!
//! Turns a parsed descriptor document (a JSON value, possibly converted from
//! YAML) into a [`Schema`].
//!
//! ## Document grammar
//!
//! A document is a mapping of field name to descriptor. A descriptor is
//! either a type name (`"integer"`, `"utc_datetime"`, `"map"`) or a mapping:
//!
//! ```yaml
//! tags:
//!   type: joined_string
//!   items: { type: string, length: { max: 20 } }
//!   separator: ","
//!   subset: [red, green, blue]
//! ```
//!
//! Canonical composite forms:
//!
//! | `type`          | companion keys                         |
//! |-----------------|----------------------------------------|
//! | `array`         | `items`                                |
//! | `map`           | `properties` (omit for a generic map)  |
//! | `map_values`    | `values`                               |
//! | `joined_string` | `items`, `separator` or `pattern`      |
//! | `record`        | `schema`, optional `field`             |
//!
//! ## Deprecated aliases
//!
//! Older documents are still accepted and logged at `warn`: an inline field
//! mapping as `type`, the tuple `type: [array, <item>]`, and the key aliases
//! `in`, `not_in`, `func`, `from`, `cast_func`.

use params_core::{parse_decimal, ConfigurationError, PrimitiveKind};
use serde_json::{Map, Value as Json};

use crate::descriptor::{Schema, Splitter, TypeDescriptor};
use crate::functions::FunctionRegistry;
use crate::rule::{Comparison, CountUnit, LengthRule, NumberRule, Rule};

type Object = Map<String, Json>;

/// Keys every descriptor object may carry.
const COMMON_KEYS: &[&str] = &[
    "type",
    "required",
    "default",
    "source",
    "cast",
    "length",
    "number",
    "inclusion",
    "exclusion",
    "subset",
    "format",
    "acceptance",
    "confirmation",
    "change",
];

/// Deprecated key → canonical key.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("in", "inclusion"),
    ("not_in", "exclusion"),
    ("func", "change"),
    ("from", "source"),
    ("cast_func", "cast"),
];

/// Compiles descriptor documents, resolving function names as it goes.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    functions: &'a FunctionRegistry,
}

impl<'a> Compiler<'a> {
    /// A compiler resolving `change` and `cast` names against `functions`.
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Self { functions }
    }

    /// Compile a whole document (field name → descriptor) into a schema.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the first malformed field.
    pub fn compile_schema(&self, doc: &Json) -> Result<Schema, ConfigurationError> {
        let fields = doc
            .as_object()
            .ok_or_else(|| invalid("a schema must be a mapping of field names to descriptors"))?;
        self.compile_fields(fields)
    }

    fn compile_fields(&self, fields: &Object) -> Result<Schema, ConfigurationError> {
        let mut compiled = Vec::with_capacity(fields.len());
        for (name, raw) in fields {
            let desc = self
                .compile_descriptor(raw)
                .map_err(|e| e.in_field(name.as_str()))?;
            compiled.push((name.clone(), desc));
        }
        Schema::new(compiled)
    }

    /// Compile one descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for unknown type names, unknown keys,
    /// ill-typed parameters or unregistered function names.
    pub fn compile_descriptor(&self, raw: &Json) -> Result<TypeDescriptor, ConfigurationError> {
        match raw {
            Json::String(name) => self.shorthand(name),
            Json::Array(tuple) => {
                tracing::warn!(alias = "tuple", "deprecated descriptor alias: use {{type: array, items}}");
                self.tuple(tuple)
            }
            Json::Object(obj) => self.object(&normalize_keys(obj)?),
            other => Err(invalid(format!(
                "a descriptor must be a type name or a mapping, got {other}"
            ))),
        }
    }

    fn shorthand(&self, name: &str) -> Result<TypeDescriptor, ConfigurationError> {
        match name {
            "map" => Ok(TypeDescriptor::primitive(PrimitiveKind::Map)),
            "joined_string" => Ok(TypeDescriptor::joined_string(
                TypeDescriptor::primitive(PrimitiveKind::String),
                Splitter::Default,
            )),
            "array" | "map_values" | "record" => Err(invalid(format!(
                "type '{name}' needs its companion keys; use the mapping form"
            ))),
            other => Ok(TypeDescriptor::primitive(other.parse()?)),
        }
    }

    fn tuple(&self, tuple: &[Json]) -> Result<TypeDescriptor, ConfigurationError> {
        match tuple {
            [Json::String(head), item] if head == "array" => {
                Ok(TypeDescriptor::array_of(self.compile_descriptor(item)?))
            }
            _ => Err(invalid("a tuple descriptor must be [array, <item>]")),
        }
    }

    fn object(&self, obj: &Object) -> Result<TypeDescriptor, ConfigurationError> {
        let ty = obj.get("type").ok_or_else(|| invalid("descriptor has no 'type'"))?;

        let base = match ty {
            Json::String(name) => match name.as_str() {
                "array" => TypeDescriptor::array_of(self.compile_descriptor(require(obj, "items")?)?),
                "map" => match obj.get("properties") {
                    Some(props) => TypeDescriptor::map_of(self.compile_properties(props)?),
                    None => TypeDescriptor::primitive(PrimitiveKind::Map),
                },
                "map_values" => {
                    TypeDescriptor::map_values_of(self.compile_descriptor(require(obj, "values")?)?)
                }
                "joined_string" => self.joined_string(obj)?,
                "record" => {
                    let schema = string_param(obj, "schema")?
                        .ok_or_else(|| invalid("type 'record' needs 'schema'"))?;
                    TypeDescriptor::external(schema, string_param(obj, "field")?)
                }
                other => self.shorthand(other)?,
            },
            Json::Object(fields) => {
                tracing::warn!(alias = "inline_fields", "deprecated descriptor alias: use {{type: map, properties}}");
                TypeDescriptor::map_of(self.compile_fields(fields)?)
            }
            Json::Array(tuple) => {
                tracing::warn!(alias = "tuple", "deprecated descriptor alias: use {{type: array, items}}");
                self.tuple(tuple)?
            }
            other => return Err(invalid(format!("'type' must be a name, got {other}"))),
        };

        let extra_keys = companion_keys(ty);
        if let Some(key) = obj
            .keys()
            .find(|k| !COMMON_KEYS.contains(&k.as_str()) && !extra_keys.contains(&k.as_str()))
        {
            return Err(invalid(format!(
                "unknown key '{key}' for type {}",
                base.kind()
            )));
        }

        self.decorate(base, obj)
    }

    fn compile_properties(&self, props: &Json) -> Result<Schema, ConfigurationError> {
        let fields = props
            .as_object()
            .ok_or_else(|| invalid("'properties' must be a mapping"))?;
        self.compile_fields(fields)
    }

    fn joined_string(&self, obj: &Object) -> Result<TypeDescriptor, ConfigurationError> {
        let item = match obj.get("items") {
            Some(raw) => self.compile_descriptor(raw)?,
            None => TypeDescriptor::primitive(PrimitiveKind::String),
        };
        let splitter = match (string_param(obj, "separator")?, string_param(obj, "pattern")?) {
            (Some(_), Some(_)) => {
                return Err(invalid("'separator' and 'pattern' are mutually exclusive"))
            }
            (Some(sep), None) => Splitter::separator(sep)?,
            (None, Some(pattern)) => Splitter::pattern(pattern)?,
            (None, None) => Splitter::Default,
        };
        Ok(TypeDescriptor::joined_string(item, splitter))
    }

    /// Apply presence, default, source, cast and rule keys.
    fn decorate(
        &self,
        mut desc: TypeDescriptor,
        obj: &Object,
    ) -> Result<TypeDescriptor, ConfigurationError> {
        if let Some(required) = obj.get("required") {
            let required = required
                .as_bool()
                .ok_or_else(|| invalid("'required' must be a boolean"))?;
            desc = desc.with_required(required);
        }
        if let Some(default) = obj.get("default") {
            desc = desc.default_value(default.clone());
        }
        if let Some(source) = string_param(obj, "source")? {
            desc = desc.source(source);
        }
        if let Some(name) = string_param(obj, "cast")? {
            desc = desc.cast_with(self.functions.caster(name)?);
        }
        for rule in self.rules(obj)? {
            desc = desc.rule(rule);
        }
        Ok(desc)
    }

    /// Rules in a fixed order, independent of key order in the document.
    fn rules(&self, obj: &Object) -> Result<Vec<Rule>, ConfigurationError> {
        let mut rules = Vec::new();
        if let Some(raw) = obj.get("length") {
            rules.push(Rule::Length(length_rule(raw)?));
        }
        if let Some(raw) = obj.get("number") {
            rules.push(Rule::Number(number_rule(raw)?));
        }
        if let Some(raw) = obj.get("inclusion") {
            rules.push(Rule::Inclusion(list_param("inclusion", raw)?));
        }
        if let Some(raw) = obj.get("exclusion") {
            rules.push(Rule::Exclusion(list_param("exclusion", raw)?));
        }
        if let Some(raw) = obj.get("subset") {
            rules.push(Rule::Subset(list_param("subset", raw)?));
        }
        if let Some(pattern) = string_param(obj, "format")? {
            rules.push(Rule::format(pattern)?);
        }
        match obj.get("acceptance") {
            None | Some(Json::Bool(false)) => {}
            Some(Json::Bool(true)) => rules.push(Rule::Acceptance),
            Some(_) => return Err(invalid("'acceptance' must be a boolean")),
        }
        match obj.get("confirmation") {
            None | Some(Json::Bool(false)) => {}
            Some(Json::Bool(true)) => rules.push(Rule::Confirmation { required: false }),
            Some(Json::Object(params)) => {
                let required = match params.get("required") {
                    None => false,
                    Some(Json::Bool(b)) => *b,
                    Some(_) => return Err(invalid("'confirmation.required' must be a boolean")),
                };
                if let Some(key) = params.keys().find(|k| *k != "required") {
                    return Err(invalid(format!("unknown confirmation parameter '{key}'")));
                }
                rules.push(Rule::Confirmation { required });
            }
            Some(_) => return Err(invalid("'confirmation' must be a boolean or a mapping")),
        }
        match obj.get("change") {
            None => {}
            Some(Json::String(name)) => rules.push(Rule::Change(self.functions.predicate(name)?)),
            Some(Json::Array(names)) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| invalid("'change' entries must be function names"))?;
                    rules.push(Rule::Change(self.functions.predicate(name)?));
                }
            }
            Some(_) => return Err(invalid("'change' must be a function name or a list of names")),
        }
        Ok(rules)
    }
}

// ─── Parameter helpers ───────────────────────────────────────────────

fn invalid(reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidDescriptor {
        reason: reason.into(),
    }
}

/// Rewrite deprecated key aliases to their canonical names.
fn normalize_keys(obj: &Object) -> Result<Object, ConfigurationError> {
    let mut out = Object::new();
    for (key, value) in obj {
        let canonical = match KEY_ALIASES.iter().find(|(alias, _)| *alias == key.as_str()) {
            Some((alias, canonical)) => {
                tracing::warn!(alias, canonical, "deprecated descriptor key");
                if obj.contains_key(*canonical) {
                    return Err(invalid(format!(
                        "both '{alias}' and '{canonical}' are set"
                    )));
                }
                (*canonical).to_string()
            }
            None => key.clone(),
        };
        out.insert(canonical, value.clone());
    }
    Ok(out)
}

/// Keys a composite type adds to [`COMMON_KEYS`].
fn companion_keys(ty: &Json) -> &'static [&'static str] {
    match ty.as_str() {
        Some("array") => &["items"],
        Some("map") => &["properties"],
        Some("map_values") => &["values"],
        Some("joined_string") => &["items", "separator", "pattern"],
        Some("record") => &["schema", "field"],
        _ => &[],
    }
}

fn require<'o>(obj: &'o Object, key: &str) -> Result<&'o Json, ConfigurationError> {
    obj.get(key)
        .ok_or_else(|| invalid(format!("missing required key '{key}'")))
}

fn string_param<'o>(obj: &'o Object, key: &str) -> Result<Option<&'o str>, ConfigurationError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Json::String(s)) => Ok(Some(s)),
        Some(_) => Err(invalid(format!("'{key}' must be a string"))),
    }
}

fn list_param(key: &str, raw: &Json) -> Result<Vec<Json>, ConfigurationError> {
    raw.as_array()
        .cloned()
        .ok_or_else(|| invalid(format!("'{key}' must be a list")))
}

fn count_param(key: &str, raw: &Json) -> Result<usize, ConfigurationError> {
    raw.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(format!("length '{key}' must be a non-negative integer")))
}

fn length_rule(raw: &Json) -> Result<LengthRule, ConfigurationError> {
    if raw.is_number() {
        return Ok(LengthRule::is(count_param("is", raw)?));
    }
    let params = raw
        .as_object()
        .ok_or_else(|| invalid("'length' must be an integer or a mapping"))?;
    let mut rule = LengthRule::default();
    for (key, value) in params {
        match key.as_str() {
            "is" => rule.is = Some(count_param(key, value)?),
            "min" => rule.min = Some(count_param(key, value)?),
            "max" => rule.max = Some(count_param(key, value)?),
            "count" => {
                let unit = value
                    .as_str()
                    .ok_or_else(|| invalid("length 'count' must be a string"))?;
                rule.count = CountUnit::parse(unit)?;
            }
            other => return Err(invalid(format!("unknown length parameter '{other}'"))),
        }
    }
    Ok(rule)
}

fn number_rule(raw: &Json) -> Result<NumberRule, ConfigurationError> {
    let params = raw
        .as_object()
        .ok_or_else(|| invalid("'number' must be a mapping of comparisons"))?;
    let mut rule = NumberRule::new();
    for (key, value) in params {
        let comparison = Comparison::parse(key)
            .ok_or_else(|| invalid(format!("unknown number comparison '{key}'")))?;
        let Json::Number(number) = value else {
            return Err(invalid(format!("number '{key}' must be a number")));
        };
        let bound = parse_decimal(&number.to_string())
            .ok_or_else(|| invalid(format!("number '{key}' bound {number} is out of range")))?;
        rule = rule.with(comparison, bound);
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Kind;
    use params_core::{Validation, Value};
    use serde_json::json;

    fn compile(doc: Json) -> Result<Schema, ConfigurationError> {
        let functions = FunctionRegistry::new();
        Compiler::new(&functions).compile_schema(&doc)
    }

    #[test]
    fn test_shorthand_primitive() {
        let schema = compile(json!({"age": "integer", "meta": "map"})).unwrap();
        assert!(matches!(
            schema.get("age").unwrap().descriptor().kind(),
            Kind::Primitive(PrimitiveKind::Integer)
        ));
        assert!(matches!(
            schema.get("meta").unwrap().descriptor().kind(),
            Kind::Primitive(PrimitiveKind::Map)
        ));
    }

    #[test]
    fn test_typo_type_name_is_configuration_error() {
        let err = compile(json!({"count": "intedfsdger"})).unwrap_err();
        assert!(matches!(err.root_cause(), ConfigurationError::UnknownType { name } if name == "intedfsdger"));
        assert!(err.to_string().contains("field 'count'"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = compile(json!({"name": {"type": "string", "lenght": 3}})).unwrap_err();
        assert!(err.to_string().contains("unknown key 'lenght'"));
    }

    #[test]
    fn test_companion_key_on_wrong_type_rejected() {
        let err = compile(json!({"name": {"type": "string", "items": "string"}})).unwrap_err();
        assert!(err.to_string().contains("unknown key 'items'"));
    }

    #[test]
    fn test_canonical_composites() {
        let schema = compile(json!({
            "a": {"type": "map", "properties": {
                "b": {"type": "array", "items": {"type": "map", "properties": {"c": "integer"}}}
            }},
            "labels": {"type": "map_values", "values": "string"},
            "tags": {"type": "joined_string", "items": "integer", "separator": ";"},
            "owner": {"type": "record", "schema": "users", "field": "email"}
        }))
        .unwrap();
        assert!(matches!(schema.get("a").unwrap().descriptor().kind(), Kind::MapOf(_)));
        assert!(matches!(
            schema.get("labels").unwrap().descriptor().kind(),
            Kind::MapValuesOf(_)
        ));
        assert!(matches!(
            schema.get("tags").unwrap().descriptor().kind(),
            Kind::JoinedString { splitter: Splitter::Separator(s), .. } if s == ";"
        ));
        assert!(matches!(
            schema.get("owner").unwrap().descriptor().kind(),
            Kind::ExternalRef { schema, field: Some(f) } if schema == "users" && f == "email"
        ));
    }

    #[test]
    fn test_document_order_is_field_order() {
        let schema = compile(json!({"zeta": "string", "alpha": "string"})).unwrap();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_legacy_inline_map_and_tuple() {
        let legacy = compile(json!({
            "a": {"type": {"b": {"type": ["array", {"type": {"c": "integer"}}]}}}
        }))
        .unwrap();
        let Kind::MapOf(inner) = legacy.get("a").unwrap().descriptor().kind() else {
            panic!("expected map");
        };
        let Kind::ArrayOf(item) = inner.get("b").unwrap().descriptor().kind() else {
            panic!("expected array");
        };
        assert!(matches!(item.kind(), Kind::MapOf(s) if s.get("c").is_some()));
    }

    #[test]
    fn test_legacy_key_aliases() {
        let mut functions = FunctionRegistry::new();
        functions.register_predicate("no_admin", |_, _| Vec::new());
        let doc = json!({
            "role": {"type": "string", "in": ["user", "admin"], "not_in": ["root"], "func": "no_admin", "from": "Role"}
        });
        let schema = Compiler::new(&functions).compile_schema(&doc).unwrap();
        let desc = schema.get("role").unwrap().descriptor();
        let names: Vec<_> = desc.rules().iter().map(Rule::validation).collect();
        assert_eq!(
            names,
            vec![Validation::Inclusion, Validation::Exclusion, Validation::Change]
        );
        assert_eq!(desc.source_key(), Some("Role"));
    }

    #[test]
    fn test_alias_conflicting_with_canonical() {
        let err = compile(json!({"r": {"type": "string", "in": ["a"], "inclusion": ["b"]}})).unwrap_err();
        assert!(err.to_string().contains("both 'in' and 'inclusion'"));
    }

    #[test]
    fn test_rule_parameters() {
        let schema = compile(json!({
            "name": {"type": "string", "required": true, "length": {"min": 2, "max": 10, "count": "bytes"}},
            "age": {"type": "integer", "number": {"greater_than": 0, "less_than": 150}},
            "code": {"type": "string", "length": 4, "format": "^[A-Z]+$"},
            "terms": {"type": "boolean", "acceptance": true},
            "password": {"type": "string", "confirmation": {"required": true}}
        }))
        .unwrap();
        let name = schema.get("name").unwrap().descriptor();
        assert!(name.is_required());
        assert!(matches!(
            &name.rules()[0],
            Rule::Length(LengthRule { min: Some(2), max: Some(10), count: CountUnit::Bytes, .. })
        ));
        assert!(matches!(&schema.get("age").unwrap().descriptor().rules()[0], Rule::Number(n) if n.comparisons().len() == 2));
        assert!(matches!(
            &schema.get("password").unwrap().descriptor().rules()[0],
            Rule::Confirmation { required: true }
        ));
    }

    #[test]
    fn test_default_compiled_and_cast() {
        let schema = compile(json!({"page": {"type": "integer", "default": "1"}})).unwrap();
        assert_eq!(
            schema.get("page").unwrap().descriptor().default(),
            Some(Value::Integer(1))
        );
    }

    #[test]
    fn test_unregistered_function() {
        let err = compile(json!({"x": {"type": "string", "change": "missing"}})).unwrap_err();
        assert!(matches!(err.root_cause(), ConfigurationError::UnknownFunction { .. }));
        let err = compile(json!({"x": {"type": "string", "cast": "missing"}})).unwrap_err();
        assert!(matches!(err.root_cause(), ConfigurationError::UnknownFunction { .. }));
    }

    #[test]
    fn test_shorthand_needing_companions() {
        assert!(compile(json!({"tags": "array"})).is_err());
        assert!(compile(json!({"tags": "joined_string"})).is_ok());
    }

    #[test]
    fn test_separator_and_pattern_exclusive() {
        let err = compile(json!({"t": {"type": "joined_string", "separator": ",", "pattern": ";"}}))
            .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_number_bounds_are_exact() {
        let schema = compile(json!({
            "n": {"type": "integer", "number": {"not_equal_to": 9007199254740992_i64, "less_than": 0.1}}
        }))
        .unwrap();
        let Rule::Number(rule) = &schema.get("n").unwrap().descriptor().rules()[0] else {
            panic!("expected number rule");
        };
        assert_eq!(
            rule.comparisons(),
            &[
                (Comparison::NotEqualTo, params_core::Decimal::from(9_007_199_254_740_992_i64)),
                (Comparison::LessThan, params_core::Decimal::new(1, 1)),
            ]
        );
        assert!(compile(json!({"n": {"type": "float", "number": {"less_than": 1e300}}})).is_err());
        assert!(compile(json!({"n": {"type": "float", "number": {"less_than": "5"}}})).is_err());
    }
}
