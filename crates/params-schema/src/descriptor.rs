//! # Type Descriptor Model
//!
//! A [`TypeDescriptor`] says what one field holds and which rules constrain
//! it. A [`Schema`] is an ordered set of named fields and is the unit the
//! walker descends into.
//!
//! ## Construction-time checks
//!
//! Descriptors are built once and reused for every call, so everything that
//! can be checked without a payload is checked in [`Schema::new`]:
//!
//! - field names are unique within a schema;
//! - a joined-string item is a primitive;
//! - each rule is applicable to the kind it is attached to;
//! - defaults sit on primitive fields and cast cleanly to the field's kind.
//!
//! External references are checked later, against a delegate, since the
//! schema alone cannot know what a record schema contains.

use std::fmt;

use params_core::{
    cast, Changes, ConfigurationError, FieldPath, PathSegment, PrimitiveKind, Validation, Value,
};
use regex::Regex;
use serde_json::{Map, Value as Json};

use crate::functions::Caster;
use crate::rule::{compile_pattern, Rule};

// ─── Splitter ────────────────────────────────────────────────────────

/// How a joined string is split into tokens.
///
/// Tokens are always trimmed and empty tokens dropped.
#[derive(Debug, Clone, Default)]
pub enum Splitter {
    /// Split on runs of whitespace or commas.
    #[default]
    Default,
    /// Split on a literal separator.
    Separator(String),
    /// Split on a regular expression.
    Pattern(Regex),
}

impl Splitter {
    /// A literal separator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidDescriptor`] for an empty separator.
    pub fn separator(sep: impl Into<String>) -> Result<Self, ConfigurationError> {
        let sep = sep.into();
        if sep.is_empty() {
            return Err(ConfigurationError::InvalidDescriptor {
                reason: "joined_string separator must not be empty".into(),
            });
        }
        Ok(Self::Separator(sep))
    }

    /// A regular-expression separator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] if the pattern does not compile.
    pub fn pattern(pattern: &str) -> Result<Self, ConfigurationError> {
        compile_pattern(pattern).map(Self::Pattern)
    }

    /// Split `input` into trimmed, non-empty tokens.
    pub fn split<'a>(&self, input: &'a str) -> Vec<&'a str> {
        let pieces: Box<dyn Iterator<Item = &'a str> + '_> = match self {
            Self::Default => Box::new(input.split(|c: char| c == ',' || c.is_whitespace())),
            Self::Separator(sep) => Box::new(input.split(sep.as_str())),
            Self::Pattern(re) => Box::new(re.split(input)),
        };
        pieces.map(str::trim).filter(|t| !t.is_empty()).collect()
    }
}

// ─── Kind ────────────────────────────────────────────────────────────

/// The shape of a descriptor.
#[derive(Debug, Clone)]
pub enum Kind {
    /// A scalar cast directly from the raw value.
    Primitive(PrimitiveKind),
    /// A list; each element validated against the item descriptor.
    ArrayOf(Box<TypeDescriptor>),
    /// A map with named fields.
    MapOf(Schema),
    /// A map with arbitrary keys; each value validated against one descriptor.
    MapValuesOf(Box<TypeDescriptor>),
    /// A delimited string split into validated items.
    JoinedString {
        /// Descriptor each token is validated against. Always primitive.
        item: Box<TypeDescriptor>,
        /// How the string is split.
        splitter: Splitter,
    },
    /// Defer to an external record schema, for the whole record or one field.
    ExternalRef {
        /// Schema identifier understood by the delegate.
        schema: String,
        /// Single field of that schema, or `None` for the whole record.
        field: Option<String>,
    },
}

/// The walker bucket a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Cast in place.
    SelfField,
    /// Descended into recursively.
    Composite,
    /// Handed to the schema delegate.
    External,
}

impl Kind {
    /// Which walker bucket handles this kind.
    pub fn bucket(&self) -> Bucket {
        match self {
            Self::Primitive(_) => Bucket::SelfField,
            Self::ArrayOf(_) | Self::MapOf(_) | Self::MapValuesOf(_) | Self::JoinedString { .. } => {
                Bucket::Composite
            }
            Self::ExternalRef { .. } => Bucket::External,
        }
    }

    /// The type name used in cast errors and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primitive(p) => p.as_str(),
            Self::ArrayOf(_) => "array",
            Self::MapOf(_) => "map",
            Self::MapValuesOf(_) => "map",
            Self::JoinedString { .. } => "joined_string",
            Self::ExternalRef { .. } => "record",
        }
    }

    fn is_field_ref(&self) -> bool {
        matches!(self, Self::ExternalRef { field: Some(_), .. })
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArrayOf(item) => write!(f, "array of {}", item.kind),
            Self::MapValuesOf(value) => write!(f, "map of {} values", value.kind),
            Self::JoinedString { item, .. } => write!(f, "joined_string of {}", item.kind),
            Self::ExternalRef { schema, field: Some(field) } => {
                write!(f, "record field {schema}.{field}")
            }
            Self::ExternalRef { schema, field: None } => write!(f, "record {schema}"),
            other => f.write_str(other.name()),
        }
    }
}

// ─── TypeDescriptor ──────────────────────────────────────────────────

/// Declarative description of one field: kind, rules, presence, default.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    kind: Kind,
    rules: Vec<Rule>,
    required: bool,
    default: Option<Json>,
    source: Option<String>,
    caster: Option<Caster>,
}

impl TypeDescriptor {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            rules: Vec::new(),
            required: false,
            default: None,
            source: None,
            caster: None,
        }
    }

    /// A primitive field.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::of(Kind::Primitive(kind))
    }

    /// A list of `item`.
    pub fn array_of(item: TypeDescriptor) -> Self {
        Self::of(Kind::ArrayOf(Box::new(item)))
    }

    /// A nested map of named fields.
    pub fn map_of(schema: Schema) -> Self {
        Self::of(Kind::MapOf(schema))
    }

    /// A map whose every value is a `value`.
    pub fn map_values_of(value: TypeDescriptor) -> Self {
        Self::of(Kind::MapValuesOf(Box::new(value)))
    }

    /// A delimited string of `item` tokens.
    pub fn joined_string(item: TypeDescriptor, splitter: Splitter) -> Self {
        Self::of(Kind::JoinedString {
            item: Box::new(item),
            splitter,
        })
    }

    /// A reference to an external record schema, or one of its fields.
    pub fn external(schema: impl Into<String>, field: Option<&str>) -> Self {
        Self::of(Kind::ExternalRef {
            schema: schema.into(),
            field: field.map(str::to_string),
        })
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the required flag explicitly.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Append a rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Value used when the field is absent. Cast when the schema is built.
    pub fn default_value(mut self, raw: impl Into<Json>) -> Self {
        self.default = Some(raw.into());
        self
    }

    /// Read the field from a different payload key.
    pub fn source(mut self, key: impl Into<String>) -> Self {
        self.source = Some(key.into());
        self
    }

    /// Replace the primitive cast with a custom one.
    pub fn cast_with(mut self, caster: Caster) -> Self {
        self.caster = Some(caster);
        self
    }

    /// The descriptor kind.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether absence is a violation.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The default, already cast. Only set on schema fields.
    pub fn default(&self) -> Option<Value> {
        let raw = self.default.as_ref()?;
        self.cast_raw(raw).ok()
    }

    /// Raw payload key override.
    pub fn source_key(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Custom cast, if any.
    pub fn caster(&self) -> Option<&Caster> {
        self.caster.as_ref()
    }

    /// Cast a raw value with the custom cast or the primitive cast.
    ///
    /// Non-primitive descriptors cast nothing and return the error for their
    /// kind name; the walker never calls this for them.
    pub fn cast_raw(&self, raw: &Json) -> Result<Value, params_core::CastError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match (&self.caster, &self.kind) {
            (Some(caster), _) => caster.cast(raw),
            (None, Kind::Primitive(p)) => cast(*p, raw),
            (None, other) => Err(params_core::CastError::new(other.name(), raw)),
        }
    }

    /// Recursive consistency check. `is_field` is true for direct schema fields.
    fn check(&self, is_field: bool) -> Result<(), ConfigurationError> {
        for rule in &self.rules {
            check_rule(rule, &self.kind)?;
            if matches!(rule, Rule::Confirmation { .. }) && !is_field {
                return Err(ConfigurationError::InvalidDescriptor {
                    reason: "confirmation needs a sibling field and only applies to schema fields"
                        .into(),
                });
            }
        }
        if self.caster.is_some() && !matches!(self.kind, Kind::Primitive(_)) {
            return Err(ConfigurationError::InvalidDescriptor {
                reason: format!("custom cast is only supported on primitive kinds, not {}", self.kind),
            });
        }
        if let Some(raw) = &self.default {
            if !is_field || !matches!(self.kind, Kind::Primitive(_)) {
                return Err(ConfigurationError::InvalidDefault {
                    reason: format!("defaults are only supported on primitive fields, not {}", self.kind),
                });
            }
            match self.cast_raw(raw) {
                Ok(Value::Null) => {
                    return Err(ConfigurationError::InvalidDefault {
                        reason: "default must not be null".into(),
                    })
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(ConfigurationError::InvalidDefault {
                        reason: e.to_string(),
                    })
                }
            }
        }
        match &self.kind {
            Kind::ArrayOf(item) | Kind::MapValuesOf(item) => item.check(false),
            Kind::JoinedString { item, .. } => {
                if !matches!(item.kind, Kind::Primitive(_)) {
                    return Err(ConfigurationError::InvalidDescriptor {
                        reason: format!("joined_string items must be primitive, not {}", item.kind),
                    });
                }
                item.check(false)
            }
            // Nested schemas were checked by their own `Schema::new`.
            Kind::MapOf(_) | Kind::Primitive(_) | Kind::ExternalRef { .. } => Ok(()),
        }
    }
}

fn check_rule(rule: &Rule, kind: &Kind) -> Result<(), ConfigurationError> {
    let field_ref = kind.is_field_ref();
    let applicable = match rule {
        Rule::Change(_) => true,
        Rule::Acceptance => matches!(kind, Kind::Primitive(PrimitiveKind::Boolean)) || field_ref,
        Rule::Confirmation { .. } => matches!(kind, Kind::Primitive(_)),
        Rule::Inclusion(_) | Rule::Exclusion(_) => matches!(kind, Kind::Primitive(_)) || field_ref,
        Rule::Format(_) => matches!(kind, Kind::Primitive(p) if p.is_textual()) || field_ref,
        Rule::Number(number) => {
            number.check()?;
            matches!(kind, Kind::Primitive(p) if p.is_numeric()) || field_ref
        }
        Rule::Length(length) => {
            length.check()?;
            match kind {
                Kind::Primitive(p) => p.is_textual() || *p == PrimitiveKind::Map,
                Kind::ArrayOf(_)
                | Kind::MapOf(_)
                | Kind::MapValuesOf(_)
                | Kind::JoinedString { .. } => true,
                Kind::ExternalRef { .. } => field_ref,
            }
        }
        Rule::Subset(_) => matches!(kind, Kind::ArrayOf(_) | Kind::JoinedString { .. }),
    };
    if applicable {
        Ok(())
    } else {
        Err(ConfigurationError::RuleNotApplicable {
            rule: rule.validation(),
            kind: kind.to_string(),
        })
    }
}

// ─── Schema ──────────────────────────────────────────────────────────

/// A named field of a [`Schema`].
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    descriptor: TypeDescriptor,
}

impl Field {
    /// Output identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's descriptor.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// The payload key the field is read from.
    pub fn source_key(&self) -> &str {
        self.descriptor.source_key().unwrap_or(&self.name)
    }
}

/// Ordered set of uniquely named fields.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

/// One external reference found inside a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRefSite {
    /// Where the reference sits. Collection elements appear as `[*]`.
    pub path: FieldPath,
    /// Referenced schema.
    pub schema: String,
    /// Referenced field, for single-field references.
    pub field: Option<String>,
}

impl Schema {
    /// Build a schema, checking every descriptor in it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] wrapped with the offending field name.
    pub fn new<I, N>(fields: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (N, TypeDescriptor)>,
        N: Into<String>,
    {
        let mut out: Vec<Field> = Vec::new();
        for (name, descriptor) in fields {
            let name = name.into();
            if out.iter().any(|f| f.name == name) {
                return Err(ConfigurationError::DuplicateField { field: name });
            }
            descriptor.check(true).map_err(|e| e.in_field(name.as_str()))?;
            out.push(Field { name, descriptor });
        }
        Ok(Self { fields: out })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every external reference in this schema and its nested descriptors.
    pub fn external_refs(&self) -> Vec<ExternalRefSite> {
        let mut sites = Vec::new();
        for field in &self.fields {
            collect_refs(&field.descriptor, FieldPath::field(field.name.as_str()), &mut sites);
        }
        sites
    }

    /// Re-encode validated `changes` into the raw payload shape this schema
    /// reads, with every field back under its source key.
    ///
    /// Validating the encoded payload yields the same changes. Whole-record
    /// references are encoded with [`Value::to_json`], since their field
    /// sources belong to the record schema.
    pub fn encode(&self, changes: &Changes) -> Json {
        let mut out = Map::new();
        for field in &self.fields {
            if let Some(value) = changes.get(&field.name) {
                out.insert(field.source_key().to_string(), encode_value(&field.descriptor, value));
            }
        }
        Json::Object(out)
    }
}

fn encode_value(desc: &TypeDescriptor, value: &Value) -> Json {
    match (&desc.kind, value) {
        (Kind::MapOf(schema), Value::Object(changes)) => schema.encode(changes),
        (Kind::ArrayOf(item), Value::Array(items)) => {
            Json::Array(items.iter().map(|v| encode_value(item, v)).collect())
        }
        (Kind::MapValuesOf(item), Value::Object(entries)) => Json::Object(
            entries
                .iter()
                .map(|(key, v)| (key.clone(), encode_value(item, v)))
                .collect(),
        ),
        _ => value.to_json(),
    }
}

fn collect_refs(desc: &TypeDescriptor, path: FieldPath, sites: &mut Vec<ExternalRefSite>) {
    match &desc.kind {
        Kind::Primitive(_) => {}
        Kind::ArrayOf(item) | Kind::MapValuesOf(item) | Kind::JoinedString { item, .. } => {
            collect_refs(item, path.child(PathSegment::Key("*".into())), sites);
        }
        Kind::MapOf(schema) => {
            for site in schema.external_refs() {
                let mut nested = site;
                nested.path.prefix_path(&path);
                sites.push(nested);
            }
        }
        Kind::ExternalRef { schema, field } => sites.push(ExternalRefSite {
            path,
            schema: schema.clone(),
            field: field.clone(),
        }),
    }
}

/// Shorthand for the validation a rule reports, used in diagnostics.
pub fn rule_names(desc: &TypeDescriptor) -> Vec<Validation> {
    let mut names: Vec<Validation> = desc.rules.iter().map(Rule::validation).collect();
    if desc.required {
        names.insert(0, Validation::Required);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Comparison, LengthRule, NumberRule};
    use serde_json::json;

    fn string() -> TypeDescriptor {
        TypeDescriptor::primitive(PrimitiveKind::String)
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::new([("a", string()), ("a", string())]).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateField { field } if field == "a"));
    }

    #[test]
    fn test_joined_string_item_must_be_primitive() {
        let nested = TypeDescriptor::joined_string(
            TypeDescriptor::array_of(string()),
            Splitter::Default,
        );
        let err = Schema::new([("tags", nested)]).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ConfigurationError::InvalidDescriptor { .. }
        ));
    }

    #[test]
    fn test_number_on_string_not_applicable() {
        let desc = string().rule(Rule::Number(NumberRule::new().with(Comparison::LessThan, 3)));
        let err = Schema::new([("name", desc)]).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ConfigurationError::RuleNotApplicable { rule: Validation::Number, .. }
        ));
        assert!(err.to_string().starts_with("field 'name':"));
    }

    #[test]
    fn test_length_on_array_applicable() {
        let desc = TypeDescriptor::array_of(string()).rule(Rule::Length(LengthRule::is(2)));
        assert!(Schema::new([("tags", desc)]).is_ok());
    }

    #[test]
    fn test_length_on_map_of_fields_applicable() {
        let inner = Schema::new([("a", string()), ("b", string())]).unwrap();
        let desc = TypeDescriptor::map_of(inner).rule(Rule::Length(LengthRule::between(None, Some(1))));
        assert!(Schema::new([("pair", desc)]).is_ok());
    }

    #[test]
    fn test_encode_restores_source_keys() {
        let address = Schema::new([("zip_code", string().source("zipCode"))]).unwrap();
        let schema = Schema::new([
            ("user_id", TypeDescriptor::primitive(PrimitiveKind::Integer).source("userId")),
            ("homes", TypeDescriptor::array_of(TypeDescriptor::map_of(address.clone()))),
            ("by_name", TypeDescriptor::map_values_of(TypeDescriptor::map_of(address))),
            ("note", string()),
        ])
        .unwrap();

        let mut zip = Changes::new();
        zip.insert("zip_code".into(), Value::from("12345"));
        let mut by_name = Changes::new();
        by_name.insert("home".into(), Value::Object(zip.clone()));
        let mut changes = Changes::new();
        changes.insert("user_id".into(), Value::Integer(7));
        changes.insert("homes".into(), Value::Array(vec![Value::Object(zip), Value::Null]));
        changes.insert("by_name".into(), Value::Object(by_name));

        assert_eq!(
            schema.encode(&changes),
            json!({
                "userId": 7,
                "homes": [{"zipCode": "12345"}, null],
                "by_name": {"home": {"zipCode": "12345"}},
            })
        );
    }

    #[test]
    fn test_subset_only_on_collections() {
        let desc = string().rule(Rule::Subset(vec![json!("a")]));
        assert!(Schema::new([("x", desc)]).is_err());
    }

    #[test]
    fn test_rules_on_field_ref_deferred() {
        let desc = TypeDescriptor::external("users", Some("email"))
            .rule(Rule::Length(LengthRule::between(Some(3), None)));
        assert!(Schema::new([("email", desc)]).is_ok());
        let whole = TypeDescriptor::external("users", None)
            .rule(Rule::Length(LengthRule::between(Some(3), None)));
        assert!(Schema::new([("user", whole)]).is_err());
    }

    #[test]
    fn test_default_is_cast_at_construction() {
        let ok = TypeDescriptor::primitive(PrimitiveKind::Integer).default_value("10");
        let schema = Schema::new([("page", ok)]).unwrap();
        assert_eq!(
            schema.get("page").unwrap().descriptor().default(),
            Some(Value::Integer(10))
        );

        let bad = TypeDescriptor::primitive(PrimitiveKind::Integer).default_value("ten");
        let err = Schema::new([("page", bad)]).unwrap_err();
        assert!(matches!(err.root_cause(), ConfigurationError::InvalidDefault { .. }));
    }

    #[test]
    fn test_default_rejected_on_composite() {
        let desc = TypeDescriptor::array_of(string()).default_value(json!([]));
        assert!(Schema::new([("tags", desc)]).is_err());
    }

    #[test]
    fn test_confirmation_only_on_fields() {
        let item = string().rule(Rule::Confirmation { required: false });
        assert!(Schema::new([("password", item.clone())]).is_ok());
        assert!(Schema::new([("passwords", TypeDescriptor::array_of(item))]).is_err());
    }

    #[test]
    fn test_source_key() {
        let schema = Schema::new([("user_id", string().source("userId"))]).unwrap();
        assert_eq!(schema.fields()[0].source_key(), "userId");
        assert_eq!(schema.fields()[0].name(), "user_id");
    }

    #[test]
    fn test_splitter_default() {
        assert_eq!(Splitter::Default.split(" a, b  c,,d "), vec!["a", "b", "c", "d"]);
        assert!(Splitter::Default.split("  , ").is_empty());
    }

    #[test]
    fn test_splitter_separator_and_pattern() {
        let sep = Splitter::separator("|").unwrap();
        assert_eq!(sep.split("a | b||c"), vec!["a", "b", "c"]);
        assert!(Splitter::separator("").is_err());

        let pat = Splitter::pattern(r"\s*;\s*").unwrap();
        assert_eq!(pat.split("x ; y;z"), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_external_refs_are_listed_with_paths() {
        let inner = Schema::new([(
            "owner",
            TypeDescriptor::external("users", Some("email")),
        )])
        .unwrap();
        let schema = Schema::new([
            ("team", TypeDescriptor::map_of(inner)),
            ("members", TypeDescriptor::array_of(TypeDescriptor::external("users", None))),
        ])
        .unwrap();
        let refs = schema.external_refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].path.to_string(), "team.owner");
        assert_eq!(refs[0].field.as_deref(), Some("email"));
        assert_eq!(refs[1].path.to_string(), "members[*]");
    }

    #[test]
    fn test_bucket_partition() {
        assert_eq!(string().kind().bucket(), Bucket::SelfField);
        assert_eq!(
            TypeDescriptor::array_of(string()).kind().bucket(),
            Bucket::Composite
        );
        assert_eq!(
            TypeDescriptor::external("users", None).kind().bucket(),
            Bucket::External
        );
    }

    #[test]
    fn test_rule_names_start_with_required() {
        let desc = string().required().rule(Rule::format("^a").unwrap());
        assert_eq!(rule_names(&desc), vec![Validation::Required, Validation::Format]);
    }
}
