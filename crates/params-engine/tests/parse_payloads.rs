//! End-to-end validation of payloads against compiled descriptor documents.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use params_core::{ConfigurationError, FieldError, PrimitiveKind, Validation, Value};
use params_engine::{
    get_validated_changes, parse, DelegateError, DelegateOutcome, ParseOptions, ParseResult,
    RecordSchemas, SchemaDelegate, Validator,
};
use params_schema::{Compiler, FunctionRegistry, Schema, SchemaRegistry};
use proptest::prelude::*;
use serde_json::{json, Map, Value as Json};

fn compile(doc: Json) -> Schema {
    let functions = functions();
    Compiler::new(&functions).compile_schema(&doc).unwrap()
}

fn functions() -> FunctionRegistry {
    let mut functions = FunctionRegistry::new();
    functions.register_predicate("even", |_field, value| match value {
        Value::Integer(n) if n % 2 != 0 => vec![FieldError::change("must be even")],
        _ => Vec::new(),
    });
    functions
}

fn errors(result: &ParseResult) -> Vec<(String, Validation)> {
    result
        .errors()
        .map(|errors| {
            errors
                .iter()
                .map(|e| (e.path.to_string(), e.validation()))
                .collect()
        })
        .unwrap_or_default()
}

/// Registry-backed delegate that counts record validations.
struct Counting {
    inner: RecordSchemas,
    calls: AtomicUsize,
}

impl Counting {
    fn new(registry: SchemaRegistry) -> Self {
        Self {
            inner: RecordSchemas::new(Arc::new(registry)),
            calls: AtomicUsize::new(0),
        }
    }
}

impl SchemaDelegate for Counting {
    fn validate_record(
        &self,
        schema: &str,
        raw: &Map<String, Json>,
    ) -> Result<DelegateOutcome, DelegateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.validate_record(schema, raw)
    }

    fn field_primitive_type(&self, schema: &str, field: &str) -> Option<PrimitiveKind> {
        self.inner.field_primitive_type(schema, field)
    }

    fn field_source_key(&self, schema: &str, field: &str) -> String {
        self.inner.field_source_key(schema, field)
    }

    fn has_schema(&self, schema: &str) -> bool {
        self.inner.has_schema(schema)
    }
}

fn users() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.insert(
        "users",
        compile(json!({
            "email": {"type": "string", "required": true, "format": "^[^@]+@[^@]+$"},
            "age": {"type": "integer", "number": {"greater_than": 0}},
            "nickname": "string",
        })),
    );
    registry
}

/// Users whose payload keys differ from their field names.
fn sourced_users() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.insert(
        "users",
        compile(json!({
            "email": {"type": "string", "required": true, "source": "emailAddress"},
            "age": {"type": "integer", "source": "userAge"},
        })),
    );
    registry
}

// ─── Walk semantics ──────────────────────────────────────────────────

#[test]
fn test_valid_payload_coerces_every_kind() {
    let schema = compile(json!({
        "age": "integer",
        "price": "decimal",
        "active": "boolean",
        "born": "date",
        "tags": {"type": "array", "items": "string"},
        "meta": "map",
    }));
    let result = parse(
        &schema,
        &json!({
            "age": "42",
            "price": "10.50",
            "active": "true",
            "born": "1990-04-01",
            "tags": ["a", "b"],
            "meta": {"any": [1]},
        }),
        ParseOptions::default(),
    )
    .unwrap();
    let changes = get_validated_changes(result).unwrap();
    assert_eq!(changes["age"], Value::Integer(42));
    assert_eq!(changes["active"], Value::Boolean(true));
    assert_eq!(changes["price"].to_json(), json!("10.50"));
    assert_eq!(changes["born"].to_json(), json!("1990-04-01"));
}

#[test]
fn test_decimal_rules_compare_numerically() {
    let schema = compile(json!({
        "rate": {"type": "decimal", "inclusion": [1.5, 2.5]},
        "amount": {"type": "decimal", "confirmation": true},
    }));
    for rate in [json!("1.5"), json!(1.5), json!("2.50")] {
        let raw = json!({"rate": rate, "amount": "1.0", "amount_confirmation": "1.00"});
        let result = parse(&schema, &raw, ParseOptions::default()).unwrap();
        assert!(result.is_valid(), "{raw}: {:?}", errors(&result));
    }
    let result = parse(&schema, &json!({"rate": "3"}), ParseOptions::default()).unwrap();
    assert_eq!(errors(&result), vec![("rate".to_string(), Validation::Inclusion)]);
}

#[test]
fn test_large_integer_bounds_are_exact() {
    let schema = compile(json!({
        "n": {"type": "integer", "number": {"not_equal_to": 9007199254740992_i64}},
    }));
    let result = parse(&schema, &json!({"n": 9007199254740993_i64}), ParseOptions::default()).unwrap();
    assert!(result.is_valid());

    let result = parse(&schema, &json!({"n": "9007199254740992"}), ParseOptions::default()).unwrap();
    let errors = result.errors().unwrap();
    assert_eq!(errors.errors()[0].message, "must be not equal to 9007199254740992");
    assert_eq!(errors.errors()[0].meta.extra["number"], json!(9007199254740992_i64));
}

#[test]
fn test_source_keyed_field_reparses_from_encoded_changes() {
    let schema = compile(json!({"age": {"type": "integer", "source": "userAge", "required": true}}));
    let changes = parse(&schema, &json!({"userAge": "7"}), ParseOptions::default())
        .unwrap()
        .into_changes()
        .unwrap();
    assert_eq!(changes["age"], Value::Integer(7));
    let encoded = schema.encode(&changes);
    assert_eq!(encoded, json!({"userAge": 7}));
    let again = parse(&schema, &encoded, ParseOptions::default()).unwrap();
    assert_eq!(again, ParseResult::Valid(changes));
}

#[test]
fn test_every_violation_reported_with_path() {
    let schema = compile(json!({
        "name": {"type": "string", "required": true},
        "age": {"type": "integer", "number": {"greater_than_or_equal_to": 18}},
        "address": {"type": "map", "properties": {
            "lines": {"type": "array", "items": {"type": "map", "properties": {
                "zip": {"type": "string", "length": {"is": 5}},
            }}},
        }},
    }));
    let result = parse(
        &schema,
        &json!({"age": 12, "address": {"lines": [{"zip": "123"}, {"zip": "12345"}]}}),
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(
        errors(&result),
        vec![
            ("name".to_string(), Validation::Required),
            ("age".to_string(), Validation::Number),
            ("address.lines[0].zip".to_string(), Validation::Length),
        ]
    );
}

#[test]
fn test_subset_reports_offending_element() {
    let schema = compile(json!({
        "pets": {"type": "array", "items": "string", "subset": ["cat", "dog"]},
    }));
    let result = parse(
        &schema,
        &json!({"pets": ["cat", "fish", "dog"]}),
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(errors(&result), vec![("pets[1]".to_string(), Validation::Subset)]);
}

#[test]
fn test_named_predicate_and_confirmation() {
    let schema = compile(json!({
        "count": {"type": "integer", "change": "even"},
        "password": {"type": "string", "confirmation": true},
    }));
    let result = parse(
        &schema,
        &json!({"count": 3, "password": "hunter2", "password_confirmation": "hunter3"}),
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(
        errors(&result),
        vec![
            ("count".to_string(), Validation::Change),
            ("password_confirmation".to_string(), Validation::Confirmation),
        ]
    );
}

#[test]
fn test_required_joined_string_absent_is_one_error() {
    let schema = compile(json!({
        "ids": {"type": "joined_string", "items": "integer", "required": true},
    }));
    for raw in [json!({}), json!({"ids": ""}), json!({"ids": null})] {
        let result = parse(&schema, &raw, ParseOptions::default()).unwrap();
        assert_eq!(errors(&result), vec![("ids".to_string(), Validation::Required)]);
    }
}

#[test]
fn test_options_deserialize_with_defaults() {
    let options: ParseOptions = serde_json::from_value(json!({})).unwrap();
    assert!(options.empty_string_as_nil);
    assert!(serde_json::from_value::<ParseOptions>(json!({"strict": true})).is_err());
}

// ─── Batches ─────────────────────────────────────────────────────────

#[test]
fn test_parse_many_dedups_identical_errors() {
    let validator = Validator::new(compile(json!({"name": "string", "age": "integer"})));
    let result = validator
        .parse_many(&[
            json!({"name": "ok"}),
            json!({"name": 123}),
            json!({"name": 456, "age": "x"}),
        ])
        .unwrap();
    let paths: Vec<_> = result
        .errors()
        .unwrap()
        .iter()
        .map(|e| e.path.to_string())
        .collect();
    assert_eq!(paths, vec!["name", "age"]);
}

#[test]
fn test_parse_many_valid_keeps_every_payload() {
    let validator = Validator::new(compile(json!({"n": "integer"})));
    let result = validator
        .parse_many(&[json!({"n": 1}), json!({"n": "2"})])
        .unwrap();
    let all = result.into_changes().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1]["n"], Value::Integer(2));
}

// ─── Records ─────────────────────────────────────────────────────────

#[test]
fn test_whole_record_errors_are_prefixed() {
    let delegate = Arc::new(Counting::new(users()));
    let validator = Validator::new(compile(json!({
        "owner": {"type": "record", "schema": "users"},
    })))
    .with_delegate(delegate)
    .unwrap();
    let result = validator
        .parse(&json!({"owner": {"email": "nope", "age": "-1"}}))
        .unwrap();
    assert_eq!(
        errors(&result),
        vec![
            ("owner.email".to_string(), Validation::Format),
            ("owner.age".to_string(), Validation::Number),
        ]
    );
}

#[test]
fn test_field_refs_batched_per_schema() {
    let delegate = Arc::new(Counting::new(users()));
    let validator = Validator::new(compile(json!({
        "contact": {"type": "record", "schema": "users", "field": "email"},
        "years": {"type": "record", "schema": "users", "field": "age"},
        "handle": {"type": "record", "schema": "users", "field": "nickname"},
    })))
    .with_delegate(delegate.clone())
    .unwrap();

    let result = validator
        .parse(&json!({"contact": "a@b.io", "years": "x", "handle": "neo"}))
        .unwrap();
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);

    let errors = result.errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.errors()[0].path.to_string(), "years");
    assert_eq!(errors.errors()[0].validation(), Validation::Cast);
    assert_eq!(errors.errors()[0].meta.extra["type"], json!("integer"));
}

#[test]
fn test_field_ref_changes_are_redistributed() {
    let delegate = Arc::new(Counting::new(users()));
    let validator = Validator::new(compile(json!({
        "primary": {"type": "record", "schema": "users", "field": "age"},
        "backup": {"type": "record", "schema": "users", "field": "age"},
    })))
    .with_delegate(delegate.clone())
    .unwrap();

    let changes = validator
        .parse(&json!({"primary": "30", "backup": 31}))
        .unwrap()
        .into_changes()
        .unwrap();
    assert_eq!(changes["primary"], Value::Integer(30));
    assert_eq!(changes["backup"], Value::Integer(31));
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_field_refs_read_record_source_keys() {
    let delegate = Arc::new(Counting::new(sourced_users()));
    let validator = Validator::new(compile(json!({
        "contact": {"type": "record", "schema": "users", "field": "email"},
        "years": {"type": "record", "schema": "users", "field": "age"},
    })))
    .with_delegate(delegate.clone())
    .unwrap();

    let changes = validator
        .parse(&json!({"contact": "a@b.io", "years": 30}))
        .unwrap()
        .into_changes()
        .unwrap();
    assert_eq!(changes["contact"], Value::from("a@b.io"));
    assert_eq!(changes["years"], Value::Integer(30));
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);

    let result = validator.parse(&json!({"contact": "a@b.io", "years": "x"})).unwrap();
    assert_eq!(errors(&result), vec![("years".to_string(), Validation::Cast)]);
}

#[test]
fn test_field_ref_in_collection_reads_record_source_key() {
    let delegate = Arc::new(RecordSchemas::new(Arc::new(sourced_users())));
    let validator = Validator::new(compile(json!({
        "ages": {"type": "array", "items": {"type": "record", "schema": "users", "field": "age"}},
    })))
    .with_delegate(delegate)
    .unwrap();
    let changes = validator
        .parse(&json!({"ages": ["30", 31]}))
        .unwrap()
        .into_changes()
        .unwrap();
    assert_eq!(
        changes["ages"],
        Value::Array(vec![Value::Integer(30), Value::Integer(31)])
    );
}

#[test]
fn test_unresolved_reference_rejected_when_binding_delegate() {
    let delegate = Arc::new(RecordSchemas::new(Arc::new(users())));
    let err = Validator::new(compile(json!({
        "owner": {"type": "record", "schema": "users", "field": "shoe_size"},
    })))
    .with_delegate(delegate)
    .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        ConfigurationError::UnknownSchemaField { field, .. } if field == "shoe_size"
    ));
}

// ─── Properties ──────────────────────────────────────────────────────

fn idempotence_schema() -> Schema {
    compile(json!({
        "count": "integer",
        "ratio": "float",
        "flag": "boolean",
        "label": "string",
        "price": "decimal",
        "born": "date",
        "alarm": "time",
        "seen": "utc_datetime",
        "local": "naive_datetime",
        "uid": "binary_id",
        "user_id": {"type": "integer", "source": "userId"},
        "ids": {"type": "array", "items": "integer"},
        "words": {"type": "joined_string", "items": "string"},
        "address": {"type": "map", "properties": {
            "zip_code": {"type": "string", "source": "zipCode"},
            "floor": "integer",
        }},
        "scores": {"type": "map_values", "values": "integer"},
    }))
}

fn date_text() -> impl Strategy<Value = String> {
    (1900i32..2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"))
}

fn time_text() -> impl Strategy<Value = String> {
    (0u32..24, 0u32..60, 0u32..60).prop_map(|(h, m, s)| format!("{h:02}:{m:02}:{s:02}"))
}

proptest! {
    #[test]
    fn test_reparsing_changes_is_idempotent(
        count in prop_oneof![any::<i64>().prop_map(|n| json!(n)), "-?[0-9]{1,6}".prop_map(|s| json!(s))],
        ratio in -1.0e9f64..1.0e9,
        flag in prop_oneof![Just(json!(true)), Just(json!("0")), Just(json!("1"))],
        (label, words) in ("[a-z ]{0,10}", "[a-z]{1,4}(,[a-z]{1,4}){0,3}"),
        price in prop_oneof![
            "-?[0-9]{1,9}(\\.[0-9]{1,6})?".prop_map(|s| json!(s)),
            any::<i32>().prop_map(|n| json!(n)),
        ],
        (born, alarm) in (date_text(), time_text()),
        (day, clock, offset) in (date_text(), time_text(), -12i32..=12),
        (uid, user_id) in ("[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}", any::<i32>()),
        (ids, scores) in (
            prop::collection::vec(any::<i32>(), 0..5),
            prop::collection::btree_map("[a-z]{1,3}", any::<i32>(), 0..4),
        ),
        (zip, floor) in ("[0-9]{5}", prop::option::of(any::<i16>())),
    ) {
        let schema = idempotence_schema();
        let sign = if offset < 0 { '-' } else { '+' };
        let present = if label.trim().is_empty() { 14 } else { 15 };
        let raw = json!({
            "count": count,
            "ratio": ratio,
            "flag": flag,
            "label": label,
            "price": price,
            "born": born,
            "alarm": alarm,
            "seen": format!("{day}T{clock}{sign}{:02}:00", offset.abs()),
            "local": format!("{day}T{clock}"),
            "uid": uid,
            "userId": user_id,
            "ids": ids,
            "words": words,
            "address": {"zipCode": zip, "floor": floor},
            "scores": scores,
        });
        let first = parse(&schema, &raw, ParseOptions::default()).unwrap();
        let changes = first.into_changes().unwrap();
        prop_assert_eq!(changes.len(), present);
        let second = parse(&schema, &schema.encode(&changes), ParseOptions::default()).unwrap();
        prop_assert_eq!(second, ParseResult::Valid(changes));
    }
}
