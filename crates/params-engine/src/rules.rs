//! # Rule Evaluation
//!
//! Applies a descriptor's rules to an already-cast, present value. Dispatch
//! is a `match` over [`Rule`]; every rule is a plain function of the value,
//! its parameters and a small [`RuleContext`].
//!
//! Errors come back with paths relative to the node the walker is
//! accumulating for: the value itself sits at [`RuleContext::path`], subset
//! violations beneath it, and confirmation failures at the sibling
//! `<field>_confirmation`.

use params_core::{parse_decimal, Decimal, FieldError, FieldPath, PathSegment, Validation, Value};
use params_schema::{Comparison, CountUnit, LengthRule, NumberRule, Predicate, Rule, TypeDescriptor};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value as Json};

/// Where a value sits and what surrounds it.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    /// Field name handed to predicates. Empty for collection elements.
    pub field: &'a str,
    /// Path at which errors about the value itself are reported.
    pub path: FieldPath,
    /// The raw map the value was read from, when it is a schema field.
    pub siblings: Option<&'a Map<String, Json>>,
    /// Whether blank strings count as absent.
    pub blank_is_nil: bool,
}

impl<'a> RuleContext<'a> {
    /// Context for a field of a map.
    pub fn field(name: &'a str, siblings: &'a Map<String, Json>, blank_is_nil: bool) -> Self {
        Self {
            field: name,
            path: FieldPath::field(name),
            siblings: Some(siblings),
            blank_is_nil,
        }
    }

    /// Context for a value with no siblings (collection element, record field).
    pub fn element(blank_is_nil: bool) -> Self {
        Self {
            field: "",
            path: FieldPath::root(),
            siblings: None,
            blank_is_nil,
        }
    }
}

/// Run every rule of `desc` against `value`, in declaration order.
pub fn apply_all(desc: &TypeDescriptor, value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    desc.rules()
        .iter()
        .flat_map(|rule| apply(rule, desc, value, ctx))
        .collect()
}

/// Run one rule.
pub fn apply(rule: &Rule, desc: &TypeDescriptor, value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    match rule {
        Rule::Acceptance => acceptance(value, ctx),
        Rule::Change(predicate) => change(predicate, value, ctx),
        Rule::Confirmation { required } => confirmation(*required, desc, value, ctx),
        Rule::Exclusion(list) => exclusion(list, value, ctx),
        Rule::Format(re) => format(re, value, ctx),
        Rule::Inclusion(list) => inclusion(list, value, ctx),
        Rule::Length(params) => length(params, value, ctx),
        Rule::Number(params) => number(params, value, ctx),
        Rule::Subset(list) => subset(list, value, ctx),
    }
}

// ─── Rules ───────────────────────────────────────────────────────────

fn acceptance(value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    if matches!(value, Value::Boolean(true)) {
        return Vec::new();
    }
    vec![FieldError::new(Validation::Acceptance, "must be accepted").at(ctx.path.clone())]
}

fn change(predicate: &Predicate, value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    predicate
        .call(ctx.field, value)
        .into_iter()
        .map(|mut err| {
            err.path.prefix_path(&ctx.path);
            err
        })
        .collect()
}

fn confirmation(
    required: bool,
    desc: &TypeDescriptor,
    value: &Value,
    ctx: &RuleContext<'_>,
) -> Vec<FieldError> {
    let Some(siblings) = ctx.siblings else {
        return Vec::new();
    };
    let key = format!("{}_confirmation", desc.source_key().unwrap_or(ctx.field));
    let path = FieldPath::field(format!("{}_confirmation", ctx.field));
    let raw = siblings.get(&key).filter(|raw| !is_blank(raw, ctx.blank_is_nil));

    let Some(raw) = raw else {
        return if required {
            vec![FieldError::required().at(path)]
        } else {
            Vec::new()
        };
    };
    match desc.cast_raw(raw) {
        Ok(confirmed) if confirmed == *value => Vec::new(),
        _ => vec![FieldError::new(Validation::Confirmation, "does not match confirmation").at(path)],
    }
}

fn exclusion(list: &[Json], value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    if !is_member(list, value) {
        return Vec::new();
    }
    vec![FieldError::new(Validation::Exclusion, "is reserved")
        .at(ctx.path.clone())
        .with("enum", list.to_vec())]
}

fn inclusion(list: &[Json], value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    if is_member(list, value) {
        return Vec::new();
    }
    vec![FieldError::new(Validation::Inclusion, "is invalid")
        .at(ctx.path.clone())
        .with("enum", list.to_vec())]
}

fn subset(list: &[Json], value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_null() && !is_member(list, item))
        .map(|(i, _)| {
            FieldError::new(Validation::Subset, "has an invalid entry")
                .at(ctx.path.child(PathSegment::Index(i)))
                .with("enum", list.to_vec())
        })
        .collect()
}

fn format(re: &Regex, value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => return Vec::new(),
    };
    if re.is_match(&text) {
        return Vec::new();
    }
    vec![FieldError::new(Validation::Format, "has invalid format").at(ctx.path.clone())]
}

fn length(params: &LengthRule, value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    let (actual, unit) = match value {
        Value::String(s) => match params.count {
            CountUnit::Codepoints => (s.chars().count(), "character(s)"),
            CountUnit::Bytes => (s.len(), "byte(s)"),
        },
        Value::Binary(bytes) => (bytes.len(), "byte(s)"),
        Value::Array(items) => (items.len(), "item(s)"),
        Value::Object(fields) => (fields.len(), "item(s)"),
        Value::Map(map) => (map.len(), "item(s)"),
        _ => return Vec::new(),
    };
    let verb = if unit == "item(s)" { "should have" } else { "should be" };

    // Only the first failing bound is reported: `is`, then `min`, then `max`.
    let failed = match (params.is, params.min, params.max) {
        (Some(is), _, _) if actual != is => Some(("is", is, format!("{verb} {is} {unit}"))),
        (Some(_), _, _) => None,
        (None, Some(min), _) if actual < min => {
            Some(("min", min, format!("{verb} at least {min} {unit}")))
        }
        (None, _, Some(max)) if actual > max => {
            Some(("max", max, format!("{verb} at most {max} {unit}")))
        }
        _ => None,
    };
    failed
        .map(|(kind, count, message)| {
            FieldError::new(Validation::Length, message)
                .at(ctx.path.clone())
                .with_kind(kind)
                .with("count", count)
                .with("actual", actual)
        })
        .into_iter()
        .collect()
}

fn number(params: &NumberRule, value: &Value, ctx: &RuleContext<'_>) -> Vec<FieldError> {
    let exact = value.as_decimal();
    let Some(approx) = value.as_f64() else {
        return Vec::new();
    };
    params
        .comparisons()
        .iter()
        .filter(|(comparison, bound)| match exact {
            Some(n) => !comparison.holds(n, *bound),
            // Floats outside the decimal range fall back to float ordering.
            None => bound.to_f64().is_some_and(|b| !comparison.holds(approx, b)),
        })
        .map(|(comparison, bound)| number_error(*comparison, bound, &ctx.path))
        .collect()
}

fn number_error(comparison: Comparison, bound: &Decimal, path: &FieldPath) -> FieldError {
    FieldError::new(
        Validation::Number,
        format!("{} {}", comparison.message(), bound),
    )
    .at(path.clone())
    .with_kind(comparison.as_str())
    .with("number", bound_json(bound))
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Whether a raw value counts as absent.
pub fn is_blank(raw: &Json, blank_is_nil: bool) -> bool {
    match raw {
        Json::Null => true,
        Json::String(s) => blank_is_nil && s.trim().is_empty(),
        _ => false,
    }
}

/// Whether `value` equals one of `list`.
///
/// Numeric values compare exactly as decimals, so `1.5`, `"1.50"` and the
/// decimal `1.5` are the same member. String candidates only count as
/// numbers against decimal values.
fn is_member(list: &[Json], value: &Value) -> bool {
    if let Some(n) = value.as_decimal() {
        return list
            .iter()
            .any(|candidate| numeric_candidate(candidate, value) == Some(n));
    }
    let encoded = value.to_json();
    list.iter().any(|candidate| json_eq(candidate, &encoded))
}

fn numeric_candidate(candidate: &Json, value: &Value) -> Option<Decimal> {
    match candidate {
        Json::Number(n) => parse_decimal(&n.to_string()),
        Json::String(s) if matches!(value, Value::Decimal(_)) => parse_decimal(s),
        _ => None,
    }
}

/// JSON equality treating `1` and `1.0` as equal.
fn json_eq(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Render a bound as written: integers stay integers, fractions become floats.
fn bound_json(bound: &Decimal) -> Json {
    if bound.scale() == 0 {
        if let Some(i) = bound.to_i64() {
            return Json::from(i);
        }
    }
    bound
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| Json::String(bound.to_string()), Json::Number)
}
