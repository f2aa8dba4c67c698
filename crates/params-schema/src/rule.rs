//! # Validation Rules
//!
//! The parameters of each rule in the closed rule set. Evaluation lives in
//! `params-engine`; this module only describes *what* to check, and rejects
//! nonsensical parameters when a rule is built.
//!
//! `required` is not a variant here: it is the descriptor's `required` flag,
//! evaluated before every other rule.

use params_core::{ConfigurationError, Decimal, Validation};
use regex::Regex;
use serde_json::Value as Json;

use crate::functions::Predicate;

/// One validation rule with its parameters.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Boolean value must be `true`.
    Acceptance,
    /// User predicate.
    Change(Predicate),
    /// `<field>_confirmation` sibling must equal the value.
    Confirmation {
        /// Whether the confirmation field itself is mandatory.
        required: bool,
    },
    /// Value must not be one of these.
    Exclusion(Vec<Json>),
    /// Value must match this pattern.
    Format(Regex),
    /// Value must be one of these.
    Inclusion(Vec<Json>),
    /// Length bounds.
    Length(LengthRule),
    /// Numeric comparisons, all of which must hold.
    Number(NumberRule),
    /// Every element of a collection must be one of these.
    Subset(Vec<Json>),
}

impl Rule {
    /// The validation name this rule reports under.
    pub fn validation(&self) -> Validation {
        match self {
            Self::Acceptance => Validation::Acceptance,
            Self::Change(_) => Validation::Change,
            Self::Confirmation { .. } => Validation::Confirmation,
            Self::Exclusion(_) => Validation::Exclusion,
            Self::Format(_) => Validation::Format,
            Self::Inclusion(_) => Validation::Inclusion,
            Self::Length(_) => Validation::Length,
            Self::Number(_) => Validation::Number,
            Self::Subset(_) => Validation::Subset,
        }
    }

    /// Build a `format` rule, compiling the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] if the pattern does not compile.
    pub fn format(pattern: &str) -> Result<Self, ConfigurationError> {
        compile_pattern(pattern).map(Self::Format)
    }
}

/// Compile a regular expression, mapping failures to a configuration error.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(pattern).map_err(|e| ConfigurationError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

// ─── Length ──────────────────────────────────────────────────────────

/// What a string length counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountUnit {
    /// Unicode scalar values.
    #[default]
    Codepoints,
    /// UTF-8 bytes.
    Bytes,
}

impl CountUnit {
    /// Parse `codepoints` or `bytes`.
    pub fn parse(s: &str) -> Result<Self, ConfigurationError> {
        match s {
            "codepoints" => Ok(Self::Codepoints),
            "bytes" => Ok(Self::Bytes),
            other => Err(ConfigurationError::InvalidDescriptor {
                reason: format!("unknown length count unit {other:?}"),
            }),
        }
    }
}

/// Bounds for the `length` rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LengthRule {
    /// Exact length.
    pub is: Option<usize>,
    /// Minimum length.
    pub min: Option<usize>,
    /// Maximum length.
    pub max: Option<usize>,
    /// Unit for strings; collections always count items.
    pub count: CountUnit,
}

impl LengthRule {
    /// Exactly `n`.
    pub fn is(n: usize) -> Self {
        Self {
            is: Some(n),
            ..Self::default()
        }
    }

    /// Between `min` and `max` inclusive; either bound may be omitted.
    pub fn between(min: Option<usize>, max: Option<usize>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    /// Count bytes instead of codepoints.
    pub fn in_bytes(mut self) -> Self {
        self.count = CountUnit::Bytes;
        self
    }

    /// Reject empty or contradictory bounds.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if self.is.is_none() && self.min.is_none() && self.max.is_none() {
            return Err(ConfigurationError::InvalidDescriptor {
                reason: "length rule needs at least one of 'is', 'min', 'max'".into(),
            });
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(ConfigurationError::InvalidDescriptor {
                    reason: format!("length min {min} exceeds max {max}"),
                });
            }
        }
        Ok(())
    }
}

// ─── Number ──────────────────────────────────────────────────────────

/// A single numeric comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `value < bound`
    LessThan,
    /// `value > bound`
    GreaterThan,
    /// `value <= bound`
    LessThanOrEqualTo,
    /// `value >= bound`
    GreaterThanOrEqualTo,
    /// `value == bound`
    EqualTo,
    /// `value != bound`
    NotEqualTo,
}

impl Comparison {
    /// Every comparison, in canonical order.
    pub fn all() -> &'static [Comparison] {
        &[
            Self::LessThan,
            Self::GreaterThan,
            Self::LessThanOrEqualTo,
            Self::GreaterThanOrEqualTo,
            Self::EqualTo,
            Self::NotEqualTo,
        ]
    }

    /// The parameter name, also used as the error `kind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessThan => "less_than",
            Self::GreaterThan => "greater_than",
            Self::LessThanOrEqualTo => "less_than_or_equal_to",
            Self::GreaterThanOrEqualTo => "greater_than_or_equal_to",
            Self::EqualTo => "equal_to",
            Self::NotEqualTo => "not_equal_to",
        }
    }

    /// Parse a parameter name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == s)
    }

    /// Whether `value <op> bound` holds.
    pub fn holds<T: PartialOrd>(&self, value: T, bound: T) -> bool {
        match self {
            Self::LessThan => value < bound,
            Self::GreaterThan => value > bound,
            Self::LessThanOrEqualTo => value <= bound,
            Self::GreaterThanOrEqualTo => value >= bound,
            Self::EqualTo => value == bound,
            Self::NotEqualTo => value != bound,
        }
    }

    /// Message fragment preceding the bound: `must be less than`.
    pub fn message(&self) -> &'static str {
        match self {
            Self::LessThan => "must be less than",
            Self::GreaterThan => "must be greater than",
            Self::LessThanOrEqualTo => "must be less than or equal to",
            Self::GreaterThanOrEqualTo => "must be greater than or equal to",
            Self::EqualTo => "must be equal to",
            Self::NotEqualTo => "must be not equal to",
        }
    }
}

/// Comparisons for the `number` rule. All must hold.
///
/// Bounds are exact decimals, so integer bounds beyond 2^53 keep every digit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NumberRule {
    comparisons: Vec<(Comparison, Decimal)>,
}

impl NumberRule {
    /// An empty rule; add comparisons with [`NumberRule::with`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a comparison, replacing an earlier one of the same kind.
    pub fn with(mut self, comparison: Comparison, bound: impl Into<Decimal>) -> Self {
        let bound = bound.into();
        self.comparisons.retain(|(c, _)| *c != comparison);
        self.comparisons.push((comparison, bound));
        self
    }

    /// The comparisons in insertion order.
    pub fn comparisons(&self) -> &[(Comparison, Decimal)] {
        &self.comparisons
    }

    /// Reject an empty rule.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if self.comparisons.is_empty() {
            return Err(ConfigurationError::InvalidDescriptor {
                reason: "number rule needs at least one comparison".into(),
            });
        }
        Ok(())
    }
}
