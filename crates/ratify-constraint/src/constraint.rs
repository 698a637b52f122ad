//! # Constraint Vocabulary
//!
//! The fixed set of named constraints a Type Rule can carry, grouped into
//! families that define the canonical evaluation order:
//!
//! ```text
//! range (gt, ge, lt, le)
//!   → length (length, min_length, max_length)
//!   → pattern (regex)
//!   → const/enum
//!   → numeric (max_digits, decimal_places, multiple_of)
//!   → array (contains, min_contains, max_contains, unique_items)
//! ```
//!
//! A [`ConstraintSpec`] pairs a constraint with its strictness. Lax specs
//! transform non-conforming values toward compliance by discarding
//! information. Constraints that could only be satisfied by inventing data
//! (`gt`, `lt`, `min_length`, `contains`, `min_contains`) never allow lax mode.

use std::fmt;

use serde::{Deserialize, Serialize};

use ratify_core::Value;

/// The family a constraint belongs to, in canonical evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintFamily {
    /// `gt`, `ge`, `lt`, `le`.
    Range,
    /// `length`, `min_length`, `max_length`.
    Length,
    /// `regex`.
    Pattern,
    /// `const`, `enum`.
    Const,
    /// `max_digits`, `decimal_places`, `multiple_of`.
    Numeric,
    /// `contains`, `min_contains`, `max_contains`, `unique_items`.
    Array,
}

/// A single named constraint and its bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Value must be strictly greater than the bound.
    Gt(Value),
    /// Value must be greater than or equal to the bound.
    Ge(Value),
    /// Value must be strictly less than the bound.
    Lt(Value),
    /// Value must be less than or equal to the bound.
    Le(Value),
    /// Size must equal the bound exactly.
    Length(usize),
    /// Size must be at least the bound.
    MinLength(usize),
    /// Size must be at most the bound.
    MaxLength(usize),
    /// Text must contain a match of the pattern.
    Regex(String),
    /// Value must equal the constant, kind included.
    Const(Value),
    /// Value must be one of the listed choices.
    Enum(Vec<Value>),
    /// Total significant digits must not exceed the bound.
    MaxDigits(u32),
    /// Digits after the decimal point must not exceed the bound.
    DecimalPlaces(u32),
    /// Value must be an exact multiple of the bound.
    MultipleOf(Value),
    /// Container or text must contain the item.
    Contains(Value),
    /// The `contains` item must occur at least this many times.
    MinContains(usize),
    /// The `contains` item must occur at most this many times.
    MaxContains(usize),
    /// Sequence items must be distinct.
    UniqueItems,
}

impl Constraint {
    /// The constraint's name as used in declarations and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gt(_) => "gt",
            Self::Ge(_) => "ge",
            Self::Lt(_) => "lt",
            Self::Le(_) => "le",
            Self::Length(_) => "length",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::Regex(_) => "regex",
            Self::Const(_) => "const",
            Self::Enum(_) => "enum",
            Self::MaxDigits(_) => "max_digits",
            Self::DecimalPlaces(_) => "decimal_places",
            Self::MultipleOf(_) => "multiple_of",
            Self::Contains(_) => "contains",
            Self::MinContains(_) => "min_contains",
            Self::MaxContains(_) => "max_contains",
            Self::UniqueItems => "unique_items",
        }
    }

    /// The family this constraint belongs to.
    pub fn family(&self) -> ConstraintFamily {
        match self {
            Self::Gt(_) | Self::Ge(_) | Self::Lt(_) | Self::Le(_) => ConstraintFamily::Range,
            Self::Length(_) | Self::MinLength(_) | Self::MaxLength(_) => ConstraintFamily::Length,
            Self::Regex(_) => ConstraintFamily::Pattern,
            Self::Const(_) | Self::Enum(_) => ConstraintFamily::Const,
            Self::MaxDigits(_) | Self::DecimalPlaces(_) | Self::MultipleOf(_) => {
                ConstraintFamily::Numeric
            }
            Self::Contains(_) | Self::MinContains(_) | Self::MaxContains(_) | Self::UniqueItems => {
                ConstraintFamily::Array
            }
        }
    }

    /// Position in the canonical evaluation order.
    pub fn canonical_rank(&self) -> u8 {
        match self {
            Self::Gt(_) => 0,
            Self::Ge(_) => 1,
            Self::Lt(_) => 2,
            Self::Le(_) => 3,
            Self::Length(_) => 10,
            Self::MinLength(_) => 11,
            Self::MaxLength(_) => 12,
            Self::Regex(_) => 20,
            Self::Const(_) => 30,
            Self::Enum(_) => 31,
            Self::MaxDigits(_) => 40,
            Self::DecimalPlaces(_) => 41,
            Self::MultipleOf(_) => 42,
            Self::Contains(_) => 50,
            Self::MinContains(_) => 51,
            Self::MaxContains(_) => 52,
            Self::UniqueItems => 53,
        }
    }

    /// The declared bound, as reported in `ConstraintError::expected`.
    pub fn bound(&self) -> Value {
        match self {
            Self::Gt(v)
            | Self::Ge(v)
            | Self::Lt(v)
            | Self::Le(v)
            | Self::Const(v)
            | Self::MultipleOf(v)
            | Self::Contains(v) => v.clone(),
            Self::Length(n) | Self::MinLength(n) | Self::MaxLength(n) => Value::from(*n),
            Self::MinContains(n) | Self::MaxContains(n) => Value::from(*n),
            Self::Regex(p) => Value::Str(p.clone()),
            Self::Enum(choices) => Value::List(choices.clone()),
            Self::MaxDigits(n) | Self::DecimalPlaces(n) => Value::Int(i64::from(*n)),
            Self::UniqueItems => Value::Bool(true),
        }
    }

    /// Whether a lax variant of this constraint exists.
    ///
    /// Lax mode may only discard information; these constraints would
    /// have to fabricate it.
    pub fn allows_lax(&self) -> bool {
        !matches!(
            self,
            Self::Gt(_) | Self::Lt(_) | Self::MinLength(_) | Self::Contains(_) | Self::MinContains(_)
        )
    }

    /// Wrap as a strict spec.
    pub fn strict(self) -> ConstraintSpec {
        ConstraintSpec {
            constraint: self,
            lax: false,
        }
    }

    /// Wrap as a lax spec.
    pub fn lax(self) -> ConstraintSpec {
        ConstraintSpec {
            constraint: self,
            lax: true,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniqueItems => f.write_str("unique_items"),
            other => write!(f, "{}={}", other.name(), other.bound()),
        }
    }
}

/// A constraint plus its strictness flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSpec {
    /// The constraint.
    pub constraint: Constraint,
    /// Whether violations are transformed away instead of reported.
    pub lax: bool,
}

impl ConstraintSpec {
    /// The constraint's name.
    pub fn name(&self) -> &'static str {
        self.constraint.name()
    }

    /// JSON form `(name, bound)`, with lax bounds wrapped as `{"lax": bound}`.
    pub fn to_json(&self) -> (String, serde_json::Value) {
        let bound = self.constraint.bound().to_json();
        let value = if self.lax {
            serde_json::json!({ "lax": bound })
        } else {
            bound
        };
        (self.name().to_string(), value)
    }
}

impl From<Constraint> for ConstraintSpec {
    fn from(constraint: Constraint) -> Self {
        constraint.strict()
    }
}

impl fmt::Display for ConstraintSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lax {
            write!(f, "lax({})", self.constraint)
        } else {
            write!(f, "{}", self.constraint)
        }
    }
}
