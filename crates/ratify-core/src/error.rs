//! # Error Types — Structured Error Family
//!
//! Every failure the engine reports is a variant of [`RatifyError`], so
//! callers can match broadly (any error) or narrowly (one variant). All
//! types use `thiserror` for derive-based `Display` and `Error`.
//!
//! ## Taxonomy
//!
//! - [`ConfigError`] — raised while a schema is being defined, never during
//!   parsing: conflicting bounds, duplicate names, illegal lax specs.
//! - [`ConversionError`] — source-type coercion produced no value.
//! - [`ConstraintViolations`] — the value converted but broke one or more
//!   named constraints; each is a [`ConstraintError`].
//! - [`LogicalError`] — no branch, or more than one branch, of a combinator
//!   matched; carries every branch error.
//! - [`ParseError`] — the aggregate. Each child is a [`PathError`] holding
//!   the full path from the record root to the failing value.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::Path;
use crate::value::Value;

/// Marker substituted for secret values in errors and display output.
pub const REDACTED: &str = "**********";

// ─── Error Family ────────────────────────────────────────────────────

/// Top-level error type for ratify.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RatifyError {
    /// Invalid schema definition.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Source-type coercion failed.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// One or more strict constraints were violated.
    #[error("{0}")]
    Constraint(#[from] ConstraintViolations),

    /// A logical combinator did not match.
    #[error("{0}")]
    Logical(#[from] LogicalError),

    /// Aggregate of path-qualified failures.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A required field was not present in the input.
    #[error("field required")]
    RequiredMissing,

    /// Nesting went deeper than the configured maximum.
    #[error("maximum recursion depth {limit} exceeded")]
    DepthExceeded {
        /// The configured depth limit.
        limit: usize,
    },

    /// The whole-record validation hook rejected the record.
    #[error("record validation failed: {reason}")]
    RecordValidation {
        /// Reason reported by the hook.
        reason: String,
    },

    /// The input carried a key no field claims while extras are forbidden.
    #[error("unexpected field '{key}'")]
    ExtraField {
        /// The unclaimed input key.
        key: String,
    },

    /// Attempted to mutate a frozen field.
    #[error("field '{field}' is frozen")]
    Frozen {
        /// The frozen field name.
        field: String,
    },

    /// Referenced a field the record schema does not declare.
    #[error("unknown field '{field}'")]
    UnknownField {
        /// The unknown field name.
        field: String,
    },

    /// Error raised by a user-supplied transformer, factory or hook.
    #[error("{0}")]
    Custom(String),
}

impl RatifyError {
    /// Short machine-readable name of the variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Conversion(_) => "conversion",
            Self::Constraint(_) => "constraint",
            Self::Logical(_) => "logical",
            Self::Parse(_) => "parse",
            Self::RequiredMissing => "required_missing",
            Self::DepthExceeded { .. } => "depth_exceeded",
            Self::RecordValidation { .. } => "record_validation",
            Self::ExtraField { .. } => "extra_field",
            Self::Frozen { .. } => "frozen",
            Self::UnknownField { .. } => "unknown_field",
            Self::Custom(_) => "custom",
        }
    }

    /// Convenience constructor for [`RatifyError::Custom`].
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Replace every offending value carried by this error with the
    /// redaction marker. Free-text explanations are replaced too, since
    /// they may quote the input.
    pub fn redacted(self) -> Self {
        match self {
            Self::Conversion(e) => Self::Conversion(ConversionError {
                actual: Value::Str(REDACTED.to_string()),
                reason: REDACTED.to_string(),
                ..e
            }),
            Self::Constraint(v) => Self::Constraint(ConstraintViolations(
                v.0.into_iter()
                    .map(|c| ConstraintError {
                        actual: Value::Str(REDACTED.to_string()),
                        detail: c.detail.map(|_| REDACTED.to_string()),
                        ..c
                    })
                    .collect(),
            )),
            Self::Logical(l) => Self::Logical(LogicalError {
                errors: l.errors.into_iter().map(Self::redacted).collect(),
                ..l
            }),
            Self::Parse(p) => Self::Parse(ParseError {
                path: p.path,
                errors: p
                    .errors
                    .into_iter()
                    .map(|e| PathError::new(e.path, e.error.redacted()))
                    .collect(),
            }),
            Self::Custom(_) => Self::Custom(REDACTED.to_string()),
            other => other,
        }
    }
}

// ─── Definition-Time Errors ──────────────────────────────────────────

/// Invalid schema or rule definition, raised before any parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ConfigError {
    /// What is wrong with the definition.
    pub reason: String,
}

impl ConfigError {
    /// Create a configuration error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// ─── Conversion Errors ───────────────────────────────────────────────

/// Source-type coercion could not produce a value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert {} '{actual}' to {target}: {reason}", .actual.type_name())]
pub struct ConversionError {
    /// Name of the target type.
    pub target: String,
    /// The value that failed to convert.
    pub actual: Value,
    /// Why the conversion failed.
    pub reason: String,
}

impl ConversionError {
    /// Create a conversion error.
    pub fn new(target: impl Into<String>, actual: Value, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            actual,
            reason: reason.into(),
        }
    }
}

// ─── Constraint Errors ───────────────────────────────────────────────

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintError {
    /// Constraint name (`gt`, `max_length`, ...).
    pub name: String,
    /// The bound or expected value declared by the constraint.
    pub expected: Value,
    /// The offending value (or measured quantity, e.g. a length).
    pub actual: Value,
    /// Optional extra explanation.
    pub detail: Option<String>,
}

impl ConstraintError {
    /// Create a constraint error without detail.
    pub fn new(name: impl Into<String>, expected: Value, actual: Value) -> Self {
        Self {
            name: name.into(),
            expected,
            actual,
            detail: None,
        }
    }

    /// Attach an explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (expected {}, actual {})",
            self.name, self.expected, self.actual
        )?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Every constraint violated by one value, in evaluation order.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct ConstraintViolations(pub Vec<ConstraintError>);

impl ConstraintViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[ConstraintError] {
        &self.0
    }

    /// Names of the violated constraints, in order.
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name.as_str()).collect()
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<ConstraintError> {
        self.0
    }
}

impl fmt::Display for ConstraintViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "violation" } else { "violations" };
        write!(f, "constraint {noun}: ")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

// ─── Logical Errors ──────────────────────────────────────────────────

/// Which combinator produced a [`LogicalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalKind {
    /// All children must pass, chained.
    And,
    /// At least one child must pass.
    Or,
    /// Exactly one child must pass.
    Xor,
    /// The child must fail.
    Not,
}

impl fmt::Display for LogicalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Not => "NOT",
        };
        f.write_str(s)
    }
}

/// Why a combinator failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalFailure {
    /// An `And` child failed; evaluation stopped at child `index`.
    ChildFailed {
        /// Position of the failing child.
        index: usize,
    },
    /// No branch matched.
    NoMatch,
    /// More than one `Xor` branch matched.
    Ambiguous {
        /// Descriptions of every matching branch.
        branches: Vec<String>,
    },
    /// The negated condition matched.
    NegatedMatch {
        /// Description of the negated branch.
        branch: String,
    },
}

/// A combinator failed to match.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct LogicalError {
    /// The combinator kind.
    pub kind: LogicalKind,
    /// The failure reason.
    pub failure: LogicalFailure,
    /// Errors from the evaluated children, in declaration order.
    pub errors: Vec<RatifyError>,
}

impl LogicalError {
    /// Whether this is an ambiguous-match failure.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.failure, LogicalFailure::Ambiguous { .. })
    }
}

impl fmt::Display for LogicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            LogicalFailure::ChildFailed { index } => {
                write!(f, "{} branch {index} failed", self.kind)?;
            }
            LogicalFailure::NoMatch => write!(f, "no {} branch matched", self.kind)?,
            LogicalFailure::Ambiguous { branches } => {
                write!(f, "ambiguous match: {} branches matched", self.kind)?;
                write!(f, " [{}]", branches.join(", "))?;
            }
            LogicalFailure::NegatedMatch { branch } => {
                write!(f, "negated condition matched: {branch}")?;
            }
        }
        for e in &self.errors {
            write!(f, "\n    - {e}")?;
        }
        Ok(())
    }
}

// ─── Aggregate Parse Errors ──────────────────────────────────────────

/// A failure located by its full path from the record root.
#[derive(Debug, Clone, PartialEq)]
pub struct PathError {
    /// Location of the failing value.
    pub path: Path,
    /// The leaf error.
    pub error: RatifyError,
}

impl PathError {
    /// Pair an error with its path.
    pub fn new(path: Path, error: RatifyError) -> Self {
        Self { path, error }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}: {}", self.path, self.error)
    }
}

/// Aggregate of every failure collected below `path`.
#[derive(Error, Debug, Clone, PartialEq, Default)]
pub struct ParseError {
    /// Path at which the aggregate is rooted.
    pub path: Path,
    /// The collected failures; paths are absolute, not relative to `path`.
    pub errors: Vec<PathError>,
}

impl ParseError {
    /// Create an empty aggregate rooted at `path`.
    pub fn new(path: Path) -> Self {
        Self {
            path,
            errors: Vec::new(),
        }
    }

    /// Create an aggregate holding a single failure.
    pub fn single(path: Path, error: RatifyError) -> Self {
        Self {
            path: path.clone(),
            errors: vec![PathError::new(path, error)],
        }
    }

    /// Add an error located at `at`.
    ///
    /// Nested aggregates are flattened: their children already carry
    /// absolute paths and are appended as-is.
    pub fn absorb(&mut self, at: &Path, error: RatifyError) {
        match error {
            RatifyError::Parse(nested) => self.errors.extend(nested.errors),
            other => self.errors.push(PathError::new(at.clone(), other)),
        }
    }

    /// Returns the number of collected failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The paths of every collected failure, in order.
    pub fn paths(&self) -> Vec<&Path> {
        self.errors.iter().map(|e| &e.path).collect()
    }

    /// The failure recorded at exactly `path`, if any.
    pub fn at(&self, path: &Path) -> Option<&RatifyError> {
        self.errors.iter().find(|e| &e.path == path).map(|e| &e.error)
    }

    /// Expand any aggregates pushed directly into `errors` into their leaves.
    pub fn flatten(self) -> Vec<PathError> {
        let mut out = Vec::with_capacity(self.errors.len());
        for e in self.errors {
            match e.error {
                RatifyError::Parse(nested) => out.extend(nested.flatten()),
                other => out.push(PathError::new(e.path, other)),
            }
        }
        out
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "{} validation {noun} at {}:", self.errors.len(), self.path)?;
        for e in &self.errors {
            write!(f, "\n{e}")?;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violations_display_lists_each() {
        let v = ConstraintViolations(vec![
            ConstraintError::new("ge", Value::Int(1), Value::Int(0)),
            ConstraintError::new("multiple_of", Value::Int(2), Value::Int(0))
                .with_detail("remainder 1"),
        ]);
        let s = v.to_string();
        assert!(s.starts_with("constraint violations: ge (expected 1, actual 0)"));
        assert!(s.contains("remainder 1"));
        assert_eq!(v.names(), vec!["ge", "multiple_of"]);
    }

    #[test]
    fn test_absorb_flattens_nested_aggregates() {
        let inner = ParseError::single(Path::fields(["a", "b"]), RatifyError::RequiredMissing);
        let mut outer = ParseError::new(Path::root());
        outer.absorb(&Path::fields(["a"]), RatifyError::Parse(inner));
        outer.absorb(&Path::fields(["c"]), RatifyError::custom("boom"));
        assert_eq!(outer.len(), 2);
        assert_eq!(
            outer.at(&Path::fields(["a", "b"])),
            Some(&RatifyError::RequiredMissing)
        );
    }

    #[test]
    fn test_flatten_expands_pushed_aggregates() {
        let inner = ParseError::single(Path::fields(["x", "y"]), RatifyError::RequiredMissing);
        let mut outer = ParseError::new(Path::root());
        outer
            .errors
            .push(PathError::new(Path::fields(["x"]), RatifyError::Parse(inner)));
        let flat = outer.flatten();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].path.to_string(), "x.y");
    }

    #[test]
    fn test_parse_error_display_has_paths() {
        let err = ParseError::single(Path::fields(["age"]), RatifyError::RequiredMissing);
        assert_eq!(
            err.to_string(),
            "1 validation error at age:\n  age: field required"
        );
    }

    #[test]
    fn test_redacted_replaces_actual_values() {
        let err = RatifyError::Constraint(ConstraintViolations(vec![ConstraintError::new(
            "min_length",
            Value::Int(8),
            Value::from("hunter2"),
        )]));
        let redacted = err.redacted();
        assert!(!redacted.to_string().contains("hunter2"));
        assert!(redacted.to_string().contains(REDACTED));
    }

    #[test]
    fn test_redacted_hides_details_and_reasons() {
        let constraint = RatifyError::Constraint(ConstraintViolations(vec![ConstraintError::new(
            "unique_items",
            Value::Bool(true),
            Value::List(vec![Value::from("hunter2"), Value::from("hunter2")]),
        )
        .with_detail("duplicate item hunter2")]));
        let conversion = RatifyError::Conversion(ConversionError::new(
            "int",
            Value::from("hunter2"),
            "`hunter2` is not a number",
        ));
        let custom = RatifyError::custom("rejected hunter2");
        for err in [constraint, conversion, custom] {
            let shown = err.redacted().to_string();
            assert!(!shown.contains("hunter2"), "{shown}");
        }
    }

    #[test]
    fn test_kind_names_are_distinct() {
        assert_eq!(RatifyError::RequiredMissing.kind_name(), "required_missing");
        assert_eq!(
            RatifyError::Config(ConfigError::new("x")).kind_name(),
            "config"
        );
    }
}
