//! # Constraint Set
//!
//! A validated collection of [`ConstraintSpec`]s attached to one Type Rule.
//!
//! Construction performs every definition-time check and fails with a
//! [`ConfigError`] before any value is parsed:
//!
//! - each constraint name at most once;
//! - `length` excludes `min_length`/`max_length`;
//! - range bounds are numbers, text or bytes, and every lower bound is
//!   comparable with and not above every upper bound;
//! - `min_length <= max_length`, `min_contains <= max_contains`;
//! - `min_contains`/`max_contains` require `contains`;
//! - `multiple_of` is a positive number, `enum` is non-empty;
//! - regex patterns compile;
//! - lax mode only on constraints that can be met by discarding information.
//!
//! Evaluation runs in canonical family order unless the set was switched to
//! declaration order. All strict violations for one value are collected
//! into a single [`ConstraintViolations`].

use std::cmp::Ordering;

use regex::Regex;
use tracing::trace;

use ratify_core::{ConfigError, ConstraintViolations, RoundingMode, Value};

use crate::check::Check;
use crate::constraint::{Constraint, ConstraintSpec};

#[derive(Debug, Clone)]
struct Entry {
    spec: ConstraintSpec,
    regex: Option<Regex>,
}

/// Validated constraints of one Type Rule.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    /// Specs in declaration order.
    entries: Vec<Entry>,
    /// Indices into `entries`, in evaluation order.
    order: Vec<usize>,
    declared_order: bool,
}

impl ConstraintSet {
    /// Validate and compile a set of specs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the specs conflict or a bound is unusable.
    pub fn new(specs: impl IntoIterator<Item = ConstraintSpec>) -> Result<Self, ConfigError> {
        let specs: Vec<ConstraintSpec> = specs.into_iter().collect();
        check_definition(&specs)?;

        let entries = specs
            .into_iter()
            .map(|spec| {
                let regex = match &spec.constraint {
                    Constraint::Regex(pattern) => Some(Regex::new(pattern).map_err(|e| {
                        ConfigError::new(format!("invalid regex `{pattern}`: {e}"))
                    })?),
                    _ => None,
                };
                Ok(Entry { spec, regex })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&i| entries[i].spec.constraint.canonical_rank());
        Ok(Self {
            entries,
            order,
            declared_order: false,
        })
    }

    /// A set with no constraints.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `name → bound`.
    ///
    /// A bound written as `{"lax": <bound>}` marks the spec lax.
    /// `"unique_items": false` declares nothing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown names, ill-typed bounds, or any
    /// failure of [`ConstraintSet::new`].
    pub fn from_json(json: &serde_json::Value) -> Result<Self, ConfigError> {
        let Some(map) = json.as_object() else {
            return Err(ConfigError::new("constraints must be a JSON object"));
        };
        let mut specs = Vec::with_capacity(map.len());
        for (name, raw) in map {
            let wrapped = raw
                .as_object()
                .filter(|o| o.len() == 1)
                .and_then(|o| o.get("lax"));
            let (bound, lax) = match wrapped {
                Some(inner) => (inner, true),
                None => (raw, false),
            };
            if let Some(constraint) = parse_constraint(name, bound)? {
                specs.push(ConstraintSpec { constraint, lax });
            }
        }
        Self::new(specs)
    }

    /// Evaluate in declaration order instead of canonical order.
    pub fn with_declared_order(mut self) -> Self {
        self.order = (0..self.entries.len()).collect();
        self.declared_order = true;
        self
    }

    /// Whether evaluation follows declaration order.
    pub fn is_declared_order(&self) -> bool {
        self.declared_order
    }

    /// Number of specs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Specs in declaration order.
    pub fn specs(&self) -> impl Iterator<Item = &ConstraintSpec> {
        self.entries.iter().map(|e| &e.spec)
    }

    /// Specs in evaluation order.
    pub fn evaluation_order(&self) -> impl Iterator<Item = &ConstraintSpec> {
        self.order
            .iter()
            .filter_map(|&i| self.entries.get(i))
            .map(|e| &e.spec)
    }

    /// Look up a spec by constraint name.
    pub fn get(&self, name: &str) -> Option<&ConstraintSpec> {
        self.specs().find(|s| s.name() == name)
    }

    /// JSON object of `name → bound`, in the same shape `from_json` accepts.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.specs().map(ConstraintSpec::to_json).collect())
    }

    /// Apply every spec to `value`.
    ///
    /// Lax specs transform the value in place; strict violations are
    /// collected and evaluation continues with the untransformed value.
    ///
    /// # Errors
    ///
    /// Returns every violated spec when at least one failed.
    pub fn evaluate(
        &self,
        value: Value,
        rounding: RoundingMode,
    ) -> Result<Value, ConstraintViolations> {
        let contains = self.entries.iter().find_map(|e| match &e.spec.constraint {
            Constraint::Contains(item) => Some(item),
            _ => None,
        });

        let mut current = value;
        let mut violations = Vec::new();
        for entry in self.order.iter().filter_map(|&i| self.entries.get(i)) {
            let check = Check {
                constraint: &entry.spec.constraint,
                lax: entry.spec.lax,
                regex: entry.regex.as_ref(),
                contains,
                rounding,
            };
            match check.apply(&current) {
                Ok(None) => {}
                Ok(Some(next)) => {
                    trace!(constraint = entry.spec.name(), "lax constraint transformed value");
                    current = next;
                }
                Err(violation) => violations.push(violation),
            }
        }

        if violations.is_empty() {
            Ok(current)
        } else {
            Err(ConstraintViolations(violations))
        }
    }
}

impl PartialEq for ConstraintSet {
    fn eq(&self, other: &Self) -> bool {
        self.declared_order == other.declared_order && self.specs().eq(other.specs())
    }
}

// ─── Definition Checks ───────────────────────────────────────────────

fn find<'a>(specs: &'a [ConstraintSpec], name: &str) -> Option<&'a Constraint> {
    specs
        .iter()
        .find(|s| s.name() == name)
        .map(|s| &s.constraint)
}

fn check_definition(specs: &[ConstraintSpec]) -> Result<(), ConfigError> {
    let mut seen: Vec<&str> = Vec::with_capacity(specs.len());
    for spec in specs {
        let name = spec.name();
        if seen.contains(&name) {
            return Err(ConfigError::new(format!("duplicate constraint `{name}`")));
        }
        seen.push(name);

        if spec.lax && !spec.constraint.allows_lax() {
            return Err(ConfigError::new(format!(
                "`{name}` cannot be lax: satisfying it would require adding information"
            )));
        }

        match &spec.constraint {
            Constraint::Gt(b) | Constraint::Ge(b) | Constraint::Lt(b) | Constraint::Le(b) => {
                if !(b.is_number() || matches!(b, Value::Str(_) | Value::Bytes(_))) {
                    return Err(ConfigError::new(format!(
                        "bound of `{name}` must be a number, text or bytes, got {}",
                        b.type_name()
                    )));
                }
            }
            Constraint::MultipleOf(step) => {
                if !step.is_number() || step.compare(&Value::Int(0)) != Some(Ordering::Greater) {
                    return Err(ConfigError::new(format!(
                        "`multiple_of` must be a positive number, got {step}"
                    )));
                }
            }
            Constraint::Enum(choices) if choices.is_empty() => {
                return Err(ConfigError::new("`enum` needs at least one choice"));
            }
            _ => {}
        }
    }

    if find(specs, "length").is_some()
        && (find(specs, "min_length").is_some() || find(specs, "max_length").is_some())
    {
        return Err(ConfigError::new(
            "`length` cannot be combined with `min_length` or `max_length`",
        ));
    }
    if let (Some(Constraint::MinLength(lo)), Some(Constraint::MaxLength(hi))) =
        (find(specs, "min_length"), find(specs, "max_length"))
    {
        if lo > hi {
            return Err(ConfigError::new(format!(
                "`min_length` {lo} exceeds `max_length` {hi}"
            )));
        }
    }

    let lowers = ["gt", "ge"]
        .into_iter()
        .filter_map(|n| find(specs, n).map(|c| (n, c.bound())));
    for (lower_name, lower) in lowers {
        for upper_name in ["lt", "le"] {
            let Some(upper) = find(specs, upper_name).map(Constraint::bound) else {
                continue;
            };
            match lower.compare(&upper) {
                None => {
                    return Err(ConfigError::new(format!(
                        "`{lower_name}` bound {lower} is not comparable with `{upper_name}` bound {upper}"
                    )))
                }
                Some(Ordering::Greater) => {
                    return Err(ConfigError::new(format!(
                        "`{upper_name}` bound {upper} is below `{lower_name}` bound {lower}"
                    )))
                }
                _ => {}
            }
        }
    }

    let has_contains = find(specs, "contains").is_some();
    let min_contains = find(specs, "min_contains");
    let max_contains = find(specs, "max_contains");
    if !has_contains && (min_contains.is_some() || max_contains.is_some()) {
        return Err(ConfigError::new(
            "`min_contains`/`max_contains` require `contains`",
        ));
    }
    if let (Some(Constraint::MinContains(lo)), Some(Constraint::MaxContains(hi))) =
        (min_contains, max_contains)
    {
        if lo > hi {
            return Err(ConfigError::new(format!(
                "`min_contains` {lo} exceeds `max_contains` {hi}"
            )));
        }
    }
    Ok(())
}

fn parse_constraint(
    name: &str,
    bound: &serde_json::Value,
) -> Result<Option<Constraint>, ConfigError> {
    let count = || {
        bound
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                ConfigError::new(format!(
                    "`{name}` must be a non-negative integer, got {bound}"
                ))
            })
    };
    let places = || {
        bound
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                ConfigError::new(format!(
                    "`{name}` must be a non-negative integer, got {bound}"
                ))
            })
    };
    let value = || Value::from(bound.clone());

    let constraint = match name {
        "gt" => Constraint::Gt(value()),
        "ge" => Constraint::Ge(value()),
        "lt" => Constraint::Lt(value()),
        "le" => Constraint::Le(value()),
        "length" => Constraint::Length(count()?),
        "min_length" => Constraint::MinLength(count()?),
        "max_length" => Constraint::MaxLength(count()?),
        "regex" => match bound.as_str() {
            Some(pattern) => Constraint::Regex(pattern.to_string()),
            None => {
                return Err(ConfigError::new(format!(
                    "`regex` must be a string, got {bound}"
                )))
            }
        },
        "const" => Constraint::Const(value()),
        "enum" => match bound.as_array() {
            Some(items) => Constraint::Enum(items.iter().cloned().map(Value::from).collect()),
            None => {
                return Err(ConfigError::new(format!(
                    "`enum` must be an array, got {bound}"
                )))
            }
        },
        "max_digits" => Constraint::MaxDigits(places()?),
        "decimal_places" => Constraint::DecimalPlaces(places()?),
        "multiple_of" => Constraint::MultipleOf(value()),
        "contains" => Constraint::Contains(value()),
        "min_contains" => Constraint::MinContains(count()?),
        "max_contains" => Constraint::MaxContains(count()?),
        "unique_items" => match bound.as_bool() {
            Some(true) => Constraint::UniqueItems,
            Some(false) => return Ok(None),
            None => {
                return Err(ConfigError::new(format!(
                    "`unique_items` must be a boolean, got {bound}"
                )))
            }
        },
        other => return Err(ConfigError::new(format!("unknown constraint `{other}`"))),
    };
    Ok(Some(constraint))
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(specs: Vec<ConstraintSpec>) -> ConstraintSet {
        ConstraintSet::new(specs).unwrap()
    }

    #[test]
    fn test_collects_every_strict_violation() {
        let s = set(vec![
            Constraint::Ge(Value::Int(18)).strict(),
            Constraint::MultipleOf(Value::Int(2)).strict(),
        ]);
        let err = s.evaluate(Value::Int(7), RoundingMode::HalfEven).unwrap_err();
        assert_eq!(err.names(), vec!["ge", "multiple_of"]);
        assert_eq!(err.violations()[0].actual, Value::Int(7));
    }

    #[test]
    fn test_lax_then_strict_sees_transformed_value() {
        let s = set(vec![
            Constraint::MultipleOf(Value::Int(5)).strict(),
            Constraint::Le(Value::Int(10)).lax(),
        ]);
        assert_eq!(
            s.evaluate(Value::Int(12), RoundingMode::HalfEven),
            Ok(Value::Int(10))
        );
    }

    #[test]
    fn test_declared_order_override() {
        let specs = vec![
            Constraint::MultipleOf(Value::Int(5)).lax(),
            Constraint::Ge(Value::Int(7)).lax(),
        ];
        let canonical = set(specs.clone());
        let declared = set(specs).with_declared_order();
        // canonical: ge first (3 → 7), then multiple_of (7 → 5)
        assert_eq!(
            canonical.evaluate(Value::Int(3), RoundingMode::HalfEven),
            Ok(Value::Int(5))
        );
        // declared: multiple_of first (3 → 0), then ge (0 → 7)
        assert_eq!(
            declared.evaluate(Value::Int(3), RoundingMode::HalfEven),
            Ok(Value::Int(7))
        );
        assert_eq!(
            canonical.evaluation_order().map(ConstraintSpec::name).collect::<Vec<_>>(),
            vec!["ge", "multiple_of"]
        );
    }

    #[test]
    fn test_length_excludes_min_and_max() {
        let err = ConstraintSet::new(vec![
            Constraint::Length(3).strict(),
            Constraint::MaxLength(5).strict(),
        ])
        .unwrap_err();
        assert!(err.reason.contains("`length`"));
    }

    #[test]
    fn test_conflicting_range_bounds() {
        assert!(ConstraintSet::new(vec![
            Constraint::Ge(Value::Int(10)).strict(),
            Constraint::Le(Value::Int(5)).strict(),
        ])
        .is_err());
        assert!(ConstraintSet::new(vec![
            Constraint::Ge(Value::Int(1)).strict(),
            Constraint::Le(Value::from("z")).strict(),
        ])
        .is_err());
        assert!(ConstraintSet::new(vec![
            Constraint::Gt(Value::Int(0)).strict(),
            Constraint::Lt(Value::Float(0.5)).strict(),
        ])
        .is_ok());
    }

    #[test]
    fn test_lax_forbidden_specs_rejected() {
        for constraint in [
            Constraint::Gt(Value::Int(0)),
            Constraint::Lt(Value::Int(0)),
            Constraint::MinLength(1),
            Constraint::Contains(Value::Int(1)),
        ] {
            assert!(ConstraintSet::new(vec![constraint.lax()]).is_err());
        }
    }

    #[test]
    fn test_contains_family_requires_contains() {
        assert!(ConstraintSet::new(vec![Constraint::MaxContains(1).strict()]).is_err());
        assert!(ConstraintSet::new(vec![
            Constraint::Contains(Value::Int(1)).strict(),
            Constraint::MinContains(3).strict(),
            Constraint::MaxContains(2).strict(),
        ])
        .is_err());
    }

    #[test]
    fn test_invalid_regex_and_multiple_of() {
        assert!(ConstraintSet::new(vec![Constraint::Regex("(".into()).strict()]).is_err());
        assert!(ConstraintSet::new(vec![Constraint::MultipleOf(Value::Int(0)).strict()]).is_err());
        assert!(ConstraintSet::new(vec![Constraint::Enum(vec![]).strict()]).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(ConstraintSet::new(vec![
            Constraint::MaxLength(3).strict(),
            Constraint::MaxLength(4).lax(),
        ])
        .is_err());
    }

    #[test]
    fn test_from_json_reads_lax_wrapper() {
        let s = ConstraintSet::from_json(&json!({
            "max_length": {"lax": 3},
            "regex": "^[a-z]+$",
            "unique_items": false
        }))
        .unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.get("max_length").unwrap().lax);
        assert!(!s.get("regex").unwrap().lax);
        assert_eq!(
            s.evaluate(Value::from("abcd"), RoundingMode::HalfEven),
            Ok(Value::from("abc"))
        );
        assert_eq!(ConstraintSet::from_json(&s.to_json()).unwrap(), s);
    }

    #[test]
    fn test_from_json_rejects_bad_declarations() {
        assert!(ConstraintSet::from_json(&json!({"maxlen": 3})).is_err());
        assert!(ConstraintSet::from_json(&json!({"max_length": -1})).is_err());
        assert!(ConstraintSet::from_json(&json!({"gt": {"lax": 0}})).is_err());
        assert!(ConstraintSet::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_max_contains_uses_contains_item() {
        let s = set(vec![
            Constraint::Contains(Value::from("a")).strict(),
            Constraint::MaxContains(2).lax(),
        ]);
        assert_eq!(
            s.evaluate(Value::from(vec!["a", "b", "a", "a"]), RoundingMode::HalfEven),
            Ok(Value::from(vec!["a", "b", "a"]))
        );
    }

    #[test]
    fn test_empty_set_passes_everything() {
        let s = ConstraintSet::empty();
        assert!(s.is_empty());
        assert_eq!(
            s.evaluate(Value::Null, RoundingMode::HalfEven),
            Ok(Value::Null)
        );
    }
}
