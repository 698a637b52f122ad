//! # Constraint Checks
//!
//! Semantics of each individual constraint. A strict check either passes
//! the value through untouched or reports a [`ConstraintError`]. A lax
//! check replaces a non-conforming value with a conforming one by
//! discarding information, and only reports an error when no such
//! replacement exists (e.g. `length` on a value that is too short).
//!
//! Every lax transformation here is idempotent: applying it to its own
//! output leaves the output unchanged.

use std::cmp::Ordering;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use ratify_core::{ConstraintError, RoundingMode, Value};

use crate::constraint::Constraint;

/// Result of applying one constraint: `Ok(None)` leaves the value as is,
/// `Ok(Some(v))` replaces it with `v`.
pub(crate) type Step = Result<Option<Value>, ConstraintError>;

/// One constraint, ready to apply.
pub(crate) struct Check<'a> {
    pub(crate) constraint: &'a Constraint,
    pub(crate) lax: bool,
    pub(crate) regex: Option<&'a Regex>,
    /// Bound of the sibling `contains` spec, for `min_contains`/`max_contains`.
    pub(crate) contains: Option<&'a Value>,
    pub(crate) rounding: RoundingMode,
}

impl Check<'_> {
    pub(crate) fn apply(&self, value: &Value) -> Step {
        match self.constraint {
            Constraint::Gt(bound) => self.range(value, bound, |o| o == Ordering::Greater),
            Constraint::Ge(bound) => self.range(value, bound, |o| o != Ordering::Less),
            Constraint::Lt(bound) => self.range(value, bound, |o| o == Ordering::Less),
            Constraint::Le(bound) => self.range(value, bound, |o| o != Ordering::Greater),
            Constraint::Length(n) => self.length(value, Some(*n), Some(*n)),
            Constraint::MinLength(n) => self.length(value, Some(*n), None),
            Constraint::MaxLength(n) => self.length(value, None, Some(*n)),
            Constraint::Regex(_) => self.pattern(value),
            Constraint::Const(constant) => {
                if value == constant {
                    Ok(None)
                } else if self.lax {
                    Ok(Some(constant.clone()))
                } else {
                    Err(self.fail(value))
                }
            }
            Constraint::Enum(choices) => {
                if choices.iter().any(|c| c.loose_eq(value)) {
                    return Ok(None);
                }
                match choices.first() {
                    Some(first) if self.lax => Ok(Some(first.clone())),
                    _ => Err(self.fail(value)),
                }
            }
            Constraint::MaxDigits(n) => self.max_digits(value, *n),
            Constraint::DecimalPlaces(n) => self.decimal_places(value, *n),
            Constraint::MultipleOf(step) => self.multiple_of(value, step),
            Constraint::Contains(item) => match occurrences(value, item) {
                Some(count) if count > 0 => Ok(None),
                Some(_) => Err(self.fail(value)),
                None => Err(self.not_a_container(value)),
            },
            Constraint::MinContains(n) => self.count_contains(value, Some(*n), None),
            Constraint::MaxContains(n) => self.count_contains(value, None, Some(*n)),
            Constraint::UniqueItems => self.unique_items(value),
        }
    }

    fn fail(&self, actual: &Value) -> ConstraintError {
        ConstraintError::new(
            self.constraint.name(),
            self.constraint.bound(),
            actual.clone(),
        )
    }

    fn not_a_container(&self, value: &Value) -> ConstraintError {
        self.fail(value)
            .with_detail(format!("{} has no members to inspect", value.type_name()))
    }

    fn strategy(&self) -> RoundingStrategy {
        match self.rounding {
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
        }
    }

    // ─── Range ───────────────────────────────────────────────────────

    fn range(&self, value: &Value, bound: &Value, holds: impl Fn(Ordering) -> bool) -> Step {
        let Some(ordering) = value.compare(bound) else {
            return Err(self.fail(value).with_detail(format!(
                "{} is not comparable with {}",
                value.type_name(),
                bound.type_name()
            )));
        };
        if holds(ordering) {
            return Ok(None);
        }
        if !self.lax {
            return Err(self.fail(value));
        }
        let lower = matches!(self.constraint, Constraint::Ge(_));
        Ok(Some(clamp_to(bound, value, lower)))
    }

    // ─── Length ──────────────────────────────────────────────────────

    fn length(&self, value: &Value, min: Option<usize>, max: Option<usize>) -> Step {
        let size = value.size();
        let too_short = min.is_some_and(|m| size < m);
        let too_long = max.is_some_and(|m| size > m);
        if !too_short && !too_long {
            return Ok(None);
        }
        match max {
            Some(limit) if self.lax && !too_short => Ok(Some(truncate(value, limit))),
            _ => Err(self.fail(value).with_detail(format!("length is {size}"))),
        }
    }

    // ─── Pattern ─────────────────────────────────────────────────────

    fn pattern(&self, value: &Value) -> Step {
        let Some(regex) = self.regex else {
            return Err(self.fail(value).with_detail("pattern is not compiled"));
        };
        let Some(text) = value.as_str() else {
            return Err(self
                .fail(value)
                .with_detail(format!("{} is not text", value.type_name())));
        };
        if !self.lax {
            return if regex.is_match(text) {
                Ok(None)
            } else {
                Err(self.fail(value))
            };
        }
        match regex.find(text) {
            Some(m) if m.as_str() == text => Ok(None),
            Some(m) => Ok(Some(Value::Str(m.as_str().to_string()))),
            None => Err(self.fail(value).with_detail("no match to keep")),
        }
    }

    // ─── Numeric ─────────────────────────────────────────────────────

    fn number(&self, value: &Value) -> Result<Decimal, ConstraintError> {
        if !value.is_number() {
            return Err(self
                .fail(value)
                .with_detail(format!("{} is not a number", value.type_name())));
        }
        value
            .as_decimal()
            .ok_or_else(|| self.fail(value).with_detail("number has no exact decimal form"))
    }

    fn max_digits(&self, value: &Value, limit: u32) -> Step {
        let d = self.number(value)?;
        let (digits, scale) = digit_counts(d);
        if digits <= limit {
            return Ok(None);
        }
        if self.lax {
            for dp in (0..scale).rev() {
                let rounded = d.round_dp_with_strategy(dp, self.strategy());
                if digit_counts(rounded).0 <= limit {
                    return Ok(Some(restore_kind(value, rounded)));
                }
            }
            return Err(self.fail(value).with_detail(format!(
                "has {digits} digits, still too many with all decimals removed"
            )));
        }
        Err(self.fail(value).with_detail(format!("has {digits} digits")))
    }

    fn decimal_places(&self, value: &Value, places: u32) -> Step {
        let d = self.number(value)?;
        let (_, scale) = digit_counts(d);
        if scale <= places {
            return Ok(None);
        }
        if !self.lax {
            return Err(self
                .fail(value)
                .with_detail(format!("has {scale} decimal places")));
        }
        let rounded = d.round_dp_with_strategy(places, self.strategy());
        Ok(Some(restore_kind(value, rounded)))
    }

    fn multiple_of(&self, value: &Value, step: &Value) -> Step {
        let d = self.number(value)?;
        let Some(step) = step.as_decimal().filter(|s| !s.is_zero()) else {
            return Err(self.fail(value).with_detail("step is not a usable number"));
        };
        let Some(remainder) = d.checked_rem(step) else {
            return Err(self.fail(value).with_detail("remainder overflows"));
        };
        if remainder.is_zero() {
            return Ok(None);
        }
        if !self.lax {
            return Err(self
                .fail(value)
                .with_detail(format!("remainder is {}", remainder.normalize())));
        }
        let floored = d
            .checked_div(step)
            .map(|q| q.floor())
            .and_then(|q| q.checked_mul(step));
        match floored {
            Some(lower) => Ok(Some(restore_kind(value, lower.normalize()))),
            None => Err(self.fail(value).with_detail("rounding to a multiple overflows")),
        }
    }

    // ─── Array ───────────────────────────────────────────────────────

    fn count_contains(&self, value: &Value, min: Option<usize>, max: Option<usize>) -> Step {
        let Some(item) = self.contains else {
            return Err(self.fail(value).with_detail("no `contains` item declared"));
        };
        let Some(count) = occurrences(value, item) else {
            return Err(self.not_a_container(value));
        };
        let too_few = min.is_some_and(|m| count < m);
        let too_many = max.is_some_and(|m| count > m);
        if !too_few && !too_many {
            return Ok(None);
        }
        let err = || {
            self.fail(value)
                .with_detail(format!("{item} occurs {count} time(s)"))
        };
        match max {
            Some(keep) if self.lax && !too_few => drop_surplus(value, item, keep).map(Some).ok_or_else(err),
            _ => Err(err()),
        }
    }

    fn unique_items(&self, value: &Value) -> Step {
        let Some(items) = value.elements() else {
            return Err(self.not_a_container(value));
        };
        let mut kept: Vec<Value> = Vec::with_capacity(items.len());
        let mut duplicate = None;
        for item in items {
            if kept.iter().any(|k| k.loose_eq(item)) {
                duplicate.get_or_insert_with(|| item.clone());
            } else {
                kept.push(item.clone());
            }
        }
        match duplicate {
            None => Ok(None),
            Some(_) if self.lax => Ok(Some(value.with_elements(kept))),
            Some(dup) => Err(self.fail(value).with_detail(format!("duplicate item {dup}"))),
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Express `bound` in the numeric kind of `template`.
///
/// Integers round toward the permitted side so a clamped integer stays an
/// integer and still satisfies the bound.
fn clamp_to(bound: &Value, template: &Value, lower: bool) -> Value {
    match template {
        Value::Int(_) => bound
            .as_decimal()
            .map(|d| if lower { d.ceil() } else { d.floor() })
            .and_then(|d| d.to_i64())
            .map_or_else(|| bound.clone(), Value::Int),
        Value::Float(_) => bound.as_f64().map_or_else(|| bound.clone(), Value::Float),
        Value::Decimal(_) => bound
            .as_decimal()
            .map_or_else(|| bound.clone(), Value::Decimal),
        _ => bound.clone(),
    }
}

/// Put a decimal result back into the numeric kind of `template`.
fn restore_kind(template: &Value, d: Decimal) -> Value {
    match template {
        Value::Int(_) => d.to_i64().map_or(Value::Decimal(d), Value::Int),
        Value::Float(_) => d.to_f64().map_or(Value::Decimal(d), Value::Float),
        _ => Value::Decimal(d),
    }
}

/// `(total digits, decimal places)` of a number, trailing zeros ignored.
///
/// Leading zeros after the point count as digits, so `0.001` has three.
pub(crate) fn digit_counts(d: Decimal) -> (u32, u32) {
    let n = d.normalize();
    let scale = n.scale();
    let mantissa = u32::try_from(n.mantissa().unsigned_abs().to_string().len()).unwrap_or(u32::MAX);
    (mantissa.max(scale), scale)
}

/// Keep the first `limit` units of a value's size.
///
/// Values without a native size are truncated on their string form and
/// re-parsed into their original kind when the result still fits.
pub(crate) fn truncate(value: &Value, limit: usize) -> Value {
    match value {
        Value::Str(s) => Value::Str(s.chars().take(limit).collect()),
        Value::Bytes(b) => Value::Bytes(b.iter().take(limit).copied().collect()),
        Value::List(v) | Value::Tuple(v) | Value::Set(v) => {
            value.with_elements(v.iter().take(limit).cloned().collect())
        }
        Value::Map(m) => {
            let mut m = m.clone();
            m.truncate(limit);
            Value::Map(m)
        }
        Value::Object(o) => {
            let mut o = o.clone();
            o.fields.truncate(limit);
            Value::Object(o)
        }
        other => {
            let text: String = other.to_string().chars().take(limit).collect();
            let reparsed = match other {
                Value::Int(_) => text.parse::<i64>().ok().map(Value::Int),
                Value::Float(_) => text.parse::<f64>().ok().map(Value::Float),
                Value::Decimal(_) => Decimal::from_str(&text).ok().map(Value::Decimal),
                _ => None,
            };
            match reparsed {
                Some(v) if v.size() <= limit => v,
                _ => Value::Str(text),
            }
        }
    }
}

/// How many times `item` occurs in `value`, or `None` for non-containers.
///
/// Text counts non-overlapping substring matches; maps count keys.
pub(crate) fn occurrences(value: &Value, item: &Value) -> Option<usize> {
    match value {
        Value::Str(s) => item.as_str().map(|needle| s.matches(needle).count()),
        Value::List(v) | Value::Tuple(v) | Value::Set(v) => {
            Some(v.iter().filter(|x| x.loose_eq(item)).count())
        }
        Value::Map(m) => Some(m.keys().filter(|k| k.loose_eq(item)).count()),
        _ => None,
    }
}

/// Remove occurrences of `item` beyond the first `keep`.
fn drop_surplus(value: &Value, item: &Value, keep: usize) -> Option<Value> {
    match value {
        Value::Str(s) => {
            let needle = item.as_str().filter(|n| !n.is_empty())?;
            let mut text = s.clone();
            // Removing a match can join its neighbours into a new one.
            while text.matches(needle).count() > keep {
                let mut out = String::with_capacity(text.len());
                let mut last = 0;
                for (seen, (idx, m)) in text.match_indices(needle).enumerate() {
                    if seen >= keep {
                        out.push_str(&text[last..idx]);
                        last = idx + m.len();
                    }
                }
                out.push_str(&text[last..]);
                text = out;
            }
            Some(Value::Str(text))
        }
        Value::List(v) | Value::Tuple(v) | Value::Set(v) => {
            let mut seen = 0;
            let kept = v
                .iter()
                .filter(|x| {
                    if x.loose_eq(item) {
                        seen += 1;
                        seen <= keep
                    } else {
                        true
                    }
                })
                .cloned()
                .collect();
            Some(value.with_elements(kept))
        }
        Value::Map(m) => {
            let mut seen = 0;
            let kept = m
                .iter()
                .filter(|(k, _)| {
                    if k.loose_eq(item) {
                        seen += 1;
                        seen <= keep
                    } else {
                        true
                    }
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Some(Value::Map(kept))
        }
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
