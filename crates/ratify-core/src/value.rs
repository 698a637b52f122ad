//! # Value Model — Dynamic Input Representation
//!
//! Every parse call operates on [`Value`], a tagged union over the shapes
//! untyped input can take. Conversion targets, constraint bounds and parsed
//! record slots are all expressed in this one representation.
//!
//! ## Equality
//!
//! - `==` is strict: `Bool(true) != Int(1)` and `Int(1) != Float(1.0)`.
//!   The `const` constraint relies on this.
//! - [`Value::loose_eq`] compares numbers by value across `Int`, `Float`,
//!   `Decimal` and `Bool`. Membership tests (`enum`, `contains`) use it.
//!
//! ## Canonical String Form
//!
//! `Display` renders the canonical string form. Strings render raw (no
//! quotes), scalars render their literal, containers render as compact JSON.
//! Length constraints measure this form when a value has no native size.
//!
//! ## JSON Bridge
//!
//! `From<serde_json::Value>` mirrors the recursive walk of a JSON tree:
//! integers stay integers, other numbers become floats, objects become
//! ordered string-keyed maps.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

// ─── Value Kind ──────────────────────────────────────────────────────

/// The runtime kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// The absent value.
    Null,
    /// `true` / `false`.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// IEEE-754 double.
    Float,
    /// Exact decimal number.
    Decimal,
    /// UTF-8 text.
    Str,
    /// Raw bytes.
    Bytes,
    /// Ordered, mutable-length sequence.
    List,
    /// Ordered, fixed-shape sequence.
    Tuple,
    /// Ordered sequence without duplicates.
    Set,
    /// Ordered key/value mapping.
    Map,
    /// Instance of a named record type.
    Object,
}

impl ValueKind {
    /// Canonical lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Map => "map",
            Self::Object => "object",
        }
    }

    /// Whether values of this kind are numbers (bool excluded).
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Decimal)
    }

    /// Whether values of this kind are element sequences.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::List | Self::Tuple | Self::Set)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Map and Object ──────────────────────────────────────────────────

/// Insertion-ordered mapping with [`Value`] keys.
///
/// Keys are unique under strict equality; inserting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap(Vec<(Value, Value)>);

impl ValueMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace an entry, returning the previous value.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.0.push((key, value));
        None
    }

    /// Look up an entry by exact key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up an entry by string key.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Look up a string key ignoring ASCII/Unicode case.
    ///
    /// Returns the stored key alongside the value so callers can report
    /// which spelling matched.
    pub fn get_str_ignore_case(&self, key: &str) -> Option<(&str, &Value)> {
        let wanted = key.to_lowercase();
        self.0.iter().find_map(|(k, v)| match k.as_str() {
            Some(s) if s.to_lowercase() == wanted => Some((s, v)),
            _ => None,
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(k, _)| k)
    }

    /// Keep only the first `n` entries.
    pub fn truncate(&mut self, n: usize) {
        self.0.truncate(n);
    }

    /// Consume the map, yielding its entries.
    pub fn into_entries(self) -> Vec<(Value, Value)> {
        self.0
    }
}

impl FromIterator<(Value, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// An instance of a named record type, typically produced by a foreign
/// record adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Name of the record type this instance belongs to.
    pub type_name: String,
    /// Field values in declaration order.
    pub fields: Vec<(String, Value)>,
}

impl Object {
    /// Create an instance of `type_name` from its fields.
    pub fn new(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// View the instance as a string-keyed map.
    pub fn to_map(&self) -> ValueMap {
        self.fields
            .iter()
            .map(|(k, v)| (Value::Str(k.clone()), v.clone()))
            .collect()
    }
}

// ─── Value ───────────────────────────────────────────────────────────

/// A dynamically typed input or output value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Exact decimal number.
    Decimal(Decimal),
    /// Text.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Fixed-shape sequence.
    Tuple(Vec<Value>),
    /// Ordered sequence of distinct values.
    Set(Vec<Value>),
    /// Ordered mapping.
    Map(ValueMap),
    /// Named record instance.
    Object(Object),
}

impl Value {
    /// Build a set, dropping strict duplicates while keeping first-seen order.
    pub fn set_from(items: impl IntoIterator<Item = Value>) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Value::Set(out)
    }

    /// Build a string-keyed map from `(name, value)` pairs.
    pub fn map_from<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v))
                .collect(),
        )
    }

    /// The runtime kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::List(_) => ValueKind::List,
            Self::Tuple(_) => ValueKind::Tuple,
            Self::Set(_) => ValueKind::Set,
            Self::Map(_) => ValueKind::Map,
            Self::Object(_) => ValueKind::Object,
        }
    }

    /// Name of the value's type. Objects report their record type name.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Object(o) => &o.type_name,
            other => other.kind().as_str(),
        }
    }

    /// Whether the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value is an `Int`, `Float` or `Decimal`.
    pub fn is_number(&self) -> bool {
        self.kind().is_number()
    }

    /// Borrow the text of a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read an `Int`, or a `Bool` as 0/1.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Read any number (or bool) as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.to_f64(),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Read any number (or bool) as an exact `Decimal`.
    ///
    /// Floats go through their shortest round-trip text form, so `0.1`
    /// becomes exactly `0.1` rather than its binary expansion.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Float(f) => float_to_decimal(*f),
            Self::Decimal(d) => Some(*d),
            Self::Bool(b) => Some(Decimal::from(i64::from(*b))),
            _ => None,
        }
    }

    /// Borrow the elements of a `List`, `Tuple` or `Set`.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) | Self::Tuple(v) | Self::Set(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the entries of a `Map`.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Rebuild a sequence of the same kind from new elements.
    ///
    /// Sets are re-deduplicated. Non-sequence values are returned as a list.
    pub fn with_elements(&self, items: Vec<Value>) -> Value {
        match self {
            Self::Tuple(_) => Self::Tuple(items),
            Self::Set(_) => Self::set_from(items),
            _ => Self::List(items),
        }
    }

    /// Whether the value has a native size (text, bytes, containers).
    pub fn has_native_size(&self) -> bool {
        matches!(
            self,
            Self::Str(_)
                | Self::Bytes(_)
                | Self::List(_)
                | Self::Tuple(_)
                | Self::Set(_)
                | Self::Map(_)
                | Self::Object(_)
        )
    }

    /// Size used by length constraints.
    ///
    /// Text counts characters, containers count members; anything else is
    /// measured by the character count of its canonical string form.
    pub fn size(&self) -> usize {
        match self {
            Self::Str(s) => s.chars().count(),
            Self::Bytes(b) => b.len(),
            Self::List(v) | Self::Tuple(v) | Self::Set(v) => v.len(),
            Self::Map(m) => m.len(),
            Self::Object(o) => o.fields.len(),
            other => other.to_string().chars().count(),
        }
    }

    /// Numeric-aware equality used for membership tests.
    ///
    /// Numbers and bools compare by numeric value; everything else falls
    /// back to strict equality, recursing into containers.
    pub fn loose_eq(&self, other: &Value) -> bool {
        let numeric = |v: &Value| v.is_number() || matches!(v, Value::Bool(_));
        if numeric(self) && numeric(other) {
            return compare_numbers(self, other) == Some(Ordering::Equal);
        }
        match (self, other) {
            (Self::List(a), Self::List(b))
            | (Self::Tuple(a), Self::Tuple(b))
            | (Self::Set(a), Self::Set(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    /// Partial order across numbers, text and bytes.
    ///
    /// Returns `None` when the two values are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => compare_numbers(a, b),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`.
    ///
    /// Decimals become JSON strings to keep their exact digits; non-finite
    /// floats become `null`; map keys use their canonical string form.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Self::Null => J::Null,
            Self::Bool(b) => J::Bool(*b),
            Self::Int(i) => J::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            Self::Decimal(d) => J::String(d.to_string()),
            Self::Str(s) => J::String(s.clone()),
            Self::Bytes(b) => J::String(String::from_utf8_lossy(b).into_owned()),
            Self::List(v) | Self::Tuple(v) | Self::Set(v) => {
                J::Array(v.iter().map(Value::to_json).collect())
            }
            Self::Map(m) => J::Object(
                m.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Self::Object(o) => J::Object(
                o.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Convert an `f64` to an exact decimal through its shortest text form.
pub fn float_to_decimal(f: f64) -> Option<Decimal> {
    if !f.is_finite() {
        return None;
    }
    Decimal::from_str(&f.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(f))
}

fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(_), _) | (_, Value::Float(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => Some(a.as_decimal()?.cmp(&b.as_decimal()?)),
    }
}

// ─── Conversions ─────────────────────────────────────────────────────

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Decimal(Decimal::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            J::String(s) => Value::Str(s),
            J::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            J::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or_else(|_| Value::Decimal(Decimal::from(n)), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Str(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            _ => write!(f, "{}", self.to_json()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_equality_distinguishes_bool_and_int() {
        assert_ne!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_loose_eq_compares_numbers_by_value() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(Value::Decimal(Decimal::new(25, 1)).loose_eq(&Value::Float(2.5)));
        assert!(!Value::Str("1".into()).loose_eq(&Value::Int(1)));
    }

    #[test]
    fn test_compare_across_numeric_kinds() {
        assert_eq!(Value::Int(3).compare(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(
            Value::Decimal(Decimal::new(7, 0)).compare(&Value::Int(7)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Str("a".into()).compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_size_uses_native_length_or_string_form() {
        assert_eq!(Value::Str("héllo".into()).size(), 5);
        assert_eq!(Value::List(vec![Value::Null; 3]).size(), 3);
        assert_eq!(Value::Int(12345).size(), 5);
        assert_eq!(Value::Float(1.5).size(), 3);
    }

    #[test]
    fn test_display_canonical_form() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Str("abc".into()).to_string(), "abc");
        assert_eq!(Value::from(vec![1i64, 2]).to_string(), "[1,2]");
    }

    #[test]
    fn test_from_json_keeps_integers_and_floats_apart() {
        let v = Value::from(json!({"b": 1, "a": [1.5, "x"]}));
        let map = v.as_map().expect("object becomes map");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_str("b"), Some(&Value::Int(1)));
        assert_eq!(
            map.get_str("a"),
            Some(&Value::List(vec![Value::Float(1.5), Value::from("x")]))
        );
    }

    #[test]
    fn test_map_insert_replaces_existing_key() {
        let mut m = ValueMap::new();
        m.insert("k".into(), Value::Int(1));
        let prev = m.insert("k".into(), Value::Int(2));
        assert_eq!(prev, Some(Value::Int(1)));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let m: ValueMap = vec![(Value::from("UserName"), Value::from("x"))]
            .into_iter()
            .collect();
        let (key, _) = m.get_str_ignore_case("username").unwrap();
        assert_eq!(key, "UserName");
        assert!(m.get_str("username").is_none());
    }

    #[test]
    fn test_set_from_dedupes_in_order() {
        let s = Value::set_from(vec![Value::Int(2), Value::Int(1), Value::Int(2)]);
        assert_eq!(s, Value::Set(vec![Value::Int(2), Value::Int(1)]));
    }

    #[test]
    fn test_float_to_decimal_is_exact_on_short_form() {
        assert_eq!(float_to_decimal(0.1), Some(Decimal::new(1, 1)));
        assert_eq!(float_to_decimal(f64::NAN), None);
    }
}
