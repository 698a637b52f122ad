//! # Built-in Coercions
//!
//! The fallback tier of the registry: conversions into the built-in type
//! kinds when no registered entry matches.
//!
//! | target  | accepted inputs                                                   |
//! |---------|-------------------------------------------------------------------|
//! | bool    | bool, 0/1, `true/false/yes/no/on/off/1/0` (any case)              |
//! | int     | int, bool, integral float/decimal, integer text                   |
//! | float   | any number, bool, numeric text                                    |
//! | decimal | any finite number, bool, decimal text                             |
//! | str     | text, numbers, bools, UTF-8 bytes                                 |
//! | bytes   | bytes, text, lists of 0..=255                                     |
//! | list/tuple/set | any sequence                                               |
//! | map     | map, object, sequence of two-element pairs                        |
//! | null    | null                                                              |
//!
//! A float with a fractional part never converts to `int`; the caller
//! receives a `ConversionError` instead of a silently truncated value.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use ratify_core::{float_to_decimal, ConversionError, RatifyError, TypeDescriptor, TypeKind, Value, ValueMap};

use crate::registry::Converter;

pub(crate) fn coerce(
    converter: &Converter<'_>,
    value: &Value,
    target: &TypeDescriptor,
) -> Result<Value, RatifyError> {
    let fail = |reason: &str| -> RatifyError {
        ConversionError::new(target.name(), value.clone(), reason).into()
    };
    match target.kind() {
        TypeKind::Any => Ok(value.clone()),
        TypeKind::Null => match value {
            Value::Null => Ok(Value::Null),
            _ => Err(fail("only null converts to null")),
        },
        TypeKind::Bool => to_bool(value).map(Value::Bool).ok_or_else(|| fail("not a boolean")),
        TypeKind::Int => to_int(value).map_err(|reason| fail(reason)),
        TypeKind::Float => to_float(value).map(Value::Float).ok_or_else(|| fail("not a number")),
        TypeKind::Decimal => to_decimal(value)
            .map(Value::Decimal)
            .ok_or_else(|| fail("not a decimal number")),
        TypeKind::Str => to_str(value).map(Value::Str).ok_or_else(|| fail("not text")),
        TypeKind::Bytes => to_bytes(value).map(Value::Bytes).ok_or_else(|| fail("not bytes")),
        TypeKind::List => sequence(value).map(Value::List).ok_or_else(|| fail("not a sequence")),
        TypeKind::Tuple => sequence(value).map(Value::Tuple).ok_or_else(|| fail("not a sequence")),
        TypeKind::Set => sequence(value)
            .map(Value::set_from)
            .ok_or_else(|| fail("not a sequence")),
        TypeKind::Map => to_map(converter, value)?.map(Value::Map).ok_or_else(|| fail("not a mapping")),
        TypeKind::Custom => Err(fail("no transformer registered for this type")),
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::Float(f) if *f == 0.0 => Some(false),
        Value::Float(f) if *f == 1.0 => Some(true),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_int(value: &Value) -> Result<Value, &'static str> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if !f.is_finite() {
                Err("not a finite number")
            } else if f.fract() != 0.0 {
                Err("number has a fractional part")
            } else {
                float_to_decimal(*f)
                    .and_then(|d| d.to_i64())
                    .map(Value::Int)
                    .ok_or("number is out of integer range")
            }
        }
        Value::Decimal(d) => {
            if !d.fract().is_zero() {
                Err("number has a fractional part")
            } else {
                d.to_i64().map(Value::Int).ok_or("number is out of integer range")
            }
        }
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| "text is not an integer"),
        _ => Err("not an integer"),
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        other => other.as_f64(),
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Str(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        other => other.as_decimal(),
    }
}

fn to_str(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.clone()),
        Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) | Value::Bool(_) => {
            Some(value.to_string())
        }
        _ => None,
    }
}

fn to_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(b) => Some(b.clone()),
        Value::Str(s) => Some(s.as_bytes().to_vec()),
        Value::List(items) | Value::Tuple(items) => items
            .iter()
            .map(|v| v.as_i64().and_then(|i| u8::try_from(i).ok()))
            .collect(),
        _ => None,
    }
}

fn sequence(value: &Value) -> Option<Vec<Value>> {
    value.elements().map(<[Value]>::to_vec)
}

fn to_map(converter: &Converter<'_>, value: &Value) -> Result<Option<ValueMap>, RatifyError> {
    match value {
        Value::Map(m) => Ok(Some(m.clone())),
        Value::Object(o) => Ok(Some(o.to_map())),
        Value::List(items) | Value::Tuple(items) => {
            let mut map = ValueMap::new();
            for item in items {
                let pair = converter.convert(item, &TypeDescriptor::tuple())?;
                match pair.elements() {
                    Some([k, v]) => {
                        map.insert(k.clone(), v.clone());
                    }
                    _ => return Ok(None),
                }
            }
            Ok(Some(map))
        }
        _ => Ok(None),
    }
}
