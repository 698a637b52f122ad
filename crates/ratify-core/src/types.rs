//! # Type Descriptors
//!
//! A [`TypeDescriptor`] names the target of a conversion. Built-in
//! descriptors map one-to-one onto [`ValueKind`]s; custom descriptors carry
//! the metadata the transformer registry matches on:
//!
//! - `bases` — names this type extends, consulted by subclass fallback.
//! - `meta` — a metaclass-style label shared by a family of types.
//! - `attributes` — marker attributes checked by attribute-presence matchers.
//! - `fields` — declared field names, used by foreign record adapters to
//!   filter input mappings before construction.
//!
//! No reflection happens at runtime: every predicate is a plain check
//! against this metadata.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueKind};

/// The family a [`TypeDescriptor`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Accepts every value unchanged.
    Any,
    /// The null type.
    Null,
    /// Booleans.
    Bool,
    /// Integers.
    Int,
    /// Floats.
    Float,
    /// Exact decimals.
    Decimal,
    /// Text.
    Str,
    /// Raw bytes.
    Bytes,
    /// Lists.
    List,
    /// Tuples.
    Tuple,
    /// Sets.
    Set,
    /// Mappings.
    Map,
    /// A user-defined or foreign type resolved through the registry.
    Custom,
}

impl TypeKind {
    /// The value kind a built-in type accepts without conversion.
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => Some(ValueKind::Null),
            Self::Bool => Some(ValueKind::Bool),
            Self::Int => Some(ValueKind::Int),
            Self::Float => Some(ValueKind::Float),
            Self::Decimal => Some(ValueKind::Decimal),
            Self::Str => Some(ValueKind::Str),
            Self::Bytes => Some(ValueKind::Bytes),
            Self::List => Some(ValueKind::List),
            Self::Tuple => Some(ValueKind::Tuple),
            Self::Set => Some(ValueKind::Set),
            Self::Map => Some(ValueKind::Map),
            Self::Any | Self::Custom => None,
        }
    }
}

/// Describes a conversion target type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    kind: TypeKind,
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    attributes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
}

macro_rules! builtin {
    ($($(#[$doc:meta])* $fn_name:ident => $kind:ident, $label:literal;)*) => {
        $(
            $(#[$doc])*
            pub fn $fn_name() -> Self {
                Self::builtin(TypeKind::$kind, $label)
            }
        )*
    };
}

impl TypeDescriptor {
    fn builtin(kind: TypeKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            bases: Vec::new(),
            meta: None,
            attributes: BTreeSet::new(),
            fields: Vec::new(),
        }
    }

    builtin! {
        /// The `any` type: identity conversion.
        any => Any, "any";
        /// The `null` type.
        null => Null, "null";
        /// The `bool` type.
        bool => Bool, "bool";
        /// The `int` type.
        int => Int, "int";
        /// The `float` type.
        float => Float, "float";
        /// The `decimal` type.
        decimal => Decimal, "decimal";
        /// The `str` type.
        str => Str, "str";
        /// The `bytes` type.
        bytes => Bytes, "bytes";
        /// The `list` type.
        list => List, "list";
        /// The `tuple` type.
        tuple => Tuple, "tuple";
        /// The `set` type.
        set => Set, "set";
        /// The `map` type.
        map => Map, "map";
    }

    /// A user-defined type with the given name.
    pub fn custom(name: impl Into<String>) -> Self {
        let mut descriptor = Self::builtin(TypeKind::Custom, "");
        descriptor.name = name.into();
        descriptor
    }

    /// Declare a base type name for subclass fallback.
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Attach a metaclass-style label.
    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    /// Add a marker attribute.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.insert(attribute.into());
        self
    }

    /// Declare the field names a foreign record type accepts.
    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// The type family.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared base type names, nearest first.
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// The metaclass label, if any.
    pub fn meta(&self) -> Option<&str> {
        self.meta.as_deref()
    }

    /// Whether the type carries the given marker attribute.
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }

    /// Declared field names (foreign record types).
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether `name` is this type or one of its declared bases.
    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.name == name || self.bases.iter().any(|b| b == name)
    }

    /// Whether `value` already is an instance of this type.
    ///
    /// This is the identity-skip test: a `true` result means conversion is
    /// unnecessary and the registry is not consulted.
    pub fn is_instance(&self, value: &Value) -> bool {
        match self.kind {
            TypeKind::Any => true,
            TypeKind::Custom => {
                matches!(value, Value::Object(o) if o.type_name == self.name)
            }
            builtin => builtin.value_kind() == Some(value.kind()),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    #[test]
    fn test_builtin_instances() {
        assert!(TypeDescriptor::int().is_instance(&Value::Int(3)));
        assert!(!TypeDescriptor::int().is_instance(&Value::Bool(true)));
        assert!(!TypeDescriptor::int().is_instance(&Value::from("3")));
        assert!(TypeDescriptor::any().is_instance(&Value::Null));
    }

    #[test]
    fn test_custom_instance_matches_object_type_name() {
        let point = TypeDescriptor::custom("Point");
        let obj = Value::Object(Object::new("Point", vec![]));
        let other = Value::Object(Object::new("Line", vec![]));
        assert!(point.is_instance(&obj));
        assert!(!point.is_instance(&other));
    }

    #[test]
    fn test_subtype_checks_bases() {
        let email = TypeDescriptor::custom("Email").extends("str");
        assert!(email.is_subtype_of("Email"));
        assert!(email.is_subtype_of("str"));
        assert!(!email.is_subtype_of("int"));
    }

    #[test]
    fn test_metadata_builders() {
        let t = TypeDescriptor::custom("Color")
            .with_meta("Enum")
            .with_attribute("__members__")
            .with_fields(["r", "g", "b"]);
        assert_eq!(t.meta(), Some("Enum"));
        assert!(t.has_attribute("__members__"));
        assert_eq!(t.fields().len(), 3);
        assert_eq!(t.kind(), TypeKind::Custom);
    }
}
