//! # Schema Table
//!
//! Self-referential and mutually recursive schemas cannot embed each other
//! by `Arc` (the ownership would be cyclic). They are instead built in two
//! passes through a [`SchemaTableBuilder`]:
//!
//! 1. `declare` every name, obtaining a [`SchemaRef`] (an index into the
//!    table) usable in rules via [`TypeRule::reference`];
//! 2. `define` each declared name with its schema.
//!
//! `build` fails with `ConfigError` when a declared name was never defined
//! or a rule references a slot that does not belong to this table.
//! Recursion at parse time is bounded by the context depth limit.
//!
//! [`TypeRule::reference`]: crate::rule::TypeRule::reference

use std::fmt;
use std::sync::Arc;

use ratify_core::{ConfigError, ParseError, Path, Value};
use tracing::debug;

use crate::record::Record;
use crate::schema::RecordSchema;

/// Handle on a schema declared in a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRef {
    index: usize,
    name: Arc<str>,
}

impl SchemaRef {
    /// Declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot in the table.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// First pass: names. Second pass: definitions.
#[derive(Debug, Default)]
#[must_use]
pub struct SchemaTableBuilder {
    names: Vec<Arc<str>>,
    schemas: Vec<Option<Arc<RecordSchema>>>,
}

impl SchemaTableBuilder {
    /// Reserve a slot for `name`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the name is already declared.
    pub fn declare(&mut self, name: impl Into<String>) -> Result<SchemaRef, ConfigError> {
        let name: Arc<str> = Arc::from(name.into());
        if self.names.contains(&name) {
            return Err(ConfigError::new(format!("schema `{name}` declared twice")));
        }
        self.names.push(Arc::clone(&name));
        self.schemas.push(None);
        Ok(SchemaRef {
            index: self.names.len() - 1,
            name,
        })
    }

    /// Fill the slot of `reference`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the reference does not belong to this
    /// builder, the slot is already defined, or the schema's name differs
    /// from the declared one.
    pub fn define(&mut self, reference: &SchemaRef, schema: Arc<RecordSchema>) -> Result<(), ConfigError> {
        self.check(reference)?;
        if schema.name() != reference.name() {
            return Err(ConfigError::new(format!(
                "schema `{}` defined in the slot declared as `{}`",
                schema.name(),
                reference.name()
            )));
        }
        let slot = &mut self.schemas[reference.index];
        if slot.is_some() {
            return Err(ConfigError::new(format!(
                "schema `{}` defined twice",
                reference.name()
            )));
        }
        *slot = Some(schema);
        Ok(())
    }

    fn check(&self, reference: &SchemaRef) -> Result<(), ConfigError> {
        match self.names.get(reference.index) {
            Some(name) if *name == reference.name => Ok(()),
            _ => Err(ConfigError::new(format!(
                "schema reference `{reference}` does not belong to this table"
            ))),
        }
    }

    /// Finish the table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for undefined names and foreign references.
    pub fn build(self) -> Result<Arc<SchemaTable>, ConfigError> {
        let mut schemas = Vec::with_capacity(self.schemas.len());
        for (name, schema) in self.names.iter().zip(&self.schemas) {
            match schema {
                Some(s) => schemas.push(Arc::clone(s)),
                None => {
                    return Err(ConfigError::new(format!(
                        "schema `{name}` declared but never defined"
                    )))
                }
            }
        }
        for schema in &schemas {
            let mut refs = Vec::new();
            for field in schema.fields() {
                field.rule().references(&mut refs);
            }
            for reference in &refs {
                self.check(reference)?;
            }
        }
        debug!(schemas = schemas.len(), "schema table built");
        Ok(Arc::new(SchemaTable {
            names: self.names,
            schemas,
        }))
    }
}

// ─── Table ───────────────────────────────────────────────────────────

/// A closed set of mutually referencing record schemas.
#[derive(Debug)]
pub struct SchemaTable {
    names: Vec<Arc<str>>,
    schemas: Vec<Arc<RecordSchema>>,
}

impl SchemaTable {
    /// Start a two-pass definition.
    pub fn builder() -> SchemaTableBuilder {
        SchemaTableBuilder::default()
    }

    /// Look up a schema by name.
    pub fn get(&self, name: &str) -> Option<&Arc<RecordSchema>> {
        self.names
            .iter()
            .position(|n| &**n == name)
            .and_then(|i| self.schemas.get(i))
    }

    /// Declared names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| &**n)
    }

    /// Number of schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub(crate) fn lookup(&self, reference: &SchemaRef) -> Result<&Arc<RecordSchema>, ConfigError> {
        match (self.names.get(reference.index), self.schemas.get(reference.index)) {
            (Some(name), Some(schema)) if *name == reference.name => Ok(schema),
            _ => Err(ConfigError::new(format!(
                "schema reference `{reference}` does not belong to this table"
            ))),
        }
    }

    /// Parse `input` as the schema named `name`, resolving references
    /// through this table.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` locating every failure, or a root-level
    /// configuration error for an unknown name.
    pub fn parse(self: &Arc<Self>, name: &str, input: &Value) -> Result<Record, ParseError> {
        let schema = self.get(name).ok_or_else(|| {
            ParseError::single(
                Path::root(),
                ConfigError::new(format!("no schema named `{name}` in table")).into(),
            )
        })?;
        schema.parse_in(input, schema.options().clone(), Some(self))
    }

    /// Metadata of every schema, keyed by name.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.names
                .iter()
                .zip(&self.schemas)
                .map(|(name, schema)| (name.to_string(), schema.describe()))
                .collect(),
        )
    }
}
