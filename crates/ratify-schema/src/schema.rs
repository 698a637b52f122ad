//! # Record Schemas
//!
//! A [`RecordSchema`] is an immutable, ordered set of [`Field`]s plus the
//! record-level options, storage strategy and an optional whole-record
//! validation hook. Schemas are built once through [`RecordSchemaBuilder`],
//! which rejects inconsistent definitions with `ConfigError`, and are then
//! shared as `Arc<RecordSchema>` across any number of concurrent parses.
//!
//! ## Definition checks
//!
//! - field names are unique;
//! - input keys (primary and fallback aliases) are unique across fields,
//!   compared case-insensitively when either field matches case-insensitively;
//! - every `depends_on` name is a declared field;
//! - only computed fields and deferred defaults declare dependencies;
//! - the computed/deferred dependency graph is acyclic;
//! - `exclude` is never combined with a required field;
//! - the options pass [`ParseOptions::validate`].

use std::fmt;
use std::sync::Arc;

use ratify_core::{
    ConfigError, ConversionError, ParseContext, ParseError, ParseOptions, Path, PathSegment,
    RatifyError, Value,
};
use ratify_transform::TransformerRegistry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::field::{DefaultPolicy, ErrorPolicy, Field};
use crate::record::Record;
use crate::resolver;
use crate::rule::Env;
use crate::table::SchemaTable;

/// Whole-record validation hook.
pub type ValidatorFn = Arc<dyn Fn(&Record) -> Result<(), RatifyError> + Send + Sync>;

/// Backing-store strategy of parsed records.
///
/// The strategy decides when computed fields and deferred defaults are
/// evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    /// Ordered key-value container. Computed values are produced eagerly
    /// at construction and recomputed immediately when a dependency is set.
    #[default]
    Mapping,
    /// Named-field struct. Computed values are produced on first read and
    /// invalidated, not recomputed, when a dependency is set.
    Attribute,
}

// ─── Record Schema ───────────────────────────────────────────────────

/// An immutable record definition.
pub struct RecordSchema {
    name: String,
    fields: Vec<Field>,
    options: ParseOptions,
    storage: Storage,
    validator: Option<ValidatorFn>,
    registry: Option<Arc<TransformerRegistry>>,
    derived_order: Vec<usize>,
}

impl RecordSchema {
    /// Start defining a schema named `name`.
    pub fn builder(name: impl Into<String>) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            options: ParseOptions::default(),
            storage: Storage::default(),
            validator: None,
            registry: None,
        }
    }

    /// The schema name; also the type name of nested record objects.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Position of the field named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Record-level options used when parsing with [`RecordSchema::parse`].
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// The storage strategy.
    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// The whole-record validation hook, if any.
    pub fn validator(&self) -> Option<&ValidatorFn> {
        self.validator.as_ref()
    }

    /// Computed fields and deferred defaults, dependencies first.
    pub(crate) fn derived_order(&self) -> &[usize] {
        &self.derived_order
    }

    fn registry(&self) -> &TransformerRegistry {
        self.registry
            .as_deref()
            .unwrap_or_else(|| ratify_transform::global())
    }

    /// Parse `input` with the schema's own options.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` whose children locate every failure.
    pub fn parse(self: &Arc<Self>, input: &Value) -> Result<Record, ParseError> {
        self.parse_with(input, self.options.clone())
    }

    /// Parse `input` with explicit options.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` whose children locate every failure.
    pub fn parse_with(self: &Arc<Self>, input: &Value, options: ParseOptions) -> Result<Record, ParseError> {
        self.parse_in(input, options, None)
    }

    pub(crate) fn parse_in(
        self: &Arc<Self>,
        input: &Value,
        options: ParseOptions,
        table: Option<&Arc<SchemaTable>>,
    ) -> Result<Record, ParseError> {
        let snapshot = self.registry().snapshot();
        let env = Env {
            snapshot: &snapshot,
            table,
        };
        let mut ctx = ParseContext::new(options);
        resolver::resolve(self, input, &mut ctx, &env).map_err(into_parse_error)
    }

    /// Parse a sequence or mapping whose members are records of this schema.
    ///
    /// Each member is resolved with the context path extended by its index
    /// (sequences) or key (mappings).
    ///
    /// # Errors
    ///
    /// Returns every member's failures in one `ParseError`, or a conversion
    /// failure at the root when `input` is not a container.
    pub fn parse_many(self: &Arc<Self>, input: &Value) -> Result<RecordCollection, ParseError> {
        let snapshot = self.registry().snapshot();
        let env = Env {
            snapshot: &snapshot,
            table: None,
        };
        let mut ctx = ParseContext::new(self.options.clone());
        let mut errors = ParseError::new(Path::root());

        if let Some(items) = input.elements() {
            let mut records = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match ctx.descend(i, |ctx| resolver::resolve(self, item, ctx, &env)) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        errors.absorb(&Path::root().child(i), e);
                        if ctx.fail_fast() {
                            break;
                        }
                    }
                }
            }
            return if errors.is_empty() {
                Ok(RecordCollection::Sequence(records))
            } else {
                Err(errors)
            };
        }

        let Value::Map(map) = input else {
            return Err(ParseError::single(
                Path::root(),
                ConversionError::new(
                    format!("collection of {}", self.name),
                    input.clone(),
                    "expected a sequence or mapping of records",
                )
                .into(),
            ));
        };
        let mut records = Vec::with_capacity(map.len());
        for (key, item) in map.iter() {
            let segment = PathSegment::Key(key.to_string());
            let at = Path::root().child(segment.clone());
            match ctx.descend(segment, |ctx| resolver::resolve(self, item, ctx, &env)) {
                Ok(record) => records.push((key.clone(), record)),
                Err(e) => {
                    errors.absorb(&at, e);
                    if ctx.fail_fast() {
                        break;
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(RecordCollection::Mapping(records))
        } else {
            Err(errors)
        }
    }

    /// Resolve a nested record into an [`Value::Object`].
    pub(crate) fn resolve_nested(
        self: &Arc<Self>,
        input: &Value,
        ctx: &mut ParseContext,
        env: &Env<'_>,
    ) -> Result<Value, RatifyError> {
        resolver::resolve(self, input, ctx, env)?.to_object()
    }

    /// Structural metadata for schema exporters: field names, aliases,
    /// constraint specs, modes and flags.
    pub fn describe(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|field| {
                let mut entry = field.describe();
                if let serde_json::Value::Object(map) = &mut entry {
                    map.insert("secret".into(), field.is_secret(&self.options).into());
                    if field.modes().is_declared() {
                        let modes: serde_json::Map<String, serde_json::Value> = field
                            .modes()
                            .entries()
                            .iter()
                            .map(|(mode, access)| {
                                (
                                    mode.clone(),
                                    serde_json::json!({
                                        "input": access.input,
                                        "output": access.output,
                                    }),
                                )
                            })
                            .collect();
                        map.insert("modes".into(), serde_json::Value::Object(modes));
                    }
                }
                (field.name().to_string(), entry)
            })
            .collect();
        serde_json::json!({
            "name": self.name,
            "storage": self.storage,
            "fields": fields,
        })
    }
}

impl fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("storage", &self.storage)
            .field("validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

fn into_parse_error(error: RatifyError) -> ParseError {
    match error {
        RatifyError::Parse(p) => p,
        other => ParseError::single(Path::root(), other),
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Collects fields and settings, then validates them into a schema.
#[must_use]
pub struct RecordSchemaBuilder {
    name: String,
    fields: Vec<Field>,
    options: ParseOptions,
    storage: Storage,
    validator: Option<ValidatorFn>,
    registry: Option<Arc<TransformerRegistry>>,
}

impl RecordSchemaBuilder {
    /// Append a field.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Record-level options.
    pub fn options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Backing-store strategy.
    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    /// Whole-record validation hook, run after every field resolved.
    pub fn validator(
        mut self,
        validator: impl Fn(&Record) -> Result<(), RatifyError> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Resolve conversions through `registry` instead of the global one.
    pub fn registry(mut self, registry: Arc<TransformerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the definition.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for any of the checks listed in the module
    /// documentation.
    pub fn build(self) -> Result<Arc<RecordSchema>, ConfigError> {
        self.options.validate()?;
        check_names(&self.fields)?;
        check_input_keys(&self.fields, &self.options)?;
        check_policies(&self.fields)?;
        let derived_order = derived_order(&self.fields)?;
        debug!(
            schema = %self.name,
            fields = self.fields.len(),
            derived = derived_order.len(),
            "record schema built"
        );
        Ok(Arc::new(RecordSchema {
            name: self.name,
            fields: self.fields,
            options: self.options,
            storage: self.storage,
            validator: self.validator,
            registry: self.registry,
            derived_order,
        }))
    }
}

fn check_names(fields: &[Field]) -> Result<(), ConfigError> {
    for (i, field) in fields.iter().enumerate() {
        if fields[..i].iter().any(|f| f.name() == field.name()) {
            return Err(ConfigError::new(format!(
                "duplicate field name `{}`",
                field.name()
            )));
        }
    }
    Ok(())
}

fn check_input_keys(fields: &[Field], options: &ParseOptions) -> Result<(), ConfigError> {
    let mut seen: Vec<(&str, bool, &str)> = Vec::new();
    for field in fields.iter().filter(|f| !f.is_computed()) {
        let sensitive = field.is_case_sensitive(options);
        let mut own: Vec<&str> = Vec::new();
        for key in field.input_keys() {
            if own.contains(&key) {
                return Err(ConfigError::new(format!(
                    "field `{}` lists input key `{key}` twice",
                    field.name()
                )));
            }
            own.push(key);
            let clash = seen.iter().find(|(other, other_sensitive, _)| {
                if sensitive && *other_sensitive {
                    *other == key
                } else {
                    other.to_lowercase() == key.to_lowercase()
                }
            });
            if let Some((_, _, owner)) = clash {
                return Err(ConfigError::new(format!(
                    "input key `{key}` of field `{}` is already used by field `{owner}`",
                    field.name()
                )));
            }
        }
        seen.extend(own.into_iter().map(|k| (k, sensitive, field.name())));
    }
    Ok(())
}

fn check_policies(fields: &[Field]) -> Result<(), ConfigError> {
    for field in fields {
        for dep in field.dependencies() {
            if !fields.iter().any(|f| f.name() == dep) {
                return Err(ConfigError::new(format!(
                    "field `{}` depends on unknown field `{dep}`",
                    field.name()
                )));
            }
            if dep == field.name() {
                return Err(ConfigError::new(format!(
                    "field `{}` depends on itself",
                    field.name()
                )));
            }
        }
        let deferred = matches!(field.default_policy(), Some(DefaultPolicy::Deferred { .. }));
        if !field.dependencies().is_empty() && !field.is_computed() && !deferred {
            return Err(ConfigError::new(format!(
                "field `{}` declares dependencies but is neither computed nor deferred",
                field.name()
            )));
        }
        let required_somewhere = field.is_required(None)
            || field
                .modes()
                .entries()
                .iter()
                .any(|(mode, _)| field.is_required(Some(mode)));
        if field.error_policy() == ErrorPolicy::Exclude && required_somewhere {
            return Err(ConfigError::new(format!(
                "field `{}` is required and cannot use the exclude error policy",
                field.name()
            )));
        }
        if field.is_computed() && field.default_policy().is_some() {
            return Err(ConfigError::new(format!(
                "computed field `{}` cannot declare a default",
                field.name()
            )));
        }
    }
    Ok(())
}

/// Topological order of fields with dependencies.
fn derived_order(fields: &[Field]) -> Result<Vec<usize>, ConfigError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Active,
        Done,
    }

    fn visit(
        index: usize,
        fields: &[Field],
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) -> Result<(), ConfigError> {
        match marks[index] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                return Err(ConfigError::new(format!(
                    "dependency cycle through field `{}`",
                    fields[index].name()
                )))
            }
            Mark::Unvisited => {}
        }
        marks[index] = Mark::Active;
        for dep in fields[index].dependencies() {
            if let Some(d) = fields.iter().position(|f| f.name() == dep) {
                visit(d, fields, marks, order)?;
            }
        }
        marks[index] = Mark::Done;
        if is_derived(&fields[index]) {
            order.push(index);
        }
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; fields.len()];
    let mut order = Vec::new();
    for index in 0..fields.len() {
        visit(index, fields, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn is_derived(field: &Field) -> bool {
    field.is_computed() || matches!(field.default_policy(), Some(DefaultPolicy::Deferred { .. }))
}

// ─── Record Collections ──────────────────────────────────────────────

/// Records parsed from a top-level container.
#[derive(Debug, Clone)]
pub enum RecordCollection {
    /// From a sequence, in input order.
    Sequence(Vec<Record>),
    /// From a mapping, keyed by the input key.
    Mapping(Vec<(Value, Record)>),
}

impl RecordCollection {
    /// Number of records.
    pub fn len(&self) -> usize {
        match self {
            Self::Sequence(r) => r.len(),
            Self::Mapping(r) => r.len(),
        }
    }

    /// Whether no records were parsed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The records, in input order.
    pub fn records(&self) -> Vec<&Record> {
        match self {
            Self::Sequence(r) => r.iter().collect(),
            Self::Mapping(r) => r.iter().map(|(_, record)| record).collect(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
