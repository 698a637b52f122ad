//! # Records
//!
//! A [`Record`] is the output of one successful parse: one slot per schema
//! field, plus the non-fatal warnings raised while resolving it.
//!
//! Computed fields and deferred defaults live in lazy slots. Under
//! [`Storage::Mapping`] the resolver forces them before the record is
//! returned and [`Record::set`] recomputes them immediately; under
//! [`Storage::Attribute`] they are computed on first read and a dependency
//! change only clears the cached value.
//!
//! Secret fields hold their real value; only `Display` and `Debug` render
//! the redaction marker.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use ratify_core::{
    ParseContext, ParseError, ParseOptions, Path, PathError, RatifyError, Value, ValueMap,
    REDACTED,
};
use ratify_transform::RegistrySnapshot;
use tracing::trace;

use crate::field::{DefaultPolicy, Field};
use crate::rule::Env;
use crate::schema::{RecordSchema, Storage};
use crate::table::SchemaTable;

/// Storage cell of one field.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// A resolved value.
    Ready(Value),
    /// Computed on first read. `None` inside means a computed field whose
    /// dependencies were absent.
    Lazy(OnceCell<Option<Value>>),
}

impl Slot {
    pub(crate) fn lazy() -> Self {
        Self::Lazy(OnceCell::new())
    }
}

/// A parsed record.
#[derive(Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    slots: Vec<Option<Slot>>,
    warnings: Vec<PathError>,
    options: Arc<ParseOptions>,
    snapshot: Arc<RegistrySnapshot>,
    table: Option<Arc<SchemaTable>>,
}

impl Record {
    pub(crate) fn new(
        schema: Arc<RecordSchema>,
        slots: Vec<Option<Slot>>,
        ctx: &ParseContext,
        env: &Env<'_>,
    ) -> Self {
        Self {
            schema,
            slots,
            warnings: Vec::new(),
            options: ctx.shared_options(),
            snapshot: Arc::clone(env.snapshot),
            table: env.table.cloned(),
        }
    }

    pub(crate) fn set_warnings(&mut self, warnings: Vec<PathError>) {
        self.warnings = warnings;
    }

    /// The schema this record was parsed with.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// The options in effect when the record was parsed.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Non-fatal warnings raised while parsing, e.g. by `preserve` fields.
    pub fn warnings(&self) -> &[PathError] {
        &self.warnings
    }

    /// Whether the field holds a value (forcing nothing).
    pub fn is_present(&self, name: &str) -> bool {
        self.schema
            .index_of(name)
            .and_then(|i| self.slots.get(i))
            .is_some_and(Option::is_some)
    }

    /// Read a field, computing it first if it is lazy.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` for names the schema does not declare, or the
    /// error of a failing computation.
    pub fn get(&self, name: &str) -> Result<Option<&Value>, RatifyError> {
        let index = self.index(name)?;
        self.slot_value(index)
    }

    /// Assign a field after construction.
    ///
    /// The value is validated through the field's rule. Dependent computed
    /// values are recomputed (mapping storage) or invalidated (attribute
    /// storage). A failed recomputation leaves the record unchanged.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField`, `Frozen` for frozen and computed fields, a
    /// `ParseError` located at the field when validation fails, or the
    /// recomputation error.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RatifyError> {
        let index = self.index(name)?;
        if self.schema.fields()[index].is_frozen() {
            return Err(RatifyError::Frozen {
                field: name.to_string(),
            });
        }
        let value = self.validate(index, &value.into())?;
        let saved = self.slots.clone();
        self.slots[index] = Some(Slot::Ready(value));
        if let Err(e) = self.refresh_dependents(name) {
            self.slots = saved;
            return Err(e);
        }
        trace!(schema = self.schema.name(), field = name, "field assigned");
        Ok(())
    }

    /// Export the fields visible for output under `mode` as a mapping keyed
    /// by field name.
    ///
    /// # Errors
    ///
    /// Returns the error of a failing lazy computation.
    pub fn to_value(&self, mode: Option<&str>) -> Result<Value, RatifyError> {
        let mut out = ValueMap::new();
        for (index, field) in self.schema.fields().iter().enumerate() {
            if !field.access(mode).output {
                continue;
            }
            if let Some(v) = self.slot_value(index)? {
                out.insert(Value::from(field.name()), v.clone());
            }
        }
        Ok(Value::Map(out))
    }

    /// Every present field as an object of the schema's type.
    ///
    /// # Errors
    ///
    /// Returns the error of a failing lazy computation.
    pub fn to_object(&self) -> Result<Value, RatifyError> {
        let mut fields = Vec::new();
        for (index, field) in self.schema.fields().iter().enumerate() {
            if let Some(v) = self.slot_value(index)? {
                fields.push((field.name().to_string(), v.clone()));
            }
        }
        Ok(Value::Object(ratify_core::Object::new(self.schema.name(), fields)))
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn index(&self, name: &str) -> Result<usize, RatifyError> {
        self.schema
            .index_of(name)
            .ok_or_else(|| RatifyError::UnknownField {
                field: name.to_string(),
            })
    }

    pub(crate) fn slot_value(&self, index: usize) -> Result<Option<&Value>, RatifyError> {
        match self.slots.get(index) {
            None | Some(None) => Ok(None),
            Some(Some(Slot::Ready(v))) => Ok(Some(v)),
            Some(Some(Slot::Lazy(cell))) => {
                let v = cell.get_or_try_init(|| self.compute(index))?;
                Ok(v.as_ref())
            }
        }
    }

    fn compute(&self, index: usize) -> Result<Option<Value>, RatifyError> {
        let field = &self.schema.fields()[index];
        let mut deps = ValueMap::new();
        for dep in field.dependencies() {
            match self.slot_value(self.index(dep)?)? {
                Some(v) => {
                    deps.insert(Value::from(dep.as_str()), v.clone());
                }
                None if field.is_computed() => return Ok(None),
                None => {}
            }
        }
        trace!(schema = self.schema.name(), field = field.name(), "computing derived value");
        if let Some(compute) = field.compute_fn() {
            return compute(&deps).map(Some);
        }
        match field.default_policy() {
            Some(DefaultPolicy::Deferred { compute, .. }) => compute(&deps).map(Some),
            _ => Ok(None),
        }
    }

    /// Whether a lazy slot of `field` is forced at construction and on
    /// dependency change.
    pub(crate) fn is_eager(&self, field: &Field) -> bool {
        self.schema.storage() == Storage::Mapping
            && !matches!(
                field.default_policy(),
                Some(DefaultPolicy::Deferred {
                    eager_skip: true,
                    ..
                })
            )
    }

    fn validate(&self, index: usize, raw: &Value) -> Result<Value, RatifyError> {
        let field = &self.schema.fields()[index];
        let env = Env {
            snapshot: &self.snapshot,
            table: self.table.as_ref(),
        };
        let mut ctx = ParseContext::with_options(Arc::clone(&self.options));
        let secret = field.is_secret(&self.options);
        ctx.descend(field.name(), |ctx| field.rule().evaluate(raw, ctx, &env))
            .map_err(|e| {
                let e = if secret { e.redacted() } else { e };
                let mut err = ParseError::new(Path::root());
                err.absorb(&Path::root().child(field.name()), e);
                err.into()
            })
    }

    fn refresh_dependents(&mut self, changed: &str) -> Result<(), RatifyError> {
        let schema = Arc::clone(&self.schema);
        let mut changed: Vec<&str> = vec![changed];
        for &index in schema.derived_order() {
            let field = &schema.fields()[index];
            let affected = field
                .dependencies()
                .iter()
                .any(|d| changed.contains(&d.as_str()));
            if !affected || !matches!(self.slots[index], Some(Slot::Lazy(_))) {
                continue;
            }
            self.slots[index] = Some(Slot::lazy());
            if self.is_eager(field) {
                self.slot_value(index)?;
            }
            changed.push(field.name());
        }
        Ok(())
    }

    fn rendered(&self, index: usize, field: &Field) -> Option<String> {
        let value = match self.slots.get(index)? {
            None => return None,
            Some(Slot::Ready(v)) => Some(v),
            Some(Slot::Lazy(cell)) => match cell.get() {
                Some(v) => v.as_ref(),
                None => return Some("<deferred>".to_string()),
            },
        }?;
        if field.is_secret(&self.options) {
            Some(REDACTED.to_string())
        } else {
            Some(value.to_string())
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema.name())?;
        let mut first = true;
        for (index, field) in self.schema.fields().iter().enumerate() {
            if let Some(text) = self.rendered(index, field) {
                if !first {
                    f.write_str(", ")?;
                }
                first = false;
                write!(f, "{}={text}", field.name())?;
            }
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct(self.schema.name());
        for (index, field) in self.schema.fields().iter().enumerate() {
            if let Some(text) = self.rendered(index, field) {
                d.field(field.name(), &text);
            }
        }
        d.finish()
    }
}
