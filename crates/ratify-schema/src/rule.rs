//! # Type Rules
//!
//! A [`TypeRule`] is the atomic validated unit: an optional source type the
//! input is coerced into, an optional element rule (sequences) or key/value
//! rule pair (mappings), and a [`ConstraintSet`] run on the result.
//!
//! Evaluation order:
//!
//! 1. Coerce into the source type through the transformer registry. A
//!    conversion failure is reported as such, not as a constraint
//!    violation. The one exception is a numeric input that fails to convert
//!    (e.g. a fractional float into `int`): when the rule's constraints
//!    reject the raw number too, those violations are reported instead,
//!    since they describe the input more precisely.
//! 2. Apply element rules to each member, extending the path with the
//!    member's index or key.
//! 3. Evaluate the constraint set.
//!
//! A rule with neither source type nor constraints passes input through.

use std::fmt;
use std::sync::Arc;

use ratify_constraint::{ConstraintSet, ConstraintSpec};
use ratify_core::{
    ConfigError, ParseContext, ParseError, PathSegment, RatifyError, TypeDescriptor, Value,
    ValueMap,
};
use ratify_transform::{RegistrySnapshot, TransformerRegistry};
use tracing::trace;

use crate::combinator::Combinator;
use crate::schema::RecordSchema;
use crate::table::{SchemaRef, SchemaTable};

// ─── Evaluation Environment ──────────────────────────────────────────

/// Read-only collaborators shared by every rule evaluated in one parse call.
#[derive(Clone, Copy)]
pub(crate) struct Env<'a> {
    pub(crate) snapshot: &'a Arc<RegistrySnapshot>,
    pub(crate) table: Option<&'a Arc<SchemaTable>>,
}

// ─── Source ──────────────────────────────────────────────────────────

/// What a rule coerces its input into before constraints run.
#[derive(Clone)]
pub enum Source {
    /// A type resolved through the transformer registry.
    Type(TypeDescriptor),
    /// A nested record schema.
    Record(Arc<RecordSchema>),
    /// A record schema in a [`SchemaTable`], by reference.
    Ref(SchemaRef),
}

impl Source {
    /// Name of the source type.
    pub fn name(&self) -> &str {
        match self {
            Self::Type(t) => t.name(),
            Self::Record(schema) => schema.name(),
            Self::Ref(r) => r.name(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(t) => write!(f, "Type({t})"),
            Self::Record(schema) => write!(f, "Record({})", schema.name()),
            Self::Ref(r) => write!(f, "Ref({})", r.name()),
        }
    }
}

// ─── Type Rule ───────────────────────────────────────────────────────

/// Source-type coercion plus constraints.
#[derive(Clone, Default)]
pub struct TypeRule {
    source: Option<Source>,
    constraints: ConstraintSet,
    element: Option<Box<Combinator>>,
    key: Option<Box<Combinator>>,
    value: Option<Box<Combinator>>,
    scope: Option<String>,
    label: Option<String>,
}

impl TypeRule {
    /// A rule accepting any value unchanged.
    pub fn any() -> Self {
        Self::default()
    }

    /// A rule coercing into `target`.
    pub fn of(target: TypeDescriptor) -> Self {
        Self {
            source: Some(Source::Type(target)),
            ..Self::default()
        }
    }

    /// A rule parsing a nested record.
    pub fn record(schema: Arc<RecordSchema>) -> Self {
        Self {
            source: Some(Source::Record(schema)),
            ..Self::default()
        }
    }

    /// A rule parsing a record declared in a schema table.
    pub fn reference(schema: &SchemaRef) -> Self {
        Self {
            source: Some(Source::Ref(schema.clone())),
            ..Self::default()
        }
    }

    /// Attach an already validated constraint set.
    pub fn constrained(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    /// Attach constraints, validating them.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the specs conflict.
    pub fn with_constraints(
        self,
        specs: impl IntoIterator<Item = ConstraintSpec>,
    ) -> Result<Self, ConfigError> {
        Ok(self.constrained(ConstraintSet::new(specs)?))
    }

    /// Attach constraints declared as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown names, ill-typed or conflicting bounds.
    pub fn with_constraints_json(self, json: &serde_json::Value) -> Result<Self, ConfigError> {
        Ok(self.constrained(ConstraintSet::from_json(json)?))
    }

    /// Rule applied to every member of a sequence.
    pub fn each(mut self, rule: impl Into<Combinator>) -> Self {
        self.element = Some(Box::new(rule.into()));
        self
    }

    /// Rule applied to every key of a mapping.
    pub fn keys(mut self, rule: impl Into<Combinator>) -> Self {
        self.key = Some(Box::new(rule.into()));
        self
    }

    /// Rule applied to every value of a mapping.
    pub fn values(mut self, rule: impl Into<Combinator>) -> Self {
        self.value = Some(Box::new(rule.into()));
        self
    }

    /// Resolve conversions in a named registry scope before global entries.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Name used when this rule is reported as a combinator branch.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The source, if one is bound.
    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// The constraint set.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// The registry scope, if any.
    pub fn registry_scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Whether the rule passes every input through unchanged.
    pub fn is_identity(&self) -> bool {
        self.source.is_none()
            && self.constraints.is_empty()
            && self.element.is_none()
            && self.key.is_none()
            && self.value.is_none()
    }

    /// Short human-readable description, e.g. `int(ge=1, le=7)`.
    pub fn label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let base = self.source.as_ref().map_or("any", Source::name);
        if self.constraints.is_empty() {
            return base.to_string();
        }
        let specs: Vec<String> = self.constraints.specs().map(ToString::to_string).collect();
        format!("{base}({})", specs.join(", "))
    }

    /// Structural metadata for schema exporters.
    pub fn describe(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        let source = match &self.source {
            None => serde_json::Value::from("any"),
            Some(Source::Type(t)) => serde_json::Value::from(t.name()),
            Some(Source::Record(schema)) => serde_json::json!({ "record": schema.name() }),
            Some(Source::Ref(r)) => serde_json::json!({ "ref": r.name() }),
        };
        out.insert("type".into(), source);
        if !self.constraints.is_empty() {
            out.insert("constraints".into(), self.constraints.to_json());
        }
        if let Some(element) = &self.element {
            out.insert("items".into(), element.describe());
        }
        if let Some(key) = &self.key {
            out.insert("keys".into(), key.describe());
        }
        if let Some(value) = &self.value {
            out.insert("values".into(), value.describe());
        }
        if let Some(scope) = &self.scope {
            out.insert("scope".into(), serde_json::Value::from(scope.as_str()));
        }
        serde_json::Value::Object(out)
    }

    /// Apply the rule with default options and the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns the conversion, constraint or nested-element failure.
    pub fn apply(&self, value: &Value) -> Result<Value, RatifyError> {
        self.apply_in(value, &mut ParseContext::default(), ratify_transform::global())
    }

    /// Apply the rule within an existing context and registry.
    ///
    /// # Errors
    ///
    /// Returns the conversion, constraint or nested-element failure.
    pub fn apply_in(
        &self,
        value: &Value,
        ctx: &mut ParseContext,
        registry: &TransformerRegistry,
    ) -> Result<Value, RatifyError> {
        let snapshot = registry.snapshot();
        let env = Env {
            snapshot: &snapshot,
            table: None,
        };
        self.evaluate(value, ctx, &env)
    }

    pub(crate) fn evaluate(
        &self,
        value: &Value,
        ctx: &mut ParseContext,
        env: &Env<'_>,
    ) -> Result<Value, RatifyError> {
        let converted = match &self.source {
            None => value.clone(),
            Some(Source::Type(target)) => self.convert(value, target, ctx, env)?,
            Some(Source::Record(schema)) => schema.resolve_nested(value, ctx, env)?,
            Some(Source::Ref(reference)) => {
                let table = env.table.ok_or_else(|| {
                    ConfigError::new(format!(
                        "schema reference `{}` used outside its schema table",
                        reference.name()
                    ))
                })?;
                table.lookup(reference)?.resolve_nested(value, ctx, env)?
            }
        };
        let converted = self.apply_members(converted, ctx, env)?;
        Ok(self
            .constraints
            .evaluate(converted, ctx.options().rounding)?)
    }

    fn convert(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        ctx: &ParseContext,
        env: &Env<'_>,
    ) -> Result<Value, RatifyError> {
        let converter = env
            .snapshot
            .converter(self.scope.as_deref(), ctx.options().max_depth)
            .within(ctx.remaining_depth());
        match converter.convert(value, target) {
            Ok(v) => Ok(v),
            Err(RatifyError::Conversion(failure)) if value.is_number() && !self.constraints.is_empty() => {
                match self.constraints.evaluate(value.clone(), ctx.options().rounding) {
                    Err(violations) => {
                        trace!(target = %target, "reporting constraint violations of unconvertible number");
                        Err(violations.into())
                    }
                    Ok(_) => Err(failure.into()),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn apply_members(
        &self,
        value: Value,
        ctx: &mut ParseContext,
        env: &Env<'_>,
    ) -> Result<Value, RatifyError> {
        if let (Some(rule), Some(items)) = (&self.element, value.elements()) {
            let mut errors = ParseError::new(ctx.path().clone());
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let at = ctx.path().child(i);
                match ctx.descend(i, |ctx| rule.evaluate(item, ctx, env)) {
                    Ok(v) => out.push(v),
                    Err(e) => {
                        errors.absorb(&at, e);
                        if ctx.fail_fast() {
                            break;
                        }
                    }
                }
            }
            return if errors.is_empty() {
                Ok(value.with_elements(out))
            } else {
                Err(errors.into())
            };
        }

        let Value::Map(map) = &value else {
            return Ok(value);
        };
        if self.key.is_none() && self.value.is_none() {
            return Ok(value);
        }
        let mut errors = ParseError::new(ctx.path().clone());
        let mut out = ValueMap::new();
        for (k, v) in map.iter() {
            let segment = PathSegment::Key(k.to_string());
            let at = ctx.path().child(segment.clone());
            let entry = ctx.descend(segment, |ctx| {
                let key = match &self.key {
                    Some(rule) => rule.evaluate(k, ctx, env)?,
                    None => k.clone(),
                };
                let value = match &self.value {
                    Some(rule) => rule.evaluate(v, ctx, env)?,
                    None => v.clone(),
                };
                Ok((key, value))
            });
            match entry {
                Ok((key, value)) => {
                    out.insert(key, value);
                }
                Err(e) => {
                    errors.absorb(&at, e);
                    if ctx.fail_fast() {
                        break;
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(Value::Map(out))
        } else {
            Err(errors.into())
        }
    }

    /// Every schema reference reachable from this rule.
    pub(crate) fn references(&self, out: &mut Vec<SchemaRef>) {
        match &self.source {
            Some(Source::Ref(r)) => out.push(r.clone()),
            Some(Source::Record(schema)) => {
                for field in schema.fields() {
                    field.rule().references(out);
                }
            }
            _ => {}
        }
        for nested in [&self.element, &self.key, &self.value].into_iter().flatten() {
            nested.references(out);
        }
    }
}

impl fmt::Debug for TypeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRule")
            .field("source", &self.source)
            .field("constraints", &self.label())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl From<TypeDescriptor> for TypeRule {
    fn from(target: TypeDescriptor) -> Self {
        Self::of(target)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ratify_constraint::Constraint;
    use ratify_core::{ErrorMode, ParseOptions, Path};

    fn int_rule(specs: Vec<ConstraintSpec>) -> TypeRule {
        TypeRule::of(TypeDescriptor::int()).with_constraints(specs).unwrap()
    }

    fn apply(rule: &TypeRule, value: Value) -> Result<Value, RatifyError> {
        rule.apply_in(&value, &mut ParseContext::default(), &TransformerRegistry::new())
    }

    #[test]
    fn test_nested_conversion_spends_remaining_depth() {
        let registry = TransformerRegistry::new();
        registry
            .register(ratify_transform::Matcher::exact(["Wrapped"]))
            .with(|converter, v, _| converter.convert(v, &TypeDescriptor::str()));
        let rule = TypeRule::of(TypeDescriptor::custom("Wrapped"));
        let mut ctx = ParseContext::new(ParseOptions::default().with_max_depth(3));

        assert_eq!(
            rule.apply_in(&Value::Int(1), &mut ctx, &registry),
            Ok(Value::from("1"))
        );
        let deep = ctx.descend("a", |ctx| {
            ctx.descend("b", |ctx| rule.apply_in(&Value::Int(1), ctx, &registry))
        });
        assert_eq!(deep, Err(RatifyError::DepthExceeded { limit: 3 }));
    }

    #[test]
    fn test_identity_rule_passes_through() {
        let rule = TypeRule::any();
        assert!(rule.is_identity());
        assert_eq!(apply(&rule, Value::from("x")), Ok(Value::from("x")));
    }

    #[test]
    fn test_conversion_failure_is_distinct_from_constraint_failure() {
        let rule = int_rule(vec![Constraint::Gt(Value::Int(0)).strict()]);
        assert!(matches!(
            apply(&rule, Value::from("abc")),
            Err(RatifyError::Conversion(_))
        ));
        assert!(matches!(
            apply(&rule, Value::from("-1")),
            Err(RatifyError::Constraint(_))
        ));
    }

    #[test]
    fn test_unconvertible_number_without_violation_reports_conversion() {
        let rule = int_rule(vec![Constraint::Gt(Value::Int(0)).strict()]);
        assert!(matches!(
            apply(&rule, Value::Float(2.5)),
            Err(RatifyError::Conversion(_))
        ));
    }

    #[test]
    fn test_element_rule_errors_carry_indices() {
        let rule = TypeRule::of(TypeDescriptor::list()).each(int_rule(vec![]));
        let input = Value::List(vec![Value::from("1"), Value::from("x"), Value::from("y")]);
        let Err(RatifyError::Parse(err)) = apply(&rule, input) else {
            panic!("expected aggregate");
        };
        assert_eq!(err.len(), 2);
        assert_eq!(err.errors[0].path, Path::root().child(1usize));
        assert_eq!(err.errors[1].path.to_string(), "[2]");
    }

    #[test]
    fn test_element_rule_fail_fast_stops_at_first() {
        let rule = TypeRule::of(TypeDescriptor::list()).each(int_rule(vec![]));
        let input = Value::List(vec![Value::from("x"), Value::from("y")]);
        let mut ctx = ParseContext::new(ParseOptions::default().with_error_mode(ErrorMode::FailFast));
        let Err(RatifyError::Parse(err)) = rule.apply_in(&input, &mut ctx, &TransformerRegistry::new())
        else {
            panic!("expected aggregate");
        };
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_key_and_value_rules() {
        let rule = TypeRule::of(TypeDescriptor::map())
            .keys(TypeRule::of(TypeDescriptor::str()).with_constraints(vec![
                Constraint::MaxLength(2).lax(),
            ]).unwrap())
            .values(int_rule(vec![]));
        let input = Value::map_from([("abc", Value::from("1")), ("de", Value::from("2"))]);
        let Value::Map(out) = apply(&rule, input).unwrap() else {
            panic!("expected map");
        };
        assert_eq!(out.get_str("ab"), Some(&Value::Int(1)));
        assert_eq!(out.get_str("de"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_value_rule_error_path_uses_key() {
        let rule = TypeRule::of(TypeDescriptor::map()).values(int_rule(vec![]));
        let input = Value::map_from([("en", Value::from("x"))]);
        let Err(RatifyError::Parse(err)) = apply(&rule, input) else {
            panic!("expected aggregate");
        };
        assert_eq!(err.errors[0].path.to_string(), "[\"en\"]");
    }

    #[test]
    fn test_label() {
        let rule = int_rule(vec![
            Constraint::Ge(Value::Int(1)).strict(),
            Constraint::Le(Value::Int(7)).strict(),
        ]);
        assert_eq!(rule.label(), "int(ge=1, le=7)");
        assert_eq!(TypeRule::any().named("weekday").label(), "weekday");
    }
}
