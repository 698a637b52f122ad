//! # Logical Combinators
//!
//! Boolean composition of type rules. A combinator tree is immutable once
//! built and evaluates against a single input:
//!
//! | node  | passes when                  | output                         |
//! |-------|------------------------------|--------------------------------|
//! | `And` | every child passes           | last child's output (chained)  |
//! | `Or`  | at least one child passes    | first passing child's output   |
//! | `Xor` | exactly one child passes     | that child's output            |
//! | `Not` | the child fails              | the input, unchanged           |
//!
//! `Or` and `Xor` evaluate each branch against the original input, never a
//! sibling's output. `Xor` always evaluates every branch so ambiguity can
//! be detected. Warnings recorded inside a losing branch are discarded.

use ratify_core::{
    ConfigError, LogicalError, LogicalFailure, LogicalKind, ParseContext, RatifyError, Value,
};
use ratify_transform::TransformerRegistry;

use crate::rule::{Env, TypeRule};
use crate::table::SchemaRef;

/// A tree of type rules joined by logical operators.
#[derive(Debug, Clone)]
pub enum Combinator {
    /// A single type rule.
    Leaf(TypeRule),
    /// Every child must pass; each receives the previous child's output.
    And(Vec<Combinator>),
    /// The first passing child wins.
    Or(Vec<Combinator>),
    /// Exactly one child may pass.
    Xor(Vec<Combinator>),
    /// The child must fail.
    Not(Box<Combinator>),
}

impl Combinator {
    /// `And` over `children`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `children` is empty.
    pub fn all_of(children: impl IntoIterator<Item = impl Into<Combinator>>) -> Result<Self, ConfigError> {
        Ok(Self::And(non_empty(LogicalKind::And, children)?))
    }

    /// `Or` over `children`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `children` is empty.
    pub fn any_of(children: impl IntoIterator<Item = impl Into<Combinator>>) -> Result<Self, ConfigError> {
        Ok(Self::Or(non_empty(LogicalKind::Or, children)?))
    }

    /// `Xor` over `children`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `children` is empty.
    pub fn one_of(children: impl IntoIterator<Item = impl Into<Combinator>>) -> Result<Self, ConfigError> {
        Ok(Self::Xor(non_empty(LogicalKind::Xor, children)?))
    }

    /// `Not` over `child`.
    pub fn not(child: impl Into<Combinator>) -> Self {
        Self::Not(Box::new(child.into()))
    }

    /// Short description used in ambiguity and negation reports.
    pub fn label(&self) -> String {
        let join = |op: &str, children: &[Combinator]| {
            let parts: Vec<String> = children.iter().map(Combinator::label).collect();
            format!("({})", parts.join(op))
        };
        match self {
            Self::Leaf(rule) => rule.label(),
            Self::And(c) => join(" & ", c),
            Self::Or(c) => join(" | ", c),
            Self::Xor(c) => join(" ^ ", c),
            Self::Not(c) => format!("!{}", c.label()),
        }
    }

    /// Structural metadata for schema exporters.
    pub fn describe(&self) -> serde_json::Value {
        let many = |key: &str, children: &[Combinator]| {
            let parts: Vec<serde_json::Value> = children.iter().map(Combinator::describe).collect();
            serde_json::json!({ key: parts })
        };
        match self {
            Self::Leaf(rule) => rule.describe(),
            Self::And(c) => many("all_of", c),
            Self::Or(c) => many("any_of", c),
            Self::Xor(c) => many("one_of", c),
            Self::Not(c) => serde_json::json!({ "not": c.describe() }),
        }
    }

    /// Apply with default options and the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns `LogicalError` when the combinator does not match, or the
    /// leaf's own error for a bare rule.
    pub fn apply(&self, value: &Value) -> Result<Value, RatifyError> {
        self.apply_in(value, &mut ParseContext::default(), ratify_transform::global())
    }

    /// Apply within an existing context and registry.
    ///
    /// # Errors
    ///
    /// See [`Combinator::apply`].
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
        match self {
            Self::Leaf(rule) => rule.evaluate(value, ctx, env),
            Self::And(children) => {
                let mut current = value.clone();
                for (index, child) in children.iter().enumerate() {
                    match child.evaluate(&current, ctx, env) {
                        Ok(next) => current = next,
                        Err(e) => {
                            return Err(LogicalError {
                                kind: LogicalKind::And,
                                failure: LogicalFailure::ChildFailed { index },
                                errors: vec![e],
                            }
                            .into())
                        }
                    }
                }
                Ok(current)
            }
            Self::Or(children) => {
                let mut errors = Vec::with_capacity(children.len());
                for child in children {
                    let mark = ctx.warnings_mark();
                    match child.evaluate(value, ctx, env) {
                        Ok(v) => return Ok(v),
                        Err(e) => {
                            ctx.split_warnings(mark);
                            errors.push(e);
                        }
                    }
                }
                Err(LogicalError {
                    kind: LogicalKind::Or,
                    failure: LogicalFailure::NoMatch,
                    errors,
                }
                .into())
            }
            Self::Xor(children) => {
                let mut errors = Vec::new();
                let mut matched: Vec<(usize, Value, Vec<_>)> = Vec::new();
                for (index, child) in children.iter().enumerate() {
                    let mark = ctx.warnings_mark();
                    let result = child.evaluate(value, ctx, env);
                    let warnings = ctx.split_warnings(mark);
                    match result {
                        Ok(v) => matched.push((index, v, warnings)),
                        Err(e) => errors.push(e),
                    }
                }
                match matched.len() {
                    0 => Err(LogicalError {
                        kind: LogicalKind::Xor,
                        failure: LogicalFailure::NoMatch,
                        errors,
                    }
                    .into()),
                    1 => {
                        let (_, v, warnings) = matched.remove(0);
                        ctx.restore_warnings(warnings);
                        Ok(v)
                    }
                    _ => Err(LogicalError {
                        kind: LogicalKind::Xor,
                        failure: LogicalFailure::Ambiguous {
                            branches: matched
                                .iter()
                                .map(|(i, _, _)| children[*i].label())
                                .collect(),
                        },
                        errors,
                    }
                    .into()),
                }
            }
            Self::Not(child) => {
                let mark = ctx.warnings_mark();
                let result = child.evaluate(value, ctx, env);
                ctx.split_warnings(mark);
                match result {
                    Ok(_) => Err(LogicalError {
                        kind: LogicalKind::Not,
                        failure: LogicalFailure::NegatedMatch {
                            branch: child.label(),
                        },
                        errors: Vec::new(),
                    }
                    .into()),
                    Err(_) => Ok(value.clone()),
                }
            }
        }
    }

    pub(crate) fn references(&self, out: &mut Vec<SchemaRef>) {
        match self {
            Self::Leaf(rule) => rule.references(out),
            Self::And(c) | Self::Or(c) | Self::Xor(c) => {
                c.iter().for_each(|child| child.references(out));
            }
            Self::Not(c) => c.references(out),
        }
    }
}

impl From<TypeRule> for Combinator {
    fn from(rule: TypeRule) -> Self {
        Self::Leaf(rule)
    }
}

impl From<ratify_core::TypeDescriptor> for Combinator {
    fn from(target: ratify_core::TypeDescriptor) -> Self {
        Self::Leaf(TypeRule::of(target))
    }
}

fn non_empty(
    kind: LogicalKind,
    children: impl IntoIterator<Item = impl Into<Combinator>>,
) -> Result<Vec<Combinator>, ConfigError> {
    let children: Vec<Combinator> = children.into_iter().map(Into::into).collect();
    if children.is_empty() {
        return Err(ConfigError::new(format!("{kind} requires at least one branch")));
    }
    Ok(children)
}

// ─── Tests ───────────────────────────────────────────────────────────
