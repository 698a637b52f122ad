//! # Record Resolver
//!
//! Turns one input mapping into a [`Record`]. Per field, in declaration
//! order:
//!
//! ```text
//! mode filter ─► locate (primary alias, fallbacks) ─┬─ present ─► rule ─► error policy
//!                                                   └─ missing ─► default policy
//! ```
//!
//! Failures are path-qualified with the field name and either stop the
//! record (fail-fast) or are collected into one aggregate. Computed values
//! and deferred defaults are forced afterwards for mapping storage, then
//! the whole-record hook runs against the assembled record.

use std::borrow::Cow;
use std::sync::Arc;

use ratify_core::{
    ConversionError, ExtraPolicy, ParseContext, ParseError, PathSegment, RatifyError, Value,
    ValueMap,
};
use tracing::{debug, trace, warn};

use crate::field::{DefaultPolicy, ErrorPolicy, Field};
use crate::record::{Record, Slot};
use crate::rule::Env;
use crate::schema::RecordSchema;

/// Resolve `input` against `schema` at the context's current path.
pub(crate) fn resolve(
    schema: &Arc<RecordSchema>,
    input: &Value,
    ctx: &mut ParseContext,
    env: &Env<'_>,
) -> Result<Record, RatifyError> {
    let map: Cow<'_, ValueMap> = match input {
        Value::Map(m) => Cow::Borrowed(m),
        Value::Object(o) => Cow::Owned(o.to_map()),
        other => {
            return Err(ConversionError::new(
                schema.name(),
                other.clone(),
                "record input must be a mapping",
            )
            .into())
        }
    };

    debug!(
        schema = schema.name(),
        path = %ctx.path(),
        fields = schema.fields().len(),
        "resolving record"
    );
    let mark = ctx.warnings_mark();
    let mode = ctx.options().mode.clone();
    let mut errors = ParseError::new(ctx.path().clone());
    let mut slots: Vec<Option<Slot>> = (0..schema.fields().len()).map(|_| None).collect();
    let mut claimed = vec![false; map.len()];

    for (index, field) in schema.fields().iter().enumerate() {
        if field.is_computed() {
            slots[index] = Some(Slot::lazy());
            continue;
        }
        let located = locate(field, &map, ctx);
        claim(field, &map, ctx, &mut claimed);
        let access = field.access(mode.as_deref());
        let found = located
            .filter(|_| access.input)
            .and_then(|i| map.iter().nth(i).map(|(_, v)| v));
        let at = ctx.path().child(field.name());

        let outcome = match found {
            Some(raw) => resolve_present(field, raw, ctx, env),
            None if !access.input && !access.output => Ok(None),
            None => resolve_missing(field, access.input),
        };
        match outcome {
            Ok(slot) => slots[index] = slot,
            Err(e) => {
                errors.absorb(&at, e);
                if ctx.fail_fast() {
                    break;
                }
            }
        }
    }

    if ctx.options().extra == ExtraPolicy::Forbid && !(ctx.fail_fast() && !errors.is_empty()) {
        for (i, (key, _)) in map.iter().enumerate() {
            if !claimed[i] {
                let key = key.to_string();
                let at = ctx.path().child(PathSegment::Field(key.clone()));
                errors.absorb(&at, RatifyError::ExtraField { key });
                if ctx.fail_fast() {
                    break;
                }
            }
        }
    }

    if !errors.is_empty() {
        debug!(schema = schema.name(), errors = errors.len(), "record rejected");
        return Err(errors.into());
    }

    let mut record = Record::new(Arc::clone(schema), slots, ctx, env);
    for &index in schema.derived_order() {
        let field = &schema.fields()[index];
        if record.is_eager(field) {
            if let Err(e) = record.slot_value(index) {
                errors.absorb(&ctx.path().child(field.name()), e);
                if ctx.fail_fast() {
                    break;
                }
            }
        }
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    if let Some(validator) = schema.validator() {
        if let Err(e) = validator(&record) {
            let e = match e {
                e @ RatifyError::RecordValidation { .. } => e,
                other => RatifyError::RecordValidation {
                    reason: other.to_string(),
                },
            };
            return Err(ParseError::single(ctx.path().clone(), e).into());
        }
    }

    record.set_warnings(ctx.warnings()[mark..].to_vec());
    debug!(
        schema = schema.name(),
        warnings = record.warnings().len(),
        "record resolved"
    );
    Ok(record)
}

/// Position of the input entry supplying `field`, trying the primary alias
/// then each fallback.
fn locate(field: &Field, map: &ValueMap, ctx: &ParseContext) -> Option<usize> {
    let sensitive = field.is_case_sensitive(ctx.options());
    field
        .input_keys()
        .find_map(|alias| map.keys().position(|k| key_matches(alias, k, sensitive)))
}

/// Mark every input entry answering to any alias of `field`, including the
/// fallbacks that lost to an earlier alias.
fn claim(field: &Field, map: &ValueMap, ctx: &ParseContext, claimed: &mut [bool]) {
    let sensitive = field.is_case_sensitive(ctx.options());
    for (slot, key) in claimed.iter_mut().zip(map.keys()) {
        if field.input_keys().any(|alias| key_matches(alias, key, sensitive)) {
            *slot = true;
        }
    }
}

fn key_matches(alias: &str, key: &Value, sensitive: bool) -> bool {
    match key.as_str() {
        Some(k) if sensitive => k == alias,
        Some(k) => k.to_lowercase() == alias.to_lowercase(),
        None => false,
    }
}

fn resolve_present(
    field: &Field,
    raw: &Value,
    ctx: &mut ParseContext,
    env: &Env<'_>,
) -> Result<Option<Slot>, RatifyError> {
    let secret = field.is_secret(ctx.options());
    let result = ctx.descend(field.name(), |ctx| field.rule().evaluate(raw, ctx, env));
    let error = match result {
        Ok(v) => {
            trace!(field = field.name(), "field resolved");
            return Ok(Some(Slot::Ready(v)));
        }
        Err(e) if secret => e.redacted(),
        Err(e) => e,
    };
    let at = ctx.path().child(field.name());
    match field.error_policy() {
        ErrorPolicy::Throw => Err(error),
        ErrorPolicy::Exclude => {
            warn!(field = field.name(), path = %at, kind = error.kind_name(), "excluding invalid field");
            ctx.warn_at(at, error);
            Ok(None)
        }
        ErrorPolicy::Preserve => {
            warn!(field = field.name(), path = %at, kind = error.kind_name(), "preserving raw value of invalid field");
            ctx.warn_at(at, error);
            Ok(Some(Slot::Ready(raw.clone())))
        }
    }
}

fn resolve_missing(field: &Field, input: bool) -> Result<Option<Slot>, RatifyError> {
    match field.default_policy() {
        None if input => Err(RatifyError::RequiredMissing),
        None => Ok(None),
        Some(DefaultPolicy::Immediate(v)) => Ok(Some(Slot::Ready(v.clone()))),
        Some(DefaultPolicy::Factory(factory)) => factory().map(|v| Some(Slot::Ready(v))),
        Some(DefaultPolicy::Deferred { .. }) => Ok(Some(Slot::lazy())),
    }
}
