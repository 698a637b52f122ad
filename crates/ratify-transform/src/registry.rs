//! # Transformer Registry
//!
//! Maps a target [`TypeDescriptor`] to the conversion function that
//! produces values of that type.
//!
//! ## Resolution
//!
//! Entries are `(matcher, priority, scope, transform)` tuples. For a target:
//!
//! 1. If a scope is active, entries registered under that scope are
//!    searched first; global entries are searched only if none match.
//! 2. Within a search, the best [`Tier`] wins (exact → subclass → meta →
//!    attribute → detector).
//! 3. Within a tier, the highest priority wins. Entries registered without
//!    a priority count as priority 0.
//! 4. Remaining ties go to the most recent registration, so registering
//!    again for the same type is how overrides are expressed.
//! 5. With no matching entry, the built-in coercions apply.
//!
//! A value that already is an instance of the target bypasses the registry
//! entirely.
//!
//! ## Concurrency
//!
//! The entry list lives in an immutable [`RegistrySnapshot`] behind a
//! `parking_lot::RwLock<Arc<_>>`. Registration copies the snapshot, appends
//! and swaps the `Arc` under a short write lock; readers clone the `Arc`
//! and resolve against it without holding any lock.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use ratify_core::{RatifyError, TypeDescriptor, Value, DEFAULT_MAX_DEPTH};

use crate::builtin;
use crate::matcher::{Matcher, Tier};

/// A conversion function: `(converter, raw value, target type) -> value`.
///
/// The converter exposes [`Converter::convert`] for delegating
/// sub-conversions back through the registry.
pub type TransformFn =
    Arc<dyn Fn(&Converter<'_>, &Value, &TypeDescriptor) -> Result<Value, RatifyError> + Send + Sync>;

// ─── Entries ─────────────────────────────────────────────────────────

/// One registered conversion.
pub struct TransformerEntry {
    matcher: Matcher,
    priority: Option<i64>,
    scope: Option<String>,
    sequence: u64,
    transform: TransformFn,
}

impl TransformerEntry {
    /// The entry's match criteria.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The explicit priority, if one was given.
    pub fn priority(&self) -> Option<i64> {
        self.priority
    }

    /// The scope the entry was registered under; `None` is global.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Registration sequence number; larger is more recent.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Ranking within a tier: explicit priority, then recency.
    fn rank(&self) -> (i64, u64) {
        (self.priority.unwrap_or(0), self.sequence)
    }

    /// Invoke the conversion function.
    pub fn apply(
        &self,
        converter: &Converter<'_>,
        value: &Value,
        target: &TypeDescriptor,
    ) -> Result<Value, RatifyError> {
        (self.transform)(converter, value, target)
    }
}

impl fmt::Debug for TransformerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerEntry")
            .field("matcher", &self.matcher)
            .field("priority", &self.priority)
            .field("scope", &self.scope)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

// ─── Snapshot ────────────────────────────────────────────────────────

/// An immutable view of the registry at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: Vec<Arc<TransformerEntry>>,
    next_sequence: u64,
}

impl RegistrySnapshot {
    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry that converts to `target`, or `None` for the built-in
    /// fallback.
    pub fn resolve(&self, target: &TypeDescriptor, scope: Option<&str>) -> Option<Arc<TransformerEntry>> {
        let searches = scope.map(Some).into_iter().chain(std::iter::once(None));
        for wanted in searches {
            let best = self
                .entries
                .iter()
                .filter(|e| e.scope.as_deref() == wanted)
                .filter_map(|e| e.matcher.tier_for(target).map(|tier| (tier, e)))
                .min_by(|(tier_a, a), (tier_b, b)| {
                    tier_a.cmp(tier_b).then_with(|| b.rank().cmp(&a.rank()))
                });
            if let Some((tier, entry)) = best {
                trace!(
                    target = %target,
                    tier = ?tier,
                    matcher = %entry.matcher,
                    scope = wanted.unwrap_or("global"),
                    "resolved transformer"
                );
                return Some(Arc::clone(entry));
            }
        }
        trace!(target = %target, "no transformer registered, using built-in coercion");
        None
    }

    /// A converter over this snapshot.
    pub fn converter<'s>(&'s self, scope: Option<&'s str>, max_depth: usize) -> Converter<'s> {
        Converter {
            snapshot: self,
            scope,
            limit: max_depth,
            remaining: max_depth,
        }
    }
}

// ─── Converter ───────────────────────────────────────────────────────

/// Handle passed to conversion functions for recursive conversion.
///
/// Each nested conversion spends one unit of depth so a transformer that
/// converts back into its own target cannot recurse unboundedly.
#[derive(Debug, Clone, Copy)]
pub struct Converter<'s> {
    snapshot: &'s RegistrySnapshot,
    scope: Option<&'s str>,
    limit: usize,
    remaining: usize,
}

impl<'s> Converter<'s> {
    /// Cap the nesting budget at `remaining`, for conversions started
    /// partway into a deeper parse. The reported limit is unchanged.
    #[must_use]
    pub fn within(self, remaining: usize) -> Self {
        Self {
            remaining: remaining.min(self.limit),
            ..self
        }
    }

    /// The scope this converter resolves in.
    pub fn scope(&self) -> Option<&'s str> {
        self.scope
    }

    /// Convert `value` into `target`.
    ///
    /// # Errors
    ///
    /// Returns the transformer's error, a `ConversionError` from the
    /// built-in coercions, or `DepthExceeded` when nested conversions run
    /// too deep.
    pub fn convert(&self, value: &Value, target: &TypeDescriptor) -> Result<Value, RatifyError> {
        if target.is_instance(value) {
            return Ok(value.clone());
        }
        if self.remaining == 0 {
            return Err(RatifyError::DepthExceeded { limit: self.limit });
        }
        let inner = Converter {
            remaining: self.remaining - 1,
            ..*self
        };
        match self.snapshot.resolve(target, self.scope) {
            Some(entry) => entry.apply(&inner, value, target),
            None => builtin::coerce(&inner, value, target),
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// Process-wide or standalone registry of conversion functions.
pub struct TransformerRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl TransformerRegistry {
    /// Create an empty registry. Built-in coercions are always available.
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::default())),
        }
    }

    /// Begin registering a conversion for targets accepted by `matcher`.
    pub fn register(&self, matcher: Matcher) -> Registrar<'_> {
        Registrar {
            registry: self,
            matcher,
            priority: None,
            scope: None,
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    /// Whether no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    /// Resolve and apply a conversion against the current snapshot.
    ///
    /// # Errors
    ///
    /// See [`Converter::convert`].
    pub fn convert(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        scope: Option<&str>,
    ) -> Result<Value, RatifyError> {
        let snapshot = self.snapshot();
        snapshot.converter(scope, DEFAULT_MAX_DEPTH).convert(value, target)
    }

    fn insert(&self, matcher: Matcher, priority: Option<i64>, scope: Option<String>, transform: TransformFn) {
        if matcher.is_match_all() {
            warn!(
                priority = ?priority,
                scope = scope.as_deref().unwrap_or("global"),
                "match-all transformer registered; it outranks detector entries of lower priority but never a more specific tier"
            );
        }
        let mut guard = self.snapshot.write();
        let mut next = RegistrySnapshot::clone(&guard);
        let sequence = next.next_sequence;
        next.next_sequence += 1;
        debug!(
            matcher = %matcher,
            priority = ?priority,
            scope = scope.as_deref().unwrap_or("global"),
            sequence,
            "registered transformer"
        );
        next.entries.push(Arc::new(TransformerEntry {
            matcher,
            priority,
            scope,
            sequence,
            transform,
        }));
        *guard = Arc::new(next);
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

static GLOBAL: Lazy<TransformerRegistry> = Lazy::new(TransformerRegistry::new);

/// The process-wide registry.
pub fn global() -> &'static TransformerRegistry {
    &GLOBAL
}

// ─── Registrar ───────────────────────────────────────────────────────

/// Builder returned by [`TransformerRegistry::register`].
#[must_use = "a registrar does nothing until `with` is called"]
pub struct Registrar<'r> {
    registry: &'r TransformerRegistry,
    matcher: Matcher,
    priority: Option<i64>,
    scope: Option<String>,
}

impl Registrar<'_> {
    /// Give the entry an explicit priority.
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Register under a named sub-registry instead of globally.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Commit the registration with its conversion function.
    pub fn with<F>(self, transform: F)
    where
        F: Fn(&Converter<'_>, &Value, &TypeDescriptor) -> Result<Value, RatifyError>
            + Send
            + Sync
            + 'static,
    {
        self.registry
            .insert(self.matcher, self.priority, self.scope, Arc::new(transform));
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn constant(v: i64) -> impl Fn(&Converter<'_>, &Value, &TypeDescriptor) -> Result<Value, RatifyError> {
        move |_, _, _| Ok(Value::Int(v))
    }

    #[test]
    fn test_later_registration_overrides() {
        let registry = TransformerRegistry::new();
        registry.register(Matcher::exact(["int"])).with(constant(1));
        registry.register(Matcher::exact(["int"])).with(constant(2));
        let out = registry
            .convert(&Value::from("x"), &TypeDescriptor::int(), None)
            .unwrap();
        assert_eq!(out, Value::Int(2));
    }

    #[test]
    fn test_explicit_priority_beats_recency() {
        let registry = TransformerRegistry::new();
        registry.register(Matcher::exact(["int"])).priority(10).with(constant(1));
        registry.register(Matcher::exact(["int"])).with(constant(2));
        let out = registry
            .convert(&Value::from("x"), &TypeDescriptor::int(), None)
            .unwrap();
        assert_eq!(out, Value::Int(1));
    }

    #[test]
    fn test_negative_priority_loses_to_implicit() {
        let registry = TransformerRegistry::new();
        registry.register(Matcher::exact(["int"])).with(constant(1));
        registry.register(Matcher::exact(["int"])).priority(-1).with(constant(2));
        let out = registry
            .convert(&Value::from("x"), &TypeDescriptor::int(), None)
            .unwrap();
        assert_eq!(out, Value::Int(1));
    }

    #[test]
    fn test_match_all_never_shadows_a_more_specific_tier() {
        let registry = TransformerRegistry::new();
        registry.register(Matcher::any()).priority(100).with(constant(2));
        registry.register(Matcher::exact(["int"])).with(constant(1));
        registry.register(Matcher::subclass(["Number"])).with(constant(3));
        let out = registry
            .convert(&Value::from("x"), &TypeDescriptor::int(), None)
            .unwrap();
        assert_eq!(out, Value::Int(1));
        let money = TypeDescriptor::custom("Money").extends("Number");
        let out = registry.convert(&Value::from("x"), &money, None).unwrap();
        assert_eq!(out, Value::Int(3));
        let other = TypeDescriptor::custom("Other");
        let out = registry.convert(&Value::from("x"), &other, None).unwrap();
        assert_eq!(out, Value::Int(2));
    }

    #[test]
    fn test_match_all_shadows_later_detectors_without_priority() {
        let registry = TransformerRegistry::new();
        registry.register(Matcher::any()).priority(5).with(constant(1));
        registry.register(Matcher::detector(|_| true)).with(constant(2));
        let out = registry
            .convert(&Value::from("x"), &TypeDescriptor::float(), None)
            .unwrap();
        assert_eq!(out, Value::Int(1));
    }

    #[test]
    fn test_subclass_fallback() {
        let registry = TransformerRegistry::new();
        registry
            .register(Matcher::subclass(["Animal"]))
            .with(|_, _, t| Ok(Value::from(t.name())));
        let dog = TypeDescriptor::custom("Dog").extends("Animal");
        assert_eq!(
            registry.convert(&Value::Null, &dog, None).unwrap(),
            Value::from("Dog")
        );
    }

    #[test]
    fn test_identity_skip_bypasses_registry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let registry = TransformerRegistry::new();
        registry.register(Matcher::exact(["int"])).with(move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(0))
        });
        let out = registry
            .convert(&Value::Int(42), &TypeDescriptor::int(), None)
            .unwrap();
        assert_eq!(out, Value::Int(42));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scope_consulted_before_global() {
        let registry = TransformerRegistry::new();
        registry.register(Matcher::exact(["int"])).priority(50).with(constant(1));
        registry
            .register(Matcher::exact(["int"]))
            .scope("legacy")
            .with(constant(2));
        let target = TypeDescriptor::int();
        let x = Value::from("x");
        assert_eq!(registry.convert(&x, &target, Some("legacy")).unwrap(), Value::Int(2));
        assert_eq!(registry.convert(&x, &target, None).unwrap(), Value::Int(1));
        assert_eq!(registry.convert(&x, &target, Some("other")).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_unregistered_target_uses_builtin() {
        let registry = TransformerRegistry::new();
        assert_eq!(
            registry
                .convert(&Value::from("3"), &TypeDescriptor::int(), None)
                .unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_transformer_can_delegate() {
        let registry = TransformerRegistry::new();
        registry.register(Matcher::exact(["Celsius"])).with(|conv, v, _| {
            let f = conv.convert(v, &TypeDescriptor::float())?;
            Ok(Value::Object(ratify_core::Object::new(
                "Celsius",
                vec![("degrees".to_string(), f)],
            )))
        });
        let out = registry
            .convert(&Value::from("21.5"), &TypeDescriptor::custom("Celsius"), None)
            .unwrap();
        let Value::Object(obj) = out else {
            panic!("expected object");
        };
        assert_eq!(obj.get("degrees"), Some(&Value::Float(21.5)));
    }

    #[test]
    fn test_self_recursive_transformer_hits_depth_limit() {
        let registry = TransformerRegistry::new();
        registry
            .register(Matcher::exact(["Loop"]))
            .with(|conv, v, t| conv.convert(v, t));
        let err = registry
            .convert(&Value::Null, &TypeDescriptor::custom("Loop"), None)
            .unwrap_err();
        assert!(matches!(err, RatifyError::DepthExceeded { .. }));
    }

    #[test]
    fn test_snapshot_is_stable_across_registration() {
        let registry = TransformerRegistry::new();
        let before = registry.snapshot();
        registry.register(Matcher::exact(["int"])).with(constant(1));
        assert!(before.is_empty());
        assert_eq!(registry.len(), 1);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Values already of the target kind pass through unchanged even
        /// when a transformer for that kind is registered.
        #[test]
        fn identity_skip_on_ints(v in any::<i64>()) {
            let registry = TransformerRegistry::new();
            registry.register(Matcher::exact(["int"])).with(|_, _, _| Ok(Value::Int(0)));
            let out = registry.convert(&Value::Int(v), &TypeDescriptor::int(), None).unwrap();
            prop_assert_eq!(out, Value::Int(v));
        }

        /// Among same-tier entries without priorities, the last one wins.
        #[test]
        fn most_recent_registration_wins(n in 1usize..8) {
            let registry = TransformerRegistry::new();
            for i in 0..n {
                let marker = i as i64;
                registry.register(Matcher::exact(["int"])).with(move |_, _, _| Ok(Value::Int(marker)));
            }
            let out = registry.convert(&Value::Null, &TypeDescriptor::int(), None).unwrap();
            prop_assert_eq!(out, Value::Int(n as i64 - 1));
        }
    }
}
