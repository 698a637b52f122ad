//! Integration test: algebraic properties of rules, combinators and the
//! registry, checked with proptest.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use ratify_constraint::Constraint;
use ratify_core::{LogicalFailure, ParseContext, RatifyError, TypeDescriptor, Value};
use ratify_schema::{Combinator, TypeRule};
use ratify_transform::{Matcher, TransformerRegistry};

fn eval(rule: &Combinator, value: &Value, registry: &TransformerRegistry) -> Result<Value, RatifyError> {
    rule.apply_in(value, &mut ParseContext::default(), registry)
}

fn range(lo: i64, hi: i64) -> TypeRule {
    TypeRule::of(TypeDescriptor::int())
        .with_constraints(vec![
            Constraint::Ge(Value::Int(lo)).strict(),
            Constraint::Le(Value::Int(hi)).strict(),
        ])
        .unwrap()
}

fn clamp(lo: i64, hi: i64) -> TypeRule {
    TypeRule::of(TypeDescriptor::int())
        .with_constraints(vec![
            Constraint::Ge(Value::Int(lo)).lax(),
            Constraint::Le(Value::Int(hi)).lax(),
        ])
        .unwrap()
}

proptest! {
    #[test]
    fn and_equals_sequential_application(v in -1000i64..1000, lo in -100i64..0, hi in 0i64..100) {
        let registry = TransformerRegistry::new();
        let a = Combinator::from(clamp(lo, hi));
        let b = Combinator::from(range(lo / 2, hi / 2));
        let both = Combinator::all_of([a.clone(), b.clone()]).unwrap();
        let input = Value::from(v.to_string());

        let first = eval(&a, &input, &registry).unwrap();
        match eval(&b, &first, &registry) {
            Ok(expected) => prop_assert_eq!(eval(&both, &input, &registry), Ok(expected)),
            Err(b_err) => {
                let Err(RatifyError::Logical(err)) = eval(&both, &input, &registry) else {
                    return Err(TestCaseError::fail("And should fail when B fails"));
                };
                prop_assert_eq!(err.failure, LogicalFailure::ChildFailed { index: 1 });
                prop_assert_eq!(err.errors, vec![b_err]);
            }
        }
    }

    #[test]
    fn and_fails_with_first_error_only(v in "[a-z]{1,8}") {
        let registry = TransformerRegistry::new();
        let both = Combinator::all_of([range(0, 10), range(5, 15)]).unwrap();
        let Err(RatifyError::Logical(err)) = eval(&both, &Value::from(v), &registry) else {
            return Err(TestCaseError::fail("non-numeric text must fail"));
        };
        prop_assert_eq!(err.failure, LogicalFailure::ChildFailed { index: 0 });
        prop_assert_eq!(err.errors.len(), 1);
    }

    #[test]
    fn xor_returns_the_single_matching_branch(v in 0i64..30) {
        let registry = TransformerRegistry::new();
        let rule = Combinator::one_of([range(0, 9), range(10, 19), range(20, 29)]).unwrap();
        prop_assert_eq!(eval(&rule, &Value::from(v.to_string()), &registry), Ok(Value::Int(v)));
    }

    #[test]
    fn xor_overlap_is_ambiguous(v in 5i64..=10) {
        let registry = TransformerRegistry::new();
        let rule = Combinator::one_of([range(0, 10), range(5, 15), range(20, 30)]).unwrap();
        let Err(RatifyError::Logical(err)) = eval(&rule, &Value::Int(v), &registry) else {
            return Err(TestCaseError::fail("overlap must be ambiguous"));
        };
        let LogicalFailure::Ambiguous { branches } = err.failure else {
            return Err(TestCaseError::fail("expected ambiguous failure"));
        };
        prop_assert_eq!(branches, vec!["int(ge=0, le=10)".to_string(), "int(ge=5, le=15)".to_string()]);
    }

    #[test]
    fn lax_rule_is_idempotent(s in "[a-zA-Z0-9]{0,20}", n in 0usize..10) {
        let registry = TransformerRegistry::new();
        let rule = Combinator::from(
            TypeRule::of(TypeDescriptor::str())
                .with_constraints(vec![Constraint::MaxLength(n).lax()])
                .unwrap(),
        );
        let once = eval(&rule, &Value::from(s), &registry).unwrap();
        prop_assert_eq!(eval(&rule, &once, &registry).unwrap(), once);
    }

    #[test]
    fn conflicting_length_bounds_never_build(lo in 1usize..50, gap in 1usize..50) {
        let hi = lo - gap.min(lo);
        let result = TypeRule::of(TypeDescriptor::str()).with_constraints(vec![
            Constraint::MinLength(lo).strict(),
            Constraint::MaxLength(hi).strict(),
        ]);
        prop_assert!(result.is_err());
    }
}

#[test]
fn test_later_registration_overrides() {
    let registry = TransformerRegistry::new();
    registry
        .register(Matcher::exact(["Code"]))
        .with(|_, _, _| Ok(Value::from("first")));
    registry
        .register(Matcher::exact(["Code"]))
        .with(|_, _, _| Ok(Value::from("second")));
    let rule = Combinator::from(TypeDescriptor::custom("Code"));
    assert_eq!(eval(&rule, &Value::Null, &registry), Ok(Value::from("second")));
}

#[test]
fn test_explicit_priority_beats_recency() {
    let registry = TransformerRegistry::new();
    registry
        .register(Matcher::exact(["Code"]))
        .priority(5)
        .with(|_, _, _| Ok(Value::from("high")));
    registry
        .register(Matcher::exact(["Code"]))
        .with(|_, _, _| Ok(Value::from("recent")));
    let rule = Combinator::from(TypeDescriptor::custom("Code"));
    assert_eq!(eval(&rule, &Value::Null, &registry), Ok(Value::from("high")));
}

#[test]
fn test_identity_skip_bypasses_registry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registry = TransformerRegistry::new();
    registry.register(Matcher::exact(["int"])).with(move |_, v, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(v.clone())
    });
    let rule = Combinator::from(TypeDescriptor::int());
    assert_eq!(eval(&rule, &Value::Int(4), &registry), Ok(Value::Int(4)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(eval(&rule, &Value::from("4"), &registry), Ok(Value::from("4")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scoped_transformer_only_in_scope() {
    let registry = TransformerRegistry::new();
    registry
        .register(Matcher::exact(["str"]))
        .scope("shout")
        .with(|converter, v, _| {
            let s = converter.convert(v, &TypeDescriptor::any())?;
            Ok(Value::from(s.to_string().to_uppercase()))
        });
    let plain = Combinator::from(TypeDescriptor::str());
    let scoped = Combinator::from(TypeRule::of(TypeDescriptor::str()).scope("shout"));
    assert_eq!(eval(&plain, &Value::Int(7), &registry), Ok(Value::from("7")));
    assert_eq!(eval(&scoped, &Value::from(true), &registry), Ok(Value::from("TRUE")));
}
