//! Integration test: end-to-end parsing scenarios across the constraint
//! engine, the transformer registry and the record resolver.
//!
//! Every test uses a private `TransformerRegistry` so registrations made
//! elsewhere in the process cannot change the outcome.

use std::sync::Arc;

use ratify_constraint::{Constraint, ConstraintSet};
use ratify_core::{
    LogicalFailure, ParseContext, ParseOptions, Path, RatifyError, TypeDescriptor, Value, REDACTED,
};
use ratify_schema::{Combinator, Field, RecordSchema, Storage, TypeRule};
use ratify_transform::{register_foreign_records, Matcher, TransformerRegistry};
use rust_decimal::Decimal;

fn apply(rule: &Combinator, value: Value) -> Result<Value, RatifyError> {
    rule.apply_in(&value, &mut ParseContext::default(), &TransformerRegistry::new())
}

fn int_rule(constraints: serde_json::Value) -> TypeRule {
    TypeRule::of(TypeDescriptor::int())
        .with_constraints_json(&constraints)
        .unwrap()
}

fn violations(result: Result<Value, RatifyError>) -> Vec<(String, Value, Value)> {
    match result {
        Err(RatifyError::Constraint(v)) => v
            .into_inner()
            .into_iter()
            .map(|c| (c.name, c.expected, c.actual))
            .collect(),
        other => panic!("expected constraint violations, got {other:?}"),
    }
}

// ─── Type Rules ──────────────────────────────────────────────────────

#[test]
fn test_positive_int_from_text_and_negative_fraction() {
    let rule = Combinator::from(int_rule(serde_json::json!({ "gt": 0 })));
    assert_eq!(apply(&rule, Value::from("3")), Ok(Value::Int(3)));
    assert_eq!(
        violations(apply(&rule, Value::Float(-0.5))),
        vec![("gt".to_string(), Value::Int(0), Value::Float(-0.5))]
    );
}

#[test]
fn test_weekday_number_upper_bound() {
    let rule = Combinator::from(int_rule(serde_json::json!({ "ge": 1, "le": 7 })));
    assert_eq!(
        violations(apply(&rule, Value::from("8"))),
        vec![("le".to_string(), Value::Int(7), Value::Int(8))]
    );
}

#[test]
fn test_every_violation_reported_together() {
    let rule = Combinator::from(
        TypeRule::of(TypeDescriptor::int())
            .with_constraints(vec![
                Constraint::Ge(Value::Int(10)).strict(),
                Constraint::MultipleOf(Value::Int(4)).strict(),
            ])
            .unwrap(),
    );
    let found = violations(apply(&rule, Value::Int(3)));
    let names: Vec<&str> = found.iter().map(|(n, _, _)| n.as_str()).collect();
    assert_eq!(names, ["ge", "multiple_of"]);
}

#[test]
fn test_lax_max_length_is_idempotent() {
    let rule = Combinator::from(
        TypeRule::any()
            .with_constraints_json(&serde_json::json!({ "max_length": { "lax": 3 } }))
            .unwrap(),
    );
    let once = apply(&rule, Value::from("abcd")).unwrap();
    assert_eq!(once, Value::from("abc"));
    assert_eq!(apply(&rule, once.clone()), Ok(once));
}

#[test]
fn test_lax_decimal_places_rounds() {
    let rule = Combinator::from(
        TypeRule::of(TypeDescriptor::decimal())
            .with_constraints(vec![Constraint::DecimalPlaces(2).lax()])
            .unwrap(),
    );
    assert_eq!(
        apply(&rule, Value::from("2.345")),
        Ok(Value::Decimal(Decimal::new(234, 2)))
    );
}

#[test]
fn test_conflicting_length_bounds_rejected_at_definition() {
    let err = TypeRule::of(TypeDescriptor::str())
        .with_constraints(vec![
            Constraint::MaxLength(2).strict(),
            Constraint::MinLength(5).strict(),
        ])
        .unwrap_err();
    assert!(err.reason.contains("min_length"));
    assert!(ConstraintSet::from_json(&serde_json::json!({ "max_length": 2, "min_length": 5 })).is_err());
}

// ─── Combinators ─────────────────────────────────────────────────────

fn weekday_or_number() -> Combinator {
    let days: Vec<Value> = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
        .into_iter()
        .map(Value::from)
        .collect();
    Combinator::one_of([
        int_rule(serde_json::json!({ "ge": 1, "le": 7 })),
        TypeRule::of(TypeDescriptor::str())
            .with_constraints(vec![Constraint::Enum(days).strict()])
            .unwrap(),
    ])
    .unwrap()
}

#[test]
fn test_xor_weekday_or_number() {
    let rule = weekday_or_number();
    assert_eq!(apply(&rule, Value::from("6")), Ok(Value::Int(6)));
    assert_eq!(apply(&rule, Value::from("tue")), Ok(Value::from("tue")));

    let Err(RatifyError::Logical(err)) = apply(&rule, Value::from("8")) else {
        panic!("expected logical error");
    };
    assert_eq!(err.failure, LogicalFailure::NoMatch);
    assert_eq!(err.errors.len(), 2);
    assert!(matches!(err.errors[0], RatifyError::Constraint(_)));
    assert!(matches!(err.errors[1], RatifyError::Constraint(_)));
}

#[test]
fn test_nested_combinators() {
    let rule = Combinator::any_of([
        weekday_or_number(),
        Combinator::all_of([
            Combinator::not(TypeDescriptor::int()),
            Combinator::from(TypeRule::of(TypeDescriptor::str()).with_constraints(vec![
                Constraint::Regex("^[a-z]+day$".into()).strict(),
            ]).unwrap()),
        ])
        .unwrap(),
    ])
    .unwrap();
    assert_eq!(apply(&rule, Value::from("3")), Ok(Value::Int(3)));
    assert_eq!(apply(&rule, Value::from("someday")), Ok(Value::from("someday")));
    assert!(apply(&rule, Value::from("99")).is_err());
}

// ─── Records ─────────────────────────────────────────────────────────

fn person() -> Arc<RecordSchema> {
    RecordSchema::builder("Person")
        .field(Field::new("name", TypeDescriptor::str()).alias("name"))
        .field(Field::new("age", TypeDescriptor::int()).alias("age"))
        .build()
        .unwrap()
}

#[test]
fn test_missing_required_field() {
    let err = person()
        .parse(&Value::map_from([("name", Value::from("Ann"))]))
        .unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.paths(), vec![&Path::fields(["age"])]);
    assert_eq!(err.errors[0].error, RatifyError::RequiredMissing);
    assert_eq!(err.errors[0].error.kind_name(), "required_missing");
}

#[test]
fn test_secret_value_kept_but_redacted_on_display() {
    let schema = RecordSchema::builder("Credentials")
        .field(Field::new("user", TypeDescriptor::str()))
        .field(Field::new("key", TypeDescriptor::str()).secret(true))
        .build()
        .unwrap();
    let record = schema
        .parse(&Value::map_from([
            ("user", Value::from("ann")),
            ("key", Value::from("hunter2")),
        ]))
        .unwrap();
    assert_eq!(record.get("key").unwrap(), Some(&Value::from("hunter2")));
    let shown = record.to_string();
    assert!(shown.contains(REDACTED));
    assert!(!shown.contains("hunter2"));
}

#[test]
fn test_collection_of_records_paths() {
    let err = person()
        .parse_many(&Value::List(vec![
            Value::map_from([("name", Value::from("Ann")), ("age", Value::Int(40))]),
            Value::map_from([("name", Value::from("Bob"))]),
            Value::map_from([("age", Value::from("old"))]),
        ]))
        .unwrap_err();
    let paths: Vec<String> = err.paths().iter().map(ToString::to_string).collect();
    assert_eq!(paths, ["[1].age", "[2].name", "[2].age"]);

    let keyed = person()
        .parse_many(&Value::map_from([(
            "ann",
            Value::map_from([("name", Value::from("Ann")), ("age", Value::Int(40))]),
        )]))
        .unwrap();
    assert_eq!(keyed.len(), 1);
}

#[test]
fn test_options_from_yaml_drive_parse() {
    let options = ParseOptions::from_yaml_str("error_mode: fail_fast\ncase_sensitive: false\n").unwrap();
    let err = person()
        .parse_with(&Value::map_from([("AGE", Value::from("x"))]), options)
        .unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.paths(), vec![&Path::fields(["name"])]);
}

#[test]
fn test_schema_registry_and_foreign_records() {
    let registry = Arc::new(TransformerRegistry::new());
    register_foreign_records(&registry, |t| t.meta() == Some("dataclass"));
    registry
        .register(Matcher::exact(["Celsius"]))
        .with(|converter, value, _| {
            let v = converter.convert(value, &TypeDescriptor::float())?;
            Ok(Value::Object(ratify_core::Object::new(
                "Celsius",
                vec![("degrees".into(), v)],
            )))
        });
    let point = TypeDescriptor::custom("Point")
        .with_meta("dataclass")
        .with_fields(["x", "y"]);

    let schema = RecordSchema::builder("Reading")
        .registry(Arc::clone(&registry))
        .storage(Storage::Attribute)
        .field(Field::new("at", point))
        .field(Field::new("temp", TypeDescriptor::custom("Celsius")))
        .build()
        .unwrap();
    let record = schema
        .parse(&Value::map_from([
            (
                "at",
                Value::map_from([("x", Value::Int(1)), ("y", Value::Int(2)), ("z", Value::Int(3))]),
            ),
            ("temp", Value::from("21.5")),
        ]))
        .unwrap();
    let Some(Value::Object(at)) = record.get("at").unwrap() else {
        panic!("expected foreign record");
    };
    assert_eq!(at.fields.len(), 2);
    let Some(Value::Object(temp)) = record.get("temp").unwrap() else {
        panic!("expected converted temperature");
    };
    assert_eq!(temp.get("degrees"), Some(&Value::Float(21.5)));
}
