//! # ratify-schema — Rules, Combinators and the Record Resolver
//!
//! The top of the ratify stack. Builds on the constraint engine and the
//! transformer registry to parse untyped input into validated records.
//!
//! ```text
//! RecordSchema ── Field* ── Combinator ── TypeRule ─┬─ Source (type | record | ref)
//!                                                   ├─ ConstraintSet
//!                                                   └─ element / key / value rules
//! ```
//!
//! ## Example
//!
//! ```
//! use ratify_constraint::Constraint;
//! use ratify_core::{TypeDescriptor, Value};
//! use ratify_schema::{Field, RecordSchema, TypeRule};
//!
//! let age = TypeRule::of(TypeDescriptor::int())
//!     .with_constraints(vec![Constraint::Ge(Value::Int(0)).strict()])
//!     .unwrap();
//! let person = RecordSchema::builder("Person")
//!     .field(Field::new("name", TypeDescriptor::str()))
//!     .field(Field::new("age", age))
//!     .build()
//!     .unwrap();
//!
//! let record = person
//!     .parse(&Value::map_from([("name", Value::from("Ann")), ("age", Value::from("41"))]))
//!     .unwrap();
//! assert_eq!(record.get("age").unwrap(), Some(&Value::Int(41)));
//! ```
//!
//! ## Crate Policy
//!
//! - Schemas are immutable after `build` and shared as `Arc`.
//! - Definition errors surface as `ConfigError` from builders, never while
//!   parsing (except a schema reference used outside its table).
//! - Parse failures always carry the full path from the record root.

pub mod combinator;
pub mod field;
pub mod record;
mod resolver;
pub mod rule;
pub mod schema;
pub mod table;

pub use combinator::Combinator;
pub use field::{Access, ComputeFn, DefaultPolicy, ErrorPolicy, FactoryFn, Field, ModeVisibility};
pub use record::Record;
pub use rule::{Source, TypeRule};
pub use schema::{RecordCollection, RecordSchema, RecordSchemaBuilder, Storage, ValidatorFn};
pub use table::{SchemaRef, SchemaTable, SchemaTableBuilder};
