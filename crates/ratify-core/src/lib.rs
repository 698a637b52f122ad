//! # ratify-core — Foundational Types for ratify
//!
//! This crate is the bedrock of the ratify workspace. It defines the value
//! model every parse operates on and the shared vocabulary of the other
//! crates: type descriptors, paths, errors, options and the parse context.
//! Every other crate in the workspace depends on `ratify-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One dynamic value type.** Input, converted output, constraint bounds
//!    and record slots are all [`Value`]s. Strict `==` keeps kinds apart;
//!    [`Value::loose_eq`] is the numeric-aware comparison for membership.
//!
//! 2. **One error family.** Every failure is a [`RatifyError`] variant.
//!    Aggregates ([`ParseError`]) carry absolute [`Path`]s so the failing
//!    leaf is locatable without consulting the schema.
//!
//! 3. **Descriptors, not reflection.** Conversion targets are
//!    [`TypeDescriptor`] values whose metadata (bases, meta label,
//!    attributes, fields) is what registry predicates inspect.
//!
//! 4. **Context owned per call.** A [`ParseContext`] is never shared; depth
//!    is bounded by [`ParseOptions::max_depth`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ratify-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod context;
pub mod error;
pub mod options;
pub mod path;
pub mod types;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use context::ParseContext;
pub use error::{
    ConfigError, ConstraintError, ConstraintViolations, ConversionError, LogicalError,
    LogicalFailure, LogicalKind, ParseError, PathError, RatifyError, REDACTED,
};
pub use options::{ErrorMode, ExtraPolicy, ParseOptions, RoundingMode, DEFAULT_MAX_DEPTH};
pub use path::{Path, PathSegment};
pub use types::{TypeDescriptor, TypeKind};
pub use value::{float_to_decimal, Object, Value, ValueKind, ValueMap};

/// Result alias used across the workspace.
pub type Result<T, E = RatifyError> = std::result::Result<T, E>;
