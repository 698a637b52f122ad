//! # ratify-transform — Transformer Registry
//!
//! Converts raw values into target types. Conversion functions are
//! registered against match criteria of increasing generality; resolution
//! picks the most specific tier, then the highest priority, then the most
//! recent registration, and falls back to built-in coercions.
//!
//! ```text
//! convert(value, target)
//!   │
//!   ├─ value already a target instance? ──► value (registry untouched)
//!   │
//!   ├─ scoped entries ─► global entries
//!   │     exact → subclass → meta → attribute → detector
//!   │
//!   └─ built-in coercions
//! ```
//!
//! The process-wide registry is [`global()`]; standalone registries can be
//! created with [`TransformerRegistry::new`] and shared via `Arc`.

pub mod adapter;
mod builtin;
pub mod matcher;
pub mod registry;

pub use adapter::{foreign_record, register_foreign_records};
pub use matcher::{Detector, Matcher, Tier};
pub use registry::{
    global, Converter, Registrar, RegistrySnapshot, TransformFn, TransformerEntry,
    TransformerRegistry,
};
