//! # ratify-constraint — Named Constraints with Strict and Lax Variants
//!
//! A Type Rule may carry a [`ConstraintSet`]: a validated collection of
//! named constraints (`gt`, `max_length`, `regex`, `enum`, `multiple_of`,
//! `unique_items`, ...). Each constraint is either strict, reporting a
//! violation, or lax, transforming the value toward compliance by
//! discarding information.
//!
//! ## Evaluation
//!
//! ```text
//! value ─► range ─► length ─► pattern ─► const/enum ─► numeric ─► array ─► value'
//!            │         │          │            │            │          │
//!            └─────────┴──── strict violations collected ───┴──────────┘
//! ```
//!
//! All strict violations for one value are reported together in one
//! `ConstraintViolations`, each with its name, declared bound and the
//! offending value.
//!
//! ## Crate Policy
//!
//! - Depends only on `ratify-core` internally.
//! - Definition errors surface from [`ConstraintSet::new`], never from
//!   [`ConstraintSet::evaluate`].

mod check;
pub mod constraint;
pub mod set;

pub use constraint::{Constraint, ConstraintFamily, ConstraintSpec};
pub use set::ConstraintSet;
