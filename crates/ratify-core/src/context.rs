//! # Parse Context
//!
//! Per-call mutable state: the path from the record root to the value being
//! parsed, the remaining depth budget, the options in effect and the
//! non-fatal warnings collected so far.
//!
//! A context is created once per top-level parse call and owned exclusively
//! by it. Descending into a nested record or container goes through
//! [`ParseContext::descend`], which extends the path and spends one unit of
//! depth for the duration of the closure, then restores both.

use std::sync::Arc;

use crate::error::{PathError, RatifyError};
use crate::options::ParseOptions;
use crate::path::{Path, PathSegment};

/// Mutable state for one parse call.
#[derive(Debug, Clone)]
pub struct ParseContext {
    path: Path,
    remaining_depth: usize,
    options: Arc<ParseOptions>,
    warnings: Vec<PathError>,
}

impl ParseContext {
    /// Create a root context.
    pub fn new(options: ParseOptions) -> Self {
        Self::with_options(Arc::new(options))
    }

    /// Create a root context sharing already-allocated options.
    pub fn with_options(options: Arc<ParseOptions>) -> Self {
        Self {
            path: Path::root(),
            remaining_depth: options.max_depth,
            options,
            warnings: Vec::new(),
        }
    }

    /// The current path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The options in effect.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Shared handle on the options in effect.
    pub fn shared_options(&self) -> Arc<ParseOptions> {
        Arc::clone(&self.options)
    }

    /// How many levels below the root the context currently is.
    pub fn depth(&self) -> usize {
        self.options.max_depth - self.remaining_depth
    }

    /// How many more levels may be entered.
    pub fn remaining_depth(&self) -> usize {
        self.remaining_depth
    }

    /// Whether evaluation should stop at the first failure.
    pub fn fail_fast(&self) -> bool {
        self.options.is_fail_fast()
    }

    /// Run `f` in a child context one segment deeper.
    ///
    /// # Errors
    ///
    /// Returns `RatifyError::DepthExceeded` without calling `f` when the
    /// depth budget is exhausted; otherwise returns whatever `f` returns.
    pub fn descend<T>(
        &mut self,
        segment: impl Into<PathSegment>,
        f: impl FnOnce(&mut Self) -> Result<T, RatifyError>,
    ) -> Result<T, RatifyError> {
        if self.remaining_depth == 0 {
            return Err(RatifyError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }
        self.path.push(segment);
        self.remaining_depth -= 1;
        let result = f(self);
        self.remaining_depth += 1;
        self.path.pop();
        result
    }

    /// Record a non-fatal warning at the current path.
    pub fn warn(&mut self, error: RatifyError) {
        self.warnings.push(PathError::new(self.path.clone(), error));
    }

    /// Record a non-fatal warning at an explicit path.
    pub fn warn_at(&mut self, path: Path, error: RatifyError) {
        self.warnings.push(PathError::new(path, error));
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[PathError] {
        &self.warnings
    }

    /// Position marker for [`ParseContext::split_warnings`].
    pub fn warnings_mark(&self) -> usize {
        self.warnings.len()
    }

    /// Remove and return warnings recorded after `mark`.
    ///
    /// Combinator branches use this to discard warnings from branches that
    /// did not win.
    pub fn split_warnings(&mut self, mark: usize) -> Vec<PathError> {
        if mark >= self.warnings.len() {
            return Vec::new();
        }
        self.warnings.split_off(mark)
    }

    /// Re-append warnings previously split off.
    pub fn restore_warnings(&mut self, warnings: Vec<PathError>) {
        self.warnings.extend(warnings);
    }

    /// Consume the context, yielding its warnings.
    pub fn into_warnings(self) -> Vec<PathError> {
        self.warnings
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}
