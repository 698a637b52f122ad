//! # Parse Paths
//!
//! A [`Path`] locates a value from the record root: field names, sequence
//! indices and mapping keys. Every user-visible failure carries one so the
//! offending leaf can be found without re-deriving it from the schema.
//!
//! Rendering: `items[2].name`, `labels["en"]`, and `(root)` for the empty path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step from a container to a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSegment {
    /// A record field by name.
    Field(String),
    /// A sequence element by position.
    Index(usize),
    /// A mapping entry by key (canonical string form).
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Field(name.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// An ordered list of segments from the record root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// The empty (root) path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path of field segments.
    pub fn fields<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self(
            names
                .into_iter()
                .map(|n| PathSegment::Field(n.as_ref().to_string()))
                .collect(),
        )
    }

    /// A copy of this path extended by one segment.
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut next = self.clone();
        next.0.push(segment.into());
        next
    }

    /// Append a segment in place.
    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    /// Remove the last segment.
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// The segments, root first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` starts with every segment of `prefix`.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
                PathSegment::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_display() {
        assert_eq!(Path::root().to_string(), "(root)");
    }

    #[test]
    fn test_mixed_segments_display() {
        let p = Path::fields(["items"])
            .child(2usize)
            .child("name")
            .child(PathSegment::Key("en".into()));
        assert_eq!(p.to_string(), "items[2].name[\"en\"]");
    }

    #[test]
    fn test_push_pop_round() {
        let mut p = Path::root();
        p.push("a");
        p.push(0usize);
        assert_eq!(p.len(), 2);
        assert_eq!(p.pop(), Some(PathSegment::Index(0)));
        assert_eq!(p, Path::fields(["a"]));
    }

    #[test]
    fn test_starts_with() {
        let p = Path::fields(["a", "b"]);
        assert!(p.starts_with(&Path::fields(["a"])));
        assert!(!p.starts_with(&Path::fields(["b"])));
    }
}
