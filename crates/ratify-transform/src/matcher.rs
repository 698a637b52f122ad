//! # Match Criteria
//!
//! Predicates deciding whether a registry entry applies to a target type,
//! and the resolution tier a match lands in. Tiers are consulted in order:
//!
//! 1. **Exact**: the target's own name is listed.
//! 2. **Subclass**: one of the target's declared bases is listed.
//! 3. **Meta**: the target's metaclass label matches.
//! 4. **Attribute**: the target declares every listed attribute.
//! 5. **Detector**: a custom predicate accepts the target.
//!
//! Built-in coercions form an implicit sixth tier below all of these.
//!
//! A match-all entry ([`Matcher::any`]) is ranked in the detector tier. It
//! never shadows exact, subclass, meta or attribute entries, whatever their
//! priority or registration order; it only competes with other detectors.

use std::fmt;
use std::sync::Arc;

use ratify_core::TypeDescriptor;

/// Custom detector predicate over a target type.
pub type Detector = Arc<dyn Fn(&TypeDescriptor) -> bool + Send + Sync>;

/// Resolution tier of a match, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// The target type is listed by name.
    Exact,
    /// A base of the target type is listed.
    Subclass,
    /// The target's metaclass label matches.
    Meta,
    /// The target declares every listed attribute.
    Attribute,
    /// A custom detector accepted the target.
    Detector,
}

/// Which target types a registry entry applies to.
#[derive(Clone)]
pub enum Matcher {
    /// Listed type names only.
    Exact(Vec<String>),
    /// Listed type names, falling back to types that declare one as a base.
    Subclass(Vec<String>),
    /// Types carrying this metaclass label.
    Meta(String),
    /// Types declaring every one of these attributes.
    Attributes(Vec<String>),
    /// Types accepted by a custom predicate.
    Detector(Detector),
    /// Every type. Lands in the detector tier, so any more specific tier
    /// still wins over it.
    Any,
}

impl Matcher {
    /// Match the listed type names exactly.
    pub fn exact<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Exact(names.into_iter().map(Into::into).collect())
    }

    /// Match the listed type names and their declared subtypes.
    pub fn subclass<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Subclass(names.into_iter().map(Into::into).collect())
    }

    /// Match types carrying the given metaclass label.
    pub fn meta(label: impl Into<String>) -> Self {
        Self::Meta(label.into())
    }

    /// Match types declaring every listed attribute.
    pub fn attributes<S: Into<String>>(attributes: impl IntoIterator<Item = S>) -> Self {
        Self::Attributes(attributes.into_iter().map(Into::into).collect())
    }

    /// Match types accepted by `predicate`.
    pub fn detector(predicate: impl Fn(&TypeDescriptor) -> bool + Send + Sync + 'static) -> Self {
        Self::Detector(Arc::new(predicate))
    }

    /// Match every type, ranked as a detector.
    pub fn any() -> Self {
        Self::Any
    }

    /// Whether this matcher accepts every type.
    pub fn is_match_all(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// The tier at which this matcher accepts `target`, if it does.
    pub fn tier_for(&self, target: &TypeDescriptor) -> Option<Tier> {
        match self {
            Self::Exact(names) => names
                .iter()
                .any(|n| n == target.name())
                .then_some(Tier::Exact),
            Self::Subclass(names) => {
                if names.iter().any(|n| n == target.name()) {
                    Some(Tier::Exact)
                } else if names.iter().any(|n| target.is_subtype_of(n)) {
                    Some(Tier::Subclass)
                } else {
                    None
                }
            }
            Self::Meta(label) => (target.meta() == Some(label.as_str())).then_some(Tier::Meta),
            Self::Attributes(attrs) => (!attrs.is_empty()
                && attrs.iter().all(|a| target.has_attribute(a)))
            .then_some(Tier::Attribute),
            Self::Detector(predicate) => predicate(target).then_some(Tier::Detector),
            Self::Any => Some(Tier::Detector),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(names) => write!(f, "exact[{}]", names.join(", ")),
            Self::Subclass(names) => write!(f, "subclass[{}]", names.join(", ")),
            Self::Meta(label) => write!(f, "meta[{label}]"),
            Self::Attributes(attrs) => write!(f, "attributes[{}]", attrs.join(", ")),
            Self::Detector(_) => f.write_str("detector"),
            Self::Any => f.write_str("any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_subclass_tiers() {
        let dog = TypeDescriptor::custom("Dog").extends("Animal");
        assert_eq!(Matcher::exact(["Dog"]).tier_for(&dog), Some(Tier::Exact));
        assert_eq!(Matcher::exact(["Animal"]).tier_for(&dog), None);
        assert_eq!(Matcher::subclass(["Animal"]).tier_for(&dog), Some(Tier::Subclass));
        assert_eq!(Matcher::subclass(["Dog"]).tier_for(&dog), Some(Tier::Exact));
    }

    #[test]
    fn test_meta_attribute_and_detector_tiers() {
        let t = TypeDescriptor::custom("Point")
            .with_meta("dataclass")
            .with_attribute("x")
            .with_attribute("y");
        assert_eq!(Matcher::meta("dataclass").tier_for(&t), Some(Tier::Meta));
        assert_eq!(Matcher::attributes(["x", "y"]).tier_for(&t), Some(Tier::Attribute));
        assert_eq!(Matcher::attributes(["x", "z"]).tier_for(&t), None);
        assert_eq!(
            Matcher::detector(|t| t.name().starts_with('P')).tier_for(&t),
            Some(Tier::Detector)
        );
        assert_eq!(Matcher::any().tier_for(&TypeDescriptor::int()), Some(Tier::Detector));
    }

    #[test]
    fn test_tiers_order_best_first() {
        assert!(Tier::Exact < Tier::Subclass);
        assert!(Tier::Attribute < Tier::Detector);
    }
}
