//! # Fields
//!
//! A [`Field`] binds a name to a combinator plus the policies the record
//! resolver applies around it: input aliases, defaults, mode visibility,
//! mutability, secrecy, dependencies and per-field error handling.

use std::fmt;
use std::sync::Arc;

use ratify_core::{ParseOptions, RatifyError, Value, ValueMap};
use serde::{Deserialize, Serialize};

use crate::combinator::Combinator;
use crate::rule::TypeRule;

/// Zero-argument default producer.
pub type FactoryFn = Arc<dyn Fn() -> Result<Value, RatifyError> + Send + Sync>;

/// Computes a value from the record's already resolved fields.
pub type ComputeFn = Arc<dyn Fn(&ValueMap) -> Result<Value, RatifyError> + Send + Sync>;

// ─── Defaults ────────────────────────────────────────────────────────

/// How a missing field obtains its value.
#[derive(Clone)]
pub enum DefaultPolicy {
    /// A fixed value.
    Immediate(Value),
    /// Called once per record instance.
    Factory(FactoryFn),
    /// Computed from other fields, on first access for attribute storage
    /// or eagerly for mapping storage.
    Deferred {
        /// The producer; receives the resolved fields.
        compute: ComputeFn,
        /// Skip eager evaluation even for mapping storage.
        eager_skip: bool,
    },
}

impl fmt::Debug for DefaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(v) => write!(f, "Immediate({v})"),
            Self::Factory(_) => f.write_str("Factory"),
            Self::Deferred { eager_skip, .. } => write!(f, "Deferred(eager_skip={eager_skip})"),
        }
    }
}

// ─── Error Policy ────────────────────────────────────────────────────

/// What the resolver does when a present field fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Report the failure.
    #[default]
    Throw,
    /// Drop the field and record a warning.
    Exclude,
    /// Keep the raw input value and record a warning.
    Preserve,
}

// ─── Mode Visibility ─────────────────────────────────────────────────

/// Direction a field participates in under one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access {
    /// Read from input during parsing.
    pub input: bool,
    /// Emitted by serialization.
    pub output: bool,
}

impl Access {
    /// Input and output.
    pub const BOTH: Self = Self {
        input: true,
        output: true,
    };
    /// Parse only.
    pub const INPUT: Self = Self {
        input: true,
        output: false,
    };
    /// Serialize only.
    pub const OUTPUT: Self = Self {
        input: false,
        output: true,
    };
}

/// Per-mode participation. With no declarations a field takes part in
/// every mode in both directions; once any mode is declared, modes not
/// listed exclude the field entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeVisibility(Vec<(String, Access)>);

impl ModeVisibility {
    /// Declare access for `mode`.
    pub fn declare(mut self, mode: impl Into<String>, access: Access) -> Self {
        let mode = mode.into();
        self.0.retain(|(m, _)| *m != mode);
        self.0.push((mode, access));
        self
    }

    /// Access under `mode`; `None` as mode means no mode is active.
    pub fn access(&self, mode: Option<&str>) -> Access {
        if self.0.is_empty() {
            return Access::BOTH;
        }
        let Some(mode) = mode else {
            return Access::BOTH;
        };
        self.0
            .iter()
            .find(|(m, _)| m == mode)
            .map_or(Access { input: false, output: false }, |(_, a)| *a)
    }

    /// Whether any mode is declared.
    pub fn is_declared(&self) -> bool {
        !self.0.is_empty()
    }

    /// Declared modes in declaration order.
    pub fn entries(&self) -> &[(String, Access)] {
        &self.0
    }
}

// ─── Field ───────────────────────────────────────────────────────────

/// One named, validated slot of a record schema.
#[derive(Clone)]
pub struct Field {
    name: String,
    alias: Option<String>,
    fallback_aliases: Vec<String>,
    case_sensitive: Option<bool>,
    rule: Combinator,
    default: Option<DefaultPolicy>,
    modes: ModeVisibility,
    frozen: bool,
    secret: Option<bool>,
    depends_on: Vec<String>,
    error_policy: ErrorPolicy,
    computed: Option<ComputeFn>,
}

impl Field {
    /// A field validated by `rule`.
    pub fn new(name: impl Into<String>, rule: impl Into<Combinator>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            fallback_aliases: Vec::new(),
            case_sensitive: None,
            rule: rule.into(),
            default: None,
            modes: ModeVisibility::default(),
            frozen: false,
            secret: None,
            depends_on: Vec::new(),
            error_policy: ErrorPolicy::default(),
            computed: None,
        }
    }

    /// An output-only field computed from `depends_on`.
    pub fn computed<S: Into<String>>(
        name: impl Into<String>,
        depends_on: impl IntoIterator<Item = S>,
        compute: impl Fn(&ValueMap) -> Result<Value, RatifyError> + Send + Sync + 'static,
    ) -> Self {
        let mut field = Self::new(name, TypeRule::any());
        field.depends_on = depends_on.into_iter().map(Into::into).collect();
        field.computed = Some(Arc::new(compute));
        field
    }

    /// Primary input key (defaults to the field name).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Additional input keys tried, in order, when the primary is absent.
    pub fn fallback_aliases<S: Into<String>>(mut self, aliases: impl IntoIterator<Item = S>) -> Self {
        self.fallback_aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Override the schema's alias case-sensitivity for this field.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = Some(case_sensitive);
        self
    }

    /// Fixed default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultPolicy::Immediate(value.into()));
        self
    }

    /// Default produced by a factory, once per record.
    pub fn default_factory(
        mut self,
        factory: impl Fn() -> Result<Value, RatifyError> + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(DefaultPolicy::Factory(Arc::new(factory)));
        self
    }

    /// Default computed from other fields.
    pub fn default_deferred<S: Into<String>>(
        mut self,
        depends_on: impl IntoIterator<Item = S>,
        compute: impl Fn(&ValueMap) -> Result<Value, RatifyError> + Send + Sync + 'static,
        eager_skip: bool,
    ) -> Self {
        self.depends_on = depends_on.into_iter().map(Into::into).collect();
        self.default = Some(DefaultPolicy::Deferred {
            compute: Arc::new(compute),
            eager_skip,
        });
        self
    }

    /// Declare access under `mode`.
    pub fn mode(mut self, mode: impl Into<String>, access: Access) -> Self {
        self.modes = self.modes.declare(mode, access);
        self
    }

    /// Reject assignment after construction.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Force secrecy on or off, overriding the name heuristic.
    pub fn secret(mut self, secret: bool) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Declare fields this one is recomputed from.
    pub fn depends_on<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.depends_on = names.into_iter().map(Into::into).collect();
        self
    }

    /// Per-field error handling.
    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The primary input key.
    pub fn primary_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Every input key tried, primary first.
    pub fn input_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_alias()).chain(self.fallback_aliases.iter().map(String::as_str))
    }

    /// Effective alias case-sensitivity under `options`.
    pub fn is_case_sensitive(&self, options: &ParseOptions) -> bool {
        self.case_sensitive.unwrap_or(options.case_sensitive)
    }

    /// The validation combinator.
    pub fn rule(&self) -> &Combinator {
        &self.rule
    }

    /// The default policy, if any.
    pub fn default_policy(&self) -> Option<&DefaultPolicy> {
        self.default.as_ref()
    }

    /// Mode visibility.
    pub fn modes(&self) -> &ModeVisibility {
        &self.modes
    }

    /// Whether assignment is rejected after construction.
    pub fn is_frozen(&self) -> bool {
        self.frozen || self.computed.is_some()
    }

    /// Whether the field's values are redacted, honoring the name heuristic.
    pub fn is_secret(&self, options: &ParseOptions) -> bool {
        self.secret.unwrap_or_else(|| options.looks_secret(&self.name))
    }

    /// Declared dependencies.
    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    /// The error policy.
    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// The compute function of a computed field.
    pub fn compute_fn(&self) -> Option<&ComputeFn> {
        self.computed.as_ref()
    }

    /// Whether the field is computed rather than read from input.
    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// Whether the field is required under `mode`: read from input with no
    /// default.
    pub fn is_required(&self, mode: Option<&str>) -> bool {
        !self.is_computed() && self.default.is_none() && self.access(mode).input
    }

    /// Access under `mode`. Computed fields never read input.
    pub fn access(&self, mode: Option<&str>) -> Access {
        let access = self.modes.access(mode);
        if self.is_computed() {
            Access {
                input: false,
                ..access
            }
        } else {
            access
        }
    }

    /// Structural metadata for schema exporters.
    pub fn describe(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert("rule".into(), self.rule.describe());
        if let Some(alias) = &self.alias {
            out.insert("alias".into(), alias.as_str().into());
        }
        if !self.fallback_aliases.is_empty() {
            out.insert("fallback_aliases".into(), self.fallback_aliases.clone().into());
        }
        out.insert("required".into(), self.is_required(None).into());
        match &self.default {
            Some(DefaultPolicy::Immediate(v)) => {
                out.insert("default".into(), v.to_json());
            }
            Some(DefaultPolicy::Factory(_)) => {
                out.insert("default".into(), "<factory>".into());
            }
            Some(DefaultPolicy::Deferred { .. }) => {
                out.insert("default".into(), "<deferred>".into());
            }
            None => {}
        }
        if self.frozen {
            out.insert("frozen".into(), true.into());
        }
        if self.is_computed() {
            out.insert("computed".into(), true.into());
        }
        if !self.depends_on.is_empty() {
            out.insert("depends_on".into(), self.depends_on.clone().into());
        }
        if self.error_policy != ErrorPolicy::Throw {
            out.insert(
                "on_error".into(),
                serde_json::to_value(self.error_policy).unwrap_or_default(),
            );
        }
        serde_json::Value::Object(out)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("rule", &self.rule.label())
            .field("default", &self.default)
            .field("frozen", &self.frozen)
            .field("computed", &self.is_computed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratify_core::TypeDescriptor;

    #[test]
    fn test_undeclared_modes_allow_everything() {
        let f = Field::new("id", TypeDescriptor::int());
        assert_eq!(f.access(Some("api")), Access::BOTH);
        assert_eq!(f.access(None), Access::BOTH);
    }

    #[test]
    fn test_declared_modes_exclude_others() {
        let f = Field::new("password", TypeDescriptor::str())
            .mode("create", Access::INPUT)
            .mode("read", Access::OUTPUT);
        assert_eq!(f.access(Some("create")), Access::INPUT);
        assert!(!f.access(Some("update")).input);
        assert!(!f.access(Some("update")).output);
        assert!(f.is_required(Some("create")));
        assert!(!f.is_required(Some("read")));
    }

    #[test]
    fn test_computed_fields_are_output_only_and_frozen() {
        let f = Field::computed("total", ["a", "b"], |_| Ok(Value::Int(0)));
        assert!(!f.access(None).input);
        assert!(f.access(None).output);
        assert!(f.is_frozen());
        assert!(!f.is_required(None));
        assert_eq!(f.dependencies(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_input_keys_order() {
        let f = Field::new("user_name", TypeDescriptor::str())
            .alias("userName")
            .fallback_aliases(["username", "login"]);
        let keys: Vec<&str> = f.input_keys().collect();
        assert_eq!(keys, ["userName", "username", "login"]);
    }

    #[test]
    fn test_secret_heuristic_and_override() {
        let options = ParseOptions::default();
        assert!(Field::new("api_token", TypeDescriptor::str()).is_secret(&options));
        assert!(!Field::new("api_token", TypeDescriptor::str()).secret(false).is_secret(&options));
        assert!(!Field::new("name", TypeDescriptor::str()).is_secret(&options));
    }

    #[test]
    fn test_case_sensitivity_falls_back_to_options() {
        let options = ParseOptions::default().with_case_sensitive(false);
        assert!(!Field::new("a", TypeDescriptor::str()).is_case_sensitive(&options));
        assert!(Field::new("a", TypeDescriptor::str())
            .case_sensitive(true)
            .is_case_sensitive(&options));
    }
}
