//! # Parse Options
//!
//! Record-level settings in effect for one parse call. Options are plain
//! data: they derive `Serialize`/`Deserialize`, every field has a default,
//! and they can be loaded from JSON or YAML text.
//!
//! ```yaml
//! mode: create
//! error_mode: fail_fast
//! max_depth: 32
//! case_sensitive: false
//! rounding: half_up
//! extra: forbid
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default recursion limit for nested records and containers.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Whether a parse stops at the first failure or collects them all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Stop at the first failing field or element.
    FailFast,
    /// Evaluate everything and report every failure in one aggregate.
    #[default]
    CollectAll,
}

/// Rounding applied by lax numeric constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round half to even (banker's rounding).
    #[default]
    HalfEven,
    /// Round half away from zero.
    HalfUp,
}

/// What to do with input keys no field claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPolicy {
    /// Silently ignore them.
    #[default]
    Ignore,
    /// Report each one as an error.
    Forbid,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_case_sensitive() -> bool {
    true
}

fn default_secret_patterns() -> Vec<String> {
    ["password", "secret", "token", "api_key"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Options in effect for a parse call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseOptions {
    /// Active mode label; `None` means every field participates.
    #[serde(default)]
    pub mode: Option<String>,
    /// Fail-fast or collect-all.
    #[serde(default)]
    pub error_mode: ErrorMode,
    /// Maximum nesting depth before failing with `DepthExceeded`.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Default alias case-sensitivity for fields that do not set their own.
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
    /// Rounding used by lax `decimal_places` and `max_digits`.
    #[serde(default)]
    pub rounding: RoundingMode,
    /// Handling of unclaimed input keys.
    #[serde(default)]
    pub extra: ExtraPolicy,
    /// Field-name fragments that mark a field secret automatically.
    #[serde(default = "default_secret_patterns")]
    pub secret_name_patterns: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: None,
            error_mode: ErrorMode::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            case_sensitive: true,
            rounding: RoundingMode::default(),
            extra: ExtraPolicy::default(),
            secret_name_patterns: default_secret_patterns(),
        }
    }
}

impl ParseOptions {
    /// Load options from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the text is not valid JSON, names an
    /// unknown option, or sets an invalid value.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(text)
            .map_err(|e| ConfigError::new(format!("invalid options JSON: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the text is not valid YAML, names an
    /// unknown option, or sets an invalid value.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_yaml::from_str(text)
            .map_err(|e| ConfigError::new(format!("invalid options YAML: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Check option values for consistency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `max_depth` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::new("max_depth must be at least 1"));
        }
        Ok(())
    }

    /// Set the active mode.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Set the error-collection mode.
    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Set the recursion limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the default alias case-sensitivity.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Set the rounding mode.
    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Set the extra-key policy.
    pub fn with_extra(mut self, extra: ExtraPolicy) -> Self {
        self.extra = extra;
        self
    }

    /// Whether evaluation should stop at the first failure.
    pub fn is_fail_fast(&self) -> bool {
        self.error_mode == ErrorMode::FailFast
    }

    /// Whether `name` matches one of the secret-name fragments.
    pub fn looks_secret(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.secret_name_patterns
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
    }
}
