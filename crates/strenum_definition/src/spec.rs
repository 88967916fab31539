//! The declaration unit: one enum governing one attribute.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Whether (and how) a query scope is generated per value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// No scopes
    #[default]
    None,
    /// `only_active`
    Singular,
    /// `only_actives`
    Pluralized,
}

impl ScopePolicy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A string enum declaration.
///
/// Value order is kept: it is the order of the collection constant and of
/// the label collection. Predicates do not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumSpec {
    /// Attribute (column) the enum governs
    pub attribute: String,

    /// Allowed values, in declared order
    pub values: Vec<String>,

    /// Label namespace below `enums.`; defaults to `<model>.<attribute>`
    #[serde(default)]
    pub i18n_scope: Option<String>,

    /// Prefix member names with the attribute (`color_red?` instead of `red?`)
    #[serde(default)]
    pub prefix: bool,

    /// Per-value query scope generation
    #[serde(default)]
    pub scopes: ScopePolicy,
}

impl EnumSpec {
    /// Create a spec with default options.
    pub fn new<I, S>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
            i18n_scope: None,
            prefix: false,
            scopes: ScopePolicy::None,
        }
    }

    /// Set an explicit label scope (`product.color` resolves under `enums.product.color`).
    pub fn with_i18n_scope(mut self, scope: impl Into<String>) -> Self {
        self.i18n_scope = Some(scope.into());
        self
    }

    /// Prefix member names with the attribute name.
    pub fn with_prefix(mut self, prefix: bool) -> Self {
        self.prefix = prefix;
        self
    }

    /// Generate per-value scopes.
    pub fn with_scopes(mut self, scopes: ScopePolicy) -> Self {
        self.scopes = scopes;
        self
    }

    /// Member name for a value: `value`, or `attribute_value` when prefixed.
    pub fn member_name(&self, value: &str) -> String {
        if self.prefix {
            format!("{}_{}", self.attribute, value)
        } else {
            value.to_string()
        }
    }

    /// Check structural validity; returns a reason on failure.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !is_identifier(&self.attribute) {
            return Err(format!(
                "attribute \"{}\" is not a valid identifier",
                self.attribute
            ));
        }

        let mut seen = HashSet::with_capacity(self.values.len());
        for value in &self.values {
            if value.is_empty() {
                return Err("values must not be empty strings".to_string());
            }
            if value.chars().any(char::is_whitespace) {
                return Err(format!("value \"{}\" contains whitespace", value));
            }
            if !seen.insert(value.as_str()) {
                return Err(format!("value \"{}\" is declared more than once", value));
            }
        }

        if let Some(scope) = &self.i18n_scope {
            if scope.is_empty() || scope.starts_with('.') || scope.ends_with('.') {
                return Err(format!("i18n scope \"{}\" is malformed", scope));
            }
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
