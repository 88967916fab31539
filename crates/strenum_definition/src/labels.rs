//! Label lookup with raw-value fallback.
//!
//! Labels live under dotted keys (`enums.product.status.active`). A
//! [`Translator`] answers `Some(label)` when one is registered; the lookup
//! helpers fall back to the raw value otherwise, so label lookup is total.

use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label-lookup collaborator.
pub trait Translator {
    /// Label registered for `key` under `scope`, if any.
    fn translate(&self, key: &str, scope: &str) -> Option<String>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn translate(&self, key: &str, scope: &str) -> Option<String> {
        (**self).translate(key, scope)
    }
}

/// Resolve a label, falling back to the raw value.
pub fn lookup(translator: &dyn Translator, raw: &str, scope: &str) -> String {
    translator
        .translate(raw, scope)
        .unwrap_or_else(|| raw.to_string())
}

/// Translator with nothing registered: every label is its raw value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslations;

impl Translator for NoTranslations {
    fn translate(&self, _key: &str, _scope: &str) -> Option<String> {
        None
    }
}

/// Errors loading locale files.
#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("Failed to read locale file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid locale YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Locale \"{0}\" not found at the top level of the locale file")]
    MissingLocale(String),
}

/// In-memory label store keyed by full dotted path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleCatalog {
    entries: HashMap<String, String>,
}

impl LocaleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one label under a full dotted key.
    pub fn insert(&mut self, full_key: impl Into<String>, label: impl Into<String>) -> &mut Self {
        self.entries.insert(full_key.into(), label.into());
        self
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, full_key: impl Into<String>, label: impl Into<String>) -> Self {
        self.insert(full_key, label);
        self
    }

    /// Parse a Rails-style nested locale document and keep one locale.
    ///
    /// ```yaml
    /// en:
    ///   enums:
    ///     product:
    ///       status:
    ///         active: Active
    /// ```
    pub fn from_yaml_str(yaml: &str, locale: &str) -> Result<Self, LocaleError> {
        let root: Value = serde_yaml::from_str(yaml)?;
        let tree = root
            .get(locale)
            .ok_or_else(|| LocaleError::MissingLocale(locale.to_string()))?;

        let mut catalog = Self::new();
        flatten_into(&mut catalog.entries, String::new(), tree);
        Ok(catalog)
    }

    /// Load a locale file from disk.
    pub fn load(path: impl AsRef<Path>, locale: &str) -> Result<Self, LocaleError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LocaleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, locale)
    }

    /// Merge another catalog; its entries win on overlap.
    pub fn merge(&mut self, other: LocaleCatalog) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translator for LocaleCatalog {
    fn translate(&self, key: &str, scope: &str) -> Option<String> {
        self.entries.get(&format!("{}.{}", scope, key)).cloned()
    }
}

fn flatten_into(entries: &mut HashMap<String, String>, prefix: String, node: &Value) {
    match node {
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(key) = scalar_to_string(key) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(entries, path, child);
            }
        }
        Value::Tagged(tagged) => flatten_into(entries, prefix, &tagged.value),
        other => {
            if let Some(label) = scalar_to_string(other) {
                if !prefix.is_empty() {
                    entries.insert(prefix, label);
                }
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCALE: &str = r#"
en:
  enums:
    product:
      status:
        active: Active
        archived: In the archive
ru:
  enums:
    product:
      status:
        active: Активный
"#;

    #[test]
    fn test_lookup_falls_back_to_raw_value() {
        assert_eq!(lookup(&NoTranslations, "active", "enums.product.status"), "active");
    }

    #[test]
    fn test_yaml_catalog_picks_locale() {
        let en = LocaleCatalog::from_yaml_str(LOCALE, "en").unwrap();
        assert_eq!(en.len(), 2);
        assert_eq!(
            en.translate("archived", "enums.product.status").as_deref(),
            Some("In the archive")
        );

        let ru = LocaleCatalog::from_yaml_str(LOCALE, "ru").unwrap();
        assert_eq!(lookup(&ru, "active", "enums.product.status"), "Активный");
        assert_eq!(lookup(&ru, "archived", "enums.product.status"), "archived");
    }

    #[test]
    fn test_missing_locale_is_an_error() {
        let err = LocaleCatalog::from_yaml_str(LOCALE, "de").unwrap_err();
        assert!(matches!(err, LocaleError::MissingLocale(ref l) if l == "de"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = LocaleCatalog::new().with("enums.a.b.x", "X");
        base.merge(LocaleCatalog::new().with("enums.a.b.x", "Ex").with("enums.a.b.y", "Y"));
        assert_eq!(base.translate("x", "enums.a.b").as_deref(), Some("Ex"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en.yml");
        std::fs::write(&path, LOCALE).unwrap();

        let catalog = LocaleCatalog::load(&path, "en").unwrap();
        assert_eq!(lookup(&catalog, "active", "enums.product.status"), "Active");

        let missing = LocaleCatalog::load(dir.path().join("nope.yml"), "en");
        assert!(matches!(missing, Err(LocaleError::Io { .. })));
    }
}
