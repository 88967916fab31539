//! Persistence collaborator seams.
//!
//! [`ModelSchema`] describes the owner type (its name, the names its
//! persistence layer already defines, its inflector). [`Record`] is one
//! stored instance the generated predicates and updaters operate on.

use crate::inflect;
use std::collections::BTreeSet;

/// Type-level view of the owner model.
pub trait ModelSchema {
    /// Model name as written by the host (`Product`, `Admin::LineItem`).
    fn model_name(&self) -> &str;

    /// Root of the model hierarchy; drives the default label scope.
    fn base_model_name(&self) -> &str {
        self.model_name()
    }

    /// True if the persistence layer already defines this instance method.
    fn is_reserved_instance_method(&self, name: &str) -> bool;

    /// True if the persistence layer already defines this class method.
    fn is_reserved_class_method(&self, name: &str) -> bool;

    /// True if the model already defines this constant.
    fn defines_constant(&self, _name: &str) -> bool {
        false
    }

    /// Pluralize a word with the host's inflection rules.
    fn pluralize(&self, word: &str) -> String {
        inflect::pluralize(word)
    }

    /// Name reported when a collision comes from the persistence layer.
    fn layer_name(&self) -> &str {
        "Active Record"
    }
}

/// Instance methods every Active Record model defines.
const ACTIVE_RECORD_INSTANCE_METHODS: &[&str] = &[
    "id",
    "id=",
    "save",
    "save!",
    "update",
    "update!",
    "update_attribute",
    "destroy",
    "destroy!",
    "delete",
    "reload",
    "valid?",
    "invalid?",
    "errors",
    "new_record?",
    "persisted?",
    "destroyed?",
    "changed?",
    "changes",
    "attributes",
    "attributes=",
    "touch",
    "freeze",
    "frozen?",
    "hash",
    "class",
    "type",
    "send",
    "object_id",
    "transaction",
];

/// Class methods every Active Record model defines.
const ACTIVE_RECORD_CLASS_METHODS: &[&str] = &[
    "all",
    "none",
    "where",
    "not",
    "find",
    "find_by",
    "first",
    "last",
    "take",
    "count",
    "order",
    "limit",
    "select",
    "pluck",
    "create",
    "create!",
    "new",
    "update_all",
    "delete_all",
    "destroy_all",
    "scope",
    "unscoped",
    "default",
    "name",
    "table_name",
    "primary_key",
    "columns",
    "logger",
    "transaction",
    "exists?",
];

/// Concrete [`ModelSchema`] built from reserved-name sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    name: String,
    base_name: Option<String>,
    instance_methods: BTreeSet<String>,
    class_methods: BTreeSet<String>,
    constants: BTreeSet<String>,
    layer_name: String,
}

impl ModelDescriptor {
    /// A model with no reserved names (plain types that only want constants and predicates).
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_name: None,
            instance_methods: BTreeSet::new(),
            class_methods: BTreeSet::new(),
            constants: BTreeSet::new(),
            layer_name: "Active Record".to_string(),
        }
    }

    /// A model backed by Active Record, reserving its built-in methods.
    pub fn active_record(name: impl Into<String>) -> Self {
        Self::plain(name)
            .with_instance_methods(ACTIVE_RECORD_INSTANCE_METHODS.iter().copied())
            .with_class_methods(ACTIVE_RECORD_CLASS_METHODS.iter().copied())
    }

    /// Set the hierarchy root (single-table inheritance).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_name = Some(base.into());
        self
    }

    /// Reserve additional instance method names.
    pub fn with_instance_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instance_methods.extend(names.into_iter().map(Into::into));
        self
    }

    /// Reserve additional class method names.
    pub fn with_class_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_methods.extend(names.into_iter().map(Into::into));
        self
    }

    /// Reserve constant names.
    pub fn with_constants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constants.extend(names.into_iter().map(Into::into));
        self
    }

    /// Rename the persistence layer in conflict messages.
    pub fn with_layer_name(mut self, layer: impl Into<String>) -> Self {
        self.layer_name = layer.into();
        self
    }
}

impl ModelSchema for ModelDescriptor {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn base_model_name(&self) -> &str {
        self.base_name.as_deref().unwrap_or(&self.name)
    }

    fn is_reserved_instance_method(&self, name: &str) -> bool {
        self.instance_methods.contains(name)
    }

    fn is_reserved_class_method(&self, name: &str) -> bool {
        self.class_methods.contains(name)
    }

    fn defines_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    fn layer_name(&self) -> &str {
        &self.layer_name
    }
}

/// One stored instance of the owner model.
pub trait Record {
    /// Error raised by the persistence layer on update.
    type Error: std::error::Error;

    /// Current value of an attribute (`None` when unset).
    fn read_attribute(&self, attribute: &str) -> Option<String>;

    /// Assign and persist one attribute; failures propagate unchanged.
    fn update_attribute(&mut self, attribute: &str, value: &str) -> Result<(), Self::Error>;
}
