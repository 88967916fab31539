//! Bound enum members.
//!
//! Each member captures `(attribute, value)` and is resolved by name from a
//! [`CapabilitySet`]. Members are plain data: compiling the same spec twice
//! yields equal sets.

use crate::labels::{lookup, Translator};
use crate::model::Record;
use crate::spec::EnumSpec;
use std::collections::BTreeMap;

/// `active?`: true when the attribute currently holds the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    attribute: String,
    value: String,
}

impl Predicate {
    pub(crate) fn new(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn call<R: Record + ?Sized>(&self, record: &R) -> bool {
        record.read_attribute(&self.attribute).as_deref() == Some(self.value.as_str())
    }
}

/// `active!`: persists the value through the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updater {
    attribute: String,
    value: String,
}

impl Updater {
    pub(crate) fn new(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Not retried; the record's error is returned as-is.
    pub fn call<R: Record + ?Sized>(&self, record: &mut R) -> Result<(), R::Error> {
        record.update_attribute(&self.attribute, &self.value)
    }
}

/// `only_active`: a named, lazily evaluated `attribute == value` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    attribute: String,
    value: String,
}

impl QueryFilter {
    pub(crate) fn new(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        record.read_attribute(&self.attribute).as_deref() == Some(self.value.as_str())
    }

    /// Filter records; nothing is evaluated until the iterator is driven.
    pub fn apply<'a, R, I>(&'a self, records: I) -> impl Iterator<Item = &'a R> + 'a
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
        I::IntoIter: 'a,
    {
        records.into_iter().filter(move |record| self.matches(*record))
    }
}

/// Ordered value -> label mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    entries: Vec<(String, String)>,
}

impl LabelMap {
    pub fn get(&self, value: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, label)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(v, l)| (v.as_str(), l.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(v, _)| v.as_str())
    }

    /// `(label, value)` pairs, the shape select inputs want.
    pub fn inverted(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(v, l)| (l.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The four label lookups of one enum, sharing a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    attribute: String,
    scope: String,
    values: Vec<String>,
}

impl LabelSet {
    pub(crate) fn new(attribute: &str, scope: String, values: &[String]) -> Self {
        Self {
            attribute: attribute.to_string(),
            scope,
            values: values.to_vec(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Full lookup namespace (`enums.product.status`).
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// `product.status_i18n`: label of the current value, `None` when unset.
    pub fn label<R: Record + ?Sized>(&self, record: &R, translator: &dyn Translator) -> Option<String> {
        record
            .read_attribute(&self.attribute)
            .map(|value| lookup(translator, &value, &self.scope))
    }

    /// `product.status_i18n_for("archived")`: label of any candidate value.
    pub fn label_of(&self, value: &str, translator: &dyn Translator) -> String {
        lookup(translator, value, &self.scope)
    }

    /// `Product.status_i18n_for(value)`: type-level lookup, `None` in, `None` out.
    pub fn label_for(&self, value: Option<&str>, translator: &dyn Translator) -> Option<String> {
        value.map(|v| lookup(translator, v, &self.scope))
    }

    /// `Product.statuses_i18n`: every declared value with its label.
    pub fn labels(&self, translator: &dyn Translator) -> LabelMap {
        LabelMap {
            entries: self
                .values
                .iter()
                .map(|v| (v.clone(), lookup(translator, v, &self.scope)))
                .collect(),
        }
    }
}

/// Constant bound on the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// `Product::ACTIVE`
    Value(String),
    /// `Product::STATUSES`
    Values(Vec<String>),
}

/// Member callable on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceMember {
    Predicate(Predicate),
    Updater(Updater),
    /// `status_i18n`
    Label(LabelSet),
    /// `status_i18n_for`
    LabelOf(LabelSet),
}

/// Member callable on the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassMember {
    Scope(QueryFilter),
    /// `status_i18n_for`
    LabelFor(LabelSet),
    /// `statuses_i18n`
    Labels(LabelSet),
}

/// Everything one declaration binds on its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    pub(crate) spec: EnumSpec,
    pub(crate) labels: LabelSet,
    /// Names the host provides but the enum relies on (`status`, `status=`, `statuses`)
    pub(crate) claimed_instance: Vec<String>,
    pub(crate) claimed_class: Vec<String>,
    pub(crate) instance: BTreeMap<String, InstanceMember>,
    pub(crate) class: BTreeMap<String, ClassMember>,
    pub(crate) constants: BTreeMap<String, Constant>,
    pub(crate) advisories: Vec<String>,
}

impl CapabilitySet {
    pub fn spec(&self) -> &EnumSpec {
        &self.spec
    }

    pub fn attribute(&self) -> &str {
        &self.spec.attribute
    }

    /// All values in declared order (the collection constant).
    pub fn values(&self) -> &[String] {
        &self.spec.values
    }

    pub fn label_set(&self) -> &LabelSet {
        &self.labels
    }

    pub fn instance_member(&self, name: &str) -> Option<&InstanceMember> {
        self.instance.get(name)
    }

    pub fn class_member(&self, name: &str) -> Option<&ClassMember> {
        self.class.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    pub fn instance_members(&self) -> impl Iterator<Item = (&str, &InstanceMember)> {
        self.instance.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn class_members(&self) -> impl Iterator<Item = (&str, &ClassMember)> {
        self.class.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, &Constant)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        match self.instance.get(name) {
            Some(InstanceMember::Predicate(p)) => Some(p),
            _ => None,
        }
    }

    pub fn updater(&self, name: &str) -> Option<&Updater> {
        match self.instance.get(name) {
            Some(InstanceMember::Updater(u)) => Some(u),
            _ => None,
        }
    }

    pub fn scope(&self, name: &str) -> Option<&QueryFilter> {
        match self.class.get(name) {
            Some(ClassMember::Scope(s)) => Some(s),
            _ => None,
        }
    }

    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.instance.iter().filter_map(|(k, m)| match m {
            InstanceMember::Predicate(p) => Some((k.as_str(), p)),
            _ => None,
        })
    }

    pub fn updaters(&self) -> impl Iterator<Item = (&str, &Updater)> {
        self.instance.iter().filter_map(|(k, m)| match m {
            InstanceMember::Updater(u) => Some((k.as_str(), u)),
            _ => None,
        })
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&str, &QueryFilter)> {
        self.class.iter().filter_map(|(k, m)| match m {
            ClassMember::Scope(s) => Some((k.as_str(), s)),
            _ => None,
        })
    }

    /// Non-blocking warnings raised while compiling.
    pub fn advisories(&self) -> &[String] {
        &self.advisories
    }

    /// Every name this set occupies, with its namespace.
    pub(crate) fn occupied_names(&self) -> impl Iterator<Item = (crate::MemberKind, &str)> {
        use crate::MemberKind;
        self.claimed_instance
            .iter()
            .map(|n| (MemberKind::Instance, n.as_str()))
            .chain(self.instance.keys().map(|n| (MemberKind::Instance, n.as_str())))
            .chain(self.claimed_class.iter().map(|n| (MemberKind::Class, n.as_str())))
            .chain(self.class.keys().map(|n| (MemberKind::Class, n.as_str())))
            .chain(self.constants.keys().map(|n| (MemberKind::Constant, n.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{LocaleCatalog, NoTranslations};
    use std::collections::HashMap;
    use std::fmt;

    #[derive(Debug)]
    struct ReadOnly;

    impl fmt::Display for ReadOnly {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("record is read-only")
        }
    }

    impl std::error::Error for ReadOnly {}

    #[derive(Default)]
    struct Row {
        attrs: HashMap<String, String>,
        frozen: bool,
    }

    impl Record for Row {
        type Error = ReadOnly;

        fn read_attribute(&self, attribute: &str) -> Option<String> {
            self.attrs.get(attribute).cloned()
        }

        fn update_attribute(&mut self, attribute: &str, value: &str) -> Result<(), ReadOnly> {
            if self.frozen {
                return Err(ReadOnly);
            }
            self.attrs.insert(attribute.to_string(), value.to_string());
            Ok(())
        }
    }

    fn row(status: Option<&str>) -> Row {
        let mut row = Row::default();
        if let Some(s) = status {
            row.attrs.insert("status".to_string(), s.to_string());
        }
        row
    }

    #[test]
    fn test_predicate_and_updater() {
        let predicate = Predicate::new("status", "active");
        let updater = Updater::new("status", "active");

        let mut record = row(Some("archived"));
        assert!(!predicate.call(&record));

        updater.call(&mut record).unwrap();
        assert!(predicate.call(&record));
        assert!(!predicate.call(&row(None)));
    }

    #[test]
    fn test_updater_propagates_persistence_error() {
        let mut record = row(Some("archived"));
        record.frozen = true;

        let err = Updater::new("status", "active").call(&mut record).unwrap_err();
        assert_eq!(err.to_string(), "record is read-only");
        assert_eq!(record.read_attribute("status").as_deref(), Some("archived"));
    }

    #[test]
    fn test_query_filter_is_lazy_and_ordered() {
        let records = vec![row(Some("active")), row(Some("archived")), row(Some("active"))];
        let filter = QueryFilter::new("status", "active");

        let mut iter = filter.apply(&records);
        assert!(iter.next().is_some());
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_label_set_lookups() {
        let values = vec!["active".to_string(), "archived".to_string()];
        let labels = LabelSet::new("status", "enums.product.status".to_string(), &values);
        let catalog = LocaleCatalog::new().with("enums.product.status.active", "Active");

        assert_eq!(labels.label(&row(Some("active")), &catalog).as_deref(), Some("Active"));
        assert_eq!(labels.label(&row(None), &catalog), None);
        assert_eq!(labels.label_of("archived", &catalog), "archived");
        assert_eq!(labels.label_for(None, &catalog), None);
        assert_eq!(labels.label_for(Some("active"), &catalog).as_deref(), Some("Active"));
        assert_eq!(labels.label_of("unknown", &NoTranslations), "unknown");

        let map = labels.labels(&catalog);
        assert_eq!(map.values().collect::<Vec<_>>(), vec!["active", "archived"]);
        assert_eq!(map.get("archived"), Some("archived"));
        assert_eq!(
            map.inverted(),
            vec![
                ("Active".to_string(), "active".to_string()),
                ("archived".to_string(), "archived".to_string())
            ]
        );
    }
}
