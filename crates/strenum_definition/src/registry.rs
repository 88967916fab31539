//! Per-owner enum registry.
//!
//! `declare` runs in three phases: compile the spec into a detached
//! [`CapabilitySet`], check every generated name against the model and the
//! other declared enums, and only then bind. A failure in the first two
//! phases returns before `self` is touched.

use crate::capability::{
    CapabilitySet, ClassMember, Constant, InstanceMember, LabelSet, Predicate, QueryFilter,
    Updater,
};
use crate::error::{ConflictOrigin, DefinitionError, MemberKind, Result};
use crate::inflect::{constant_name, underscore};
use crate::model::ModelSchema;
use crate::spec::{EnumSpec, ScopePolicy};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Separator between member constants in a combination name (`RED__GREEN`).
pub const COMBINATION_SEPARATOR: &str = "__";

/// Prefix the host framework reserves for generated negative scopes.
pub const NEGATIVE_PREFIX: &str = "not_";

/// All enums declared on one owner model.
#[derive(Debug)]
pub struct EnumRegistry<M: ModelSchema> {
    model: M,
    enums: Vec<CapabilitySet>,
    combinations: RwLock<HashMap<String, Arc<[String]>>>,
}

impl<M: ModelSchema> EnumRegistry<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            enums: Vec::new(),
            combinations: RwLock::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Compile and bind one declaration.
    ///
    /// Re-declaring an attribute replaces its previous set, so reloading the
    /// same declaration is idempotent.
    pub fn declare(&mut self, spec: EnumSpec) -> Result<&CapabilitySet> {
        let set = compile(&self.model, spec)?;
        self.check_conflicts(&set)?;

        for advisory in &set.advisories {
            warn!(model = self.model.model_name(), "{}", advisory);
        }

        debug!(
            model = self.model.model_name(),
            attribute = set.attribute(),
            values = set.values().len(),
            "Declared enum"
        );

        let attribute = set.attribute().to_string();
        let idx = match self.enums.iter().position(|e| e.attribute() == attribute) {
            Some(idx) => {
                self.enums[idx] = set;
                idx
            }
            None => {
                self.enums.push(set);
                self.enums.len() - 1
            }
        };

        self.combinations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        Ok(&self.enums[idx])
    }

    fn check_conflicts(&self, set: &CapabilitySet) -> Result<()> {
        let mut taken: HashMap<(MemberKind, &str), &str> = HashMap::new();
        for other in self.enums.iter().filter(|e| e.attribute() != set.attribute()) {
            for (kind, name) in other.occupied_names() {
                taken.entry((kind, name)).or_insert(other.attribute());
            }
        }

        for (kind, name) in set.occupied_names() {
            let reserved = match kind {
                MemberKind::Instance => self.model.is_reserved_instance_method(name),
                MemberKind::Class => self.model.is_reserved_class_method(name),
                MemberKind::Constant => self.model.defines_constant(name),
            };
            if reserved {
                return Err(self.conflict(
                    set,
                    name,
                    kind,
                    ConflictOrigin::Persistence(self.model.layer_name().to_string()),
                ));
            }

            if let Some(owner) = taken.get(&(kind, name)) {
                return Err(self.conflict(
                    set,
                    name,
                    kind,
                    ConflictOrigin::OtherEnum {
                        attribute: owner.to_string(),
                    },
                ));
            }
        }

        Ok(())
    }

    fn conflict(
        &self,
        set: &CapabilitySet,
        member: &str,
        kind: MemberKind,
        origin: ConflictOrigin,
    ) -> DefinitionError {
        DefinitionError::Conflict {
            enum_name: set.attribute().to_string(),
            model: self.model.model_name().to_string(),
            member: member.to_string(),
            kind,
            origin,
        }
    }

    /// Capability set of one attribute.
    pub fn get(&self, attribute: &str) -> Option<&CapabilitySet> {
        self.enums.iter().find(|e| e.attribute() == attribute)
    }

    /// Declared enums in declaration order.
    pub fn enums(&self) -> &[CapabilitySet] {
        &self.enums
    }

    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        self.enums.iter().find_map(|e| e.predicate(name))
    }

    pub fn updater(&self, name: &str) -> Option<&Updater> {
        self.enums.iter().find_map(|e| e.updater(name))
    }

    pub fn scope(&self, name: &str) -> Option<&QueryFilter> {
        self.enums.iter().find_map(|e| e.scope(name))
    }

    pub fn instance_member(&self, name: &str) -> Option<&InstanceMember> {
        self.enums.iter().find_map(|e| e.instance_member(name))
    }

    pub fn class_member(&self, name: &str) -> Option<&ClassMember> {
        self.enums.iter().find_map(|e| e.class_member(name))
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.enums.iter().find_map(|e| e.constant(name))
    }

    pub fn label_set(&self, attribute: &str) -> Option<&LabelSet> {
        self.get(attribute).map(CapabilitySet::label_set)
    }

    /// Resolve `RED__GREEN` to `["red", "green"]`.
    ///
    /// Every component must name a single-value constant. The first one that
    /// does not is reported as [`DefinitionError::UnknownMember`]. Results are
    /// cached per name until the next declaration.
    pub fn resolve_combination(&self, name: &str) -> Result<Arc<[String]>> {
        if let Some(hit) = self
            .combinations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(hit));
        }

        let mut values = Vec::new();
        for part in name.split(COMBINATION_SEPARATOR) {
            match self.constant(part) {
                Some(Constant::Value(value)) if !part.is_empty() => values.push(value.clone()),
                _ => {
                    let missing = if part.is_empty() { name } else { part };
                    return Err(DefinitionError::unknown_member(
                        self.model.model_name(),
                        missing,
                    ));
                }
            }
        }

        let resolved: Arc<[String]> = values.into();
        let mut cache = self
            .combinations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            cache.entry(name.to_string()).or_insert(resolved),
        ))
    }

    /// Number of cached combination names.
    pub fn cached_combinations(&self) -> usize {
        self.combinations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Compile a spec into a detached capability set.
///
/// Pure: the same model and spec always yield an equal set. Only collisions
/// inside the declaration itself are detected here.
pub fn compile<M: ModelSchema + ?Sized>(model: &M, spec: EnumSpec) -> Result<CapabilitySet> {
    spec.validate()
        .map_err(|reason| DefinitionError::invalid_spec(&spec.attribute, model.model_name(), reason))?;

    let attr = spec.attribute.clone();
    let plural_attr = model.pluralize(&attr);
    let scope = match &spec.i18n_scope {
        Some(explicit) => format!("enums.{}", explicit),
        None => format!("enums.{}.{}", underscore(model.base_model_name()), attr),
    };
    let labels = LabelSet::new(&attr, scope, &spec.values);

    let mut builder = Builder {
        model: model.model_name(),
        attribute: &attr,
        instance: BTreeMap::new(),
        class: BTreeMap::new(),
        constants: BTreeMap::new(),
    };

    builder.instance(format!("{}_i18n", attr), InstanceMember::Label(labels.clone()))?;
    builder.instance(format!("{}_i18n_for", attr), InstanceMember::LabelOf(labels.clone()))?;
    builder.class(format!("{}_i18n_for", attr), ClassMember::LabelFor(labels.clone()))?;
    builder.class(format!("{}_i18n", plural_attr), ClassMember::Labels(labels.clone()))?;
    builder.constant(
        constant_name(&plural_attr),
        Constant::Values(spec.values.clone()),
    )?;

    let mut advisories = Vec::new();
    for value in &spec.values {
        let member = spec.member_name(value);

        builder.constant(constant_name(&member), Constant::Value(value.clone()))?;
        builder.instance(
            format!("{}?", member),
            InstanceMember::Predicate(Predicate::new(&attr, value)),
        )?;
        builder.instance(
            format!("{}!", member),
            InstanceMember::Updater(Updater::new(&attr, value)),
        )?;

        let scope_name = match spec.scopes {
            ScopePolicy::None => None,
            ScopePolicy::Singular => Some(format!("only_{}", value)),
            ScopePolicy::Pluralized => Some(format!("only_{}", model.pluralize(value))),
        };
        if let Some(scope_name) = scope_name {
            builder.class(scope_name, ClassMember::Scope(QueryFilter::new(&attr, value)))?;
        }

        if member.starts_with(NEGATIVE_PREFIX) {
            advisories.push(format!(
                "An enum element in {} uses the prefix '{}' ({}). This will cause a conflict \
                 with auto generated negative scopes.",
                model.model_name(),
                NEGATIVE_PREFIX,
                member
            ));
        }
    }

    let Builder {
        instance,
        class,
        constants,
        ..
    } = builder;

    let claimed_instance = vec![attr.clone(), format!("{}=", attr)];
    let claimed_class = vec![plural_attr];
    for claimed in &claimed_instance {
        if instance.contains_key(claimed) {
            return Err(self_conflict(model.model_name(), &attr, claimed, MemberKind::Instance));
        }
    }
    for claimed in &claimed_class {
        if class.contains_key(claimed) {
            return Err(self_conflict(model.model_name(), &attr, claimed, MemberKind::Class));
        }
    }

    Ok(CapabilitySet {
        spec,
        labels,
        claimed_instance,
        claimed_class,
        instance,
        class,
        constants,
        advisories,
    })
}

fn self_conflict(model: &str, attribute: &str, member: &str, kind: MemberKind) -> DefinitionError {
    DefinitionError::Conflict {
        enum_name: attribute.to_string(),
        model: model.to_string(),
        member: member.to_string(),
        kind,
        origin: ConflictOrigin::SameEnum,
    }
}

struct Builder<'a> {
    model: &'a str,
    attribute: &'a str,
    instance: BTreeMap<String, InstanceMember>,
    class: BTreeMap<String, ClassMember>,
    constants: BTreeMap<String, Constant>,
}

impl Builder<'_> {
    fn instance(&mut self, name: String, member: InstanceMember) -> Result<()> {
        match self.instance.entry(name) {
            Entry::Occupied(e) => Err(self_conflict(self.model, self.attribute, e.key(), MemberKind::Instance)),
            Entry::Vacant(e) => {
                e.insert(member);
                Ok(())
            }
        }
    }

    fn class(&mut self, name: String, member: ClassMember) -> Result<()> {
        match self.class.entry(name) {
            Entry::Occupied(e) => Err(self_conflict(self.model, self.attribute, e.key(), MemberKind::Class)),
            Entry::Vacant(e) => {
                e.insert(member);
                Ok(())
            }
        }
    }

    fn constant(&mut self, name: String, constant: Constant) -> Result<()> {
        match self.constants.entry(name) {
            Entry::Occupied(e) => Err(self_conflict(self.model, self.attribute, e.key(), MemberKind::Constant)),
            Entry::Vacant(e) => {
                e.insert(constant);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{LocaleCatalog, NoTranslations};
    use crate::model::ModelDescriptor;

    fn product() -> EnumRegistry<ModelDescriptor> {
        EnumRegistry::new(ModelDescriptor::active_record("Product"))
    }

    #[test]
    fn test_declare_generates_members() {
        let mut registry = product();
        let set = registry
            .declare(EnumSpec::new("status", ["active", "archived"]))
            .unwrap();

        assert_eq!(set.predicates().count(), 2);
        assert_eq!(set.updaters().count(), 2);
        assert_eq!(set.scopes().count(), 0);
        assert!(set.advisories().is_empty());

        assert!(registry.predicate("active?").is_some());
        assert!(registry.updater("archived!").is_some());
        assert!(matches!(
            registry.instance_member("status_i18n"),
            Some(InstanceMember::Label(_))
        ));
        assert!(matches!(
            registry.instance_member("status_i18n_for"),
            Some(InstanceMember::LabelOf(_))
        ));
        assert!(matches!(
            registry.class_member("status_i18n_for"),
            Some(ClassMember::LabelFor(_))
        ));
        assert!(matches!(
            registry.class_member("statuses_i18n"),
            Some(ClassMember::Labels(_))
        ));
        assert_eq!(
            registry.constant("STATUSES"),
            Some(&Constant::Values(vec!["active".into(), "archived".into()]))
        );
        assert_eq!(
            registry.constant("ACTIVE"),
            Some(&Constant::Value("active".into()))
        );
    }

    #[test]
    fn test_scope_policies() {
        let mut registry = product();
        registry
            .declare(EnumSpec::new("status", ["active"]).with_scopes(ScopePolicy::Singular))
            .unwrap();
        registry
            .declare(
                EnumSpec::new("color", ["red", "green"]).with_scopes(ScopePolicy::Pluralized),
            )
            .unwrap();

        assert_eq!(registry.scope("only_active").unwrap().value(), "active");
        assert_eq!(registry.scope("only_reds").unwrap().value(), "red");
        assert_eq!(registry.scope("only_greens").unwrap().attribute(), "color");
        assert!(registry.scope("only_red").is_none());
    }

    #[test]
    fn test_prefixed_members() {
        let mut registry = product();
        registry
            .declare(EnumSpec::new("color", ["red", "green"]).with_prefix(true))
            .unwrap();

        assert!(registry.predicate("color_red?").is_some());
        assert!(registry.predicate("red?").is_none());
        assert_eq!(
            registry.constant("COLOR_RED"),
            Some(&Constant::Value("red".into()))
        );
    }

    #[test]
    fn test_conflict_with_persistence_layer() {
        let mut registry = product();
        let err = registry
            .declare(EnumSpec::new("state", ["valid"]))
            .unwrap_err();

        assert_eq!(
            err,
            DefinitionError::Conflict {
                enum_name: "state".into(),
                model: "Product".into(),
                member: "valid?".into(),
                kind: MemberKind::Instance,
                origin: ConflictOrigin::Persistence("Active Record".into()),
            }
        );
        assert!(registry.enums().is_empty());
    }

    #[test]
    fn test_conflict_on_claimed_attribute_names() {
        let mut registry = product();
        let err = registry.declare(EnumSpec::new("id", ["a"])).unwrap_err();
        assert!(err.to_string().contains("instance method \"id\""));
    }

    #[test]
    fn test_scope_conflicts_with_class_method() {
        let model = ModelDescriptor::active_record("Product").with_class_methods(["only_active"]);
        let mut registry = EnumRegistry::new(model);
        let err = registry
            .declare(EnumSpec::new("status", ["active"]).with_scopes(ScopePolicy::Singular))
            .unwrap_err();

        assert!(matches!(
            err,
            DefinitionError::Conflict {
                kind: MemberKind::Class,
                ref member,
                ..
            } if member == "only_active"
        ));
    }

    #[test]
    fn test_conflict_with_another_enum_leaves_registry_untouched() {
        let mut registry = product();
        registry
            .declare(EnumSpec::new("status", ["active", "archived"]))
            .unwrap();
        let before = registry.enums().to_vec();

        let err = registry.declare(EnumSpec::new("state", ["active"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You tried to define an enum named \"state\" on the model \"Product\", but this will \
             generate a instance method \"active!\", which is already defined by another enum."
        );
        assert_eq!(registry.enums(), before.as_slice());
        assert!(registry.get("state").is_none());
        assert!(registry.predicate("active?").is_some());
    }

    #[test]
    fn test_self_collision() {
        let mut registry = EnumRegistry::new(ModelDescriptor::plain("Box"));
        // `statuses` is both a value constant and the collection constant.
        let err = registry
            .declare(EnumSpec::new("status", ["open", "statuses"]))
            .unwrap_err();

        assert!(matches!(
            err,
            DefinitionError::Conflict {
                origin: ConflictOrigin::SameEnum,
                kind: MemberKind::Constant,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_spec() {
        let mut registry = product();
        let err = registry
            .declare(EnumSpec::new("status", ["a", "a"]))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidSpec { .. }));
    }

    #[test]
    fn test_redeclare_replaces() {
        let mut registry = product();
        registry.declare(EnumSpec::new("status", ["active"])).unwrap();
        registry
            .declare(EnumSpec::new("status", ["active", "archived"]))
            .unwrap();

        assert_eq!(registry.enums().len(), 1);
        assert!(registry.predicate("archived?").is_some());
    }

    #[test]
    fn test_negative_prefix_is_advisory() {
        let mut registry = product();
        let set = registry
            .declare(EnumSpec::new("state", ["not_ready", "ready"]))
            .unwrap();

        assert_eq!(set.advisories().len(), 1);
        assert!(set.advisories()[0].contains("not_ready"));
        assert!(registry.predicate("not_ready?").is_some());
    }

    #[test]
    fn test_resolve_combination() {
        let mut registry = product();
        registry
            .declare(EnumSpec::new("color", ["red", "green", "yellow"]))
            .unwrap();

        let values = registry.resolve_combination("RED__GREEN__YELLOW").unwrap();
        assert_eq!(&*values, ["red", "green", "yellow"]);
        assert_eq!(registry.cached_combinations(), 1);

        let again = registry.resolve_combination("RED__GREEN__YELLOW").unwrap();
        assert!(Arc::ptr_eq(&values, &again));
        assert_eq!(registry.cached_combinations(), 1);

        let err = registry.resolve_combination("RED__GREEN__BLABLA").unwrap_err();
        assert_eq!(err.to_string(), "uninitialized constant Product::BLABLA");
        assert_eq!(registry.cached_combinations(), 1);
    }

    #[test]
    fn test_combination_rejects_collection_constant() {
        let mut registry = product();
        registry.declare(EnumSpec::new("color", ["red"])).unwrap();

        let err = registry.resolve_combination("RED__COLORS").unwrap_err();
        assert_eq!(err, DefinitionError::unknown_member("Product", "COLORS"));
        assert!(registry.resolve_combination("RED____").is_err());
    }

    #[test]
    fn test_declare_clears_combination_cache() {
        let mut registry = product();
        registry.declare(EnumSpec::new("color", ["red", "green"])).unwrap();
        registry.resolve_combination("RED__GREEN").unwrap();

        registry.declare(EnumSpec::new("size", ["big"])).unwrap();
        assert_eq!(registry.cached_combinations(), 0);
    }

    #[test]
    fn test_default_label_scope_uses_base_model() {
        let model = ModelDescriptor::active_record("CartType").with_base("Admin::Cart");
        let mut registry = EnumRegistry::new(model);
        registry.declare(EnumSpec::new("kind", ["a"])).unwrap();
        assert_eq!(registry.label_set("kind").unwrap().scope(), "enums.admin/cart.kind");

        registry
            .declare(EnumSpec::new("color", ["red"]).with_i18n_scope("product.color"))
            .unwrap();
        let labels = registry.label_set("color").unwrap();
        assert_eq!(labels.scope(), "enums.product.color");

        let catalog = LocaleCatalog::new().with("enums.product.color.red", "Red");
        assert_eq!(labels.label_of("red", &catalog), "Red");
        assert_eq!(labels.label_of("red", &NoTranslations), "red");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let model = ModelDescriptor::active_record("Product");
        let spec = EnumSpec::new("status", ["active", "archived"]).with_scopes(ScopePolicy::Singular);
        assert_eq!(
            compile(&model, spec.clone()).unwrap(),
            compile(&model, spec).unwrap()
        );
    }
}
