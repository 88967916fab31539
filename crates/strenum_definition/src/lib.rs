//! Enum Definition Compiler
//!
//! Turns a declarative string-enum declaration into a table of typed
//! capabilities bound to one owner model:
//!
//! 1. **Predicates**: `active?` answers `status == "active"`
//! 2. **Updaters**: `active!` persists `status = "active"` through the record
//! 3. **Scopes**: `only_active` filters records lazily (opt-in)
//! 4. **Constants**: `STATUSES` (all values) and `ACTIVE` (one value)
//! 5. **Labels**: human-readable names resolved through a [`Translator`]
//!
//! Nothing is generated at runtime. Every declaration compiles into a
//! [`CapabilitySet`] stored in the owner's [`EnumRegistry`], and callers
//! resolve members by ordinary lookup.
//!
//! Conflict detection always runs before anything is bound. A rejected
//! declaration leaves the registry exactly as it was.
//!
//! # Usage
//!
//! ```rust
//! use strenum_definition::{EnumRegistry, EnumSpec, ModelDescriptor, ScopePolicy};
//!
//! let mut registry = EnumRegistry::new(ModelDescriptor::active_record("Product"));
//! registry
//!     .declare(EnumSpec::new("status", ["active", "archived"]).with_scopes(ScopePolicy::Singular))
//!     .unwrap();
//!
//! assert!(registry.predicate("active?").is_some());
//! assert!(registry.scope("only_archived").is_some());
//! assert_eq!(
//!     registry.resolve_combination("ACTIVE__ARCHIVED").unwrap().to_vec(),
//!     vec!["active".to_string(), "archived".to_string()]
//! );
//! ```
//!
//! # Modules
//!
//! - [`spec`]: the declaration unit ([`EnumSpec`], [`ScopePolicy`])
//! - [`model`]: persistence collaborator traits ([`ModelSchema`], [`Record`])
//! - [`capability`]: the bound members (predicates, updaters, scopes, labels)
//! - [`registry`]: per-owner compilation, conflict detection, combinations
//! - [`labels`]: translation lookup with raw-value fallback
//! - [`inflect`]: pluralization and naming helpers

pub mod capability;
pub mod error;
pub mod inflect;
pub mod labels;
pub mod model;
pub mod registry;
pub mod spec;

pub use capability::{
    CapabilitySet, ClassMember, Constant, InstanceMember, LabelMap, LabelSet, Predicate,
    QueryFilter, Updater,
};
pub use error::{ConflictOrigin, DefinitionError, MemberKind, Result};
pub use labels::{LocaleCatalog, LocaleError, NoTranslations, Translator};
pub use model::{ModelDescriptor, ModelSchema, Record};
pub use registry::{EnumRegistry, COMBINATION_SEPARATOR, NEGATIVE_PREFIX};
pub use spec::{EnumSpec, ScopePolicy};
