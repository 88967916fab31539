//! Error types for enum declarations.

use std::fmt;
use thiserror::Error;

/// Declaration result type.
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Errors raised while declaring or resolving enum members.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// A generated member name is already taken on the owner model.
    #[error(
        "You tried to define an enum named \"{enum_name}\" on the model \"{model}\", but this \
         will generate a {kind} \"{member}\", which is already defined by {origin}."
    )]
    Conflict {
        enum_name: String,
        model: String,
        member: String,
        kind: MemberKind,
        origin: ConflictOrigin,
    },

    /// A constant (or one component of a combination name) does not exist.
    #[error("uninitialized constant {model}::{name}")]
    UnknownMember { model: String, name: String },

    /// The declaration itself is malformed.
    #[error("Invalid enum \"{enum_name}\" on the model \"{model}\": {reason}")]
    InvalidSpec {
        enum_name: String,
        model: String,
        reason: String,
    },
}

impl DefinitionError {
    /// Create an unknown member error.
    pub fn unknown_member(model: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownMember {
            model: model.into(),
            name: name.into(),
        }
    }

    /// Create an invalid spec error.
    pub fn invalid_spec(
        enum_name: impl Into<String>,
        model: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSpec {
            enum_name: enum_name.into(),
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// True for definition conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Namespace a generated member lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    /// Called on a record (`product.active?`)
    Instance,
    /// Called on the model (`Product.only_active`)
    Class,
    /// Constant on the model (`Product::ACTIVE`)
    Constant,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance method",
            Self::Class => "class method",
            Self::Constant => "constant",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who already owns a colliding name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictOrigin {
    /// Built into the persistence layer (named by [`crate::ModelSchema::layer_name`]).
    Persistence(String),
    /// Bound by the enum declared on another attribute.
    OtherEnum { attribute: String },
    /// Generated twice by the same declaration.
    SameEnum,
}

impl fmt::Display for ConflictOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistence(layer) => f.write_str(layer),
            Self::OtherEnum { .. } => f.write_str("another enum"),
            Self::SameEnum => f.write_str("another member of this enum"),
        }
    }
}
