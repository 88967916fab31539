//! Error types for the migration engine.

use crate::backend::BackendError;
use crate::sql::QuoteError;
use crate::types::TypeName;
use thiserror::Error;

/// Migration result type.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Migration errors.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// A precondition of the requested operation does not hold. Nothing was executed.
    #[error("Cannot migrate enum type {type_name}: {reason}")]
    Precondition { type_name: String, reason: String },

    /// The executor failed; passed through untouched.
    #[error(transparent)]
    Execution(#[from] BackendError),

    /// A name or label cannot be quoted safely.
    #[error("Invalid name or label: {0}")]
    Quote(#[from] QuoteError),

    /// A script step failed; earlier steps stay applied.
    #[error("Migration step {step} ({description}) failed: {source}")]
    Script {
        step: usize,
        description: String,
        #[source]
        source: Box<MigrationError>,
    },

    /// The migration script itself is malformed.
    #[error("Invalid migration script: {0}")]
    InvalidScript(String),
}

impl MigrationError {
    /// Create a precondition error for a type.
    pub fn precondition(type_name: &TypeName, reason: impl Into<String>) -> Self {
        Self::Precondition {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid script error.
    pub fn invalid_script(msg: impl Into<String>) -> Self {
        Self::InvalidScript(msg.into())
    }

    /// True when a precondition failed (directly or inside a script step).
    pub fn is_precondition(&self) -> bool {
        match self {
            Self::Precondition { .. } => true,
            Self::Script { source, .. } => source.is_precondition(),
            _ => false,
        }
    }
}
