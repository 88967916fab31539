//! Enum Schema Migration Engine.
//!
//! Safe structural evolution of native PostgreSQL enum types: create, add,
//! rename, reorder and delete labels, retype legacy string or integer-code
//! columns, drop unused types.
//!
//! All SQL is rendered from typed [`Statement`]s and [`CatalogQuery`]s and
//! every caller-supplied identifier or label is quoted in [`sql`]. Execution
//! goes through a [`SqlExecutor`]:
//!
//! - `PgExecutor`: PostgreSQL via sqlx (feature `postgres`, default)
//! - [`MemoryCatalog`]: in-process model of enum types and tables
//! - [`DryRun`]: records statements and plays them against an in-memory copy of
//!   the live catalog
//!
//! # Example
//!
//! ```
//! use strenum_db::{EnumMigrator, MemoryCatalog, TypeName};
//!
//! let mut migrator = EnumMigrator::new(MemoryCatalog::new());
//! let color = TypeName::public("color");
//! migrator.create_enum(&color, ["red", "green"]).unwrap();
//! migrator.add_value(&color, "blue", None).unwrap();
//! migrator.reorder_values(&color, &["blue"]).unwrap();
//!
//! let labels = migrator.executor().enum_labels(&color).unwrap();
//! assert_eq!(labels, vec!["blue", "red", "green"]);
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod migration;
pub mod script;
pub mod sql;
pub mod statement;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use backend::{BackendError, DbRow, DbValue, DryRun, FromDbValue, SqlExecutor};
pub use error::{MigrationError, Result};
pub use memory::{ColumnDef, ColumnKind, MemoryCatalog, ScalarType};
pub use migration::EnumMigrator;
pub use script::{MigrationReport, MigrationScript, Step, StepReport};
pub use sql::{quote_ident, quote_label, quote_literal, quote_table, quote_type, QuoteError};
pub use statement::{CastExpr, CatalogQuery, Statement};
pub use types::{
    AddPosition, CodeMapping, ColumnConversion, ColumnRef, ColumnSource, DependentColumn,
    EnumLabel, EnumType, TableName, TypeName, DEFAULT_SCHEMA,
};

#[cfg(feature = "postgres")]
pub use postgres::PgExecutor;
