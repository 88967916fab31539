//! Strenum Test Utilities
//!
//! PostgreSQL test infrastructure for the enum migration engine.
//!
//! # Features
//!
//! - `docker-tests`: Enable tests that require a running PostgreSQL
//!
//! # Usage
//!
//! ```rust,ignore
//! use strenum_test_utils::{PostgresTestGuard, TestDbConfig};
//!
//! #[test]
//! #[cfg(feature = "docker-tests")]
//! fn test_create_enum() {
//!     let mut guard = PostgresTestGuard::new(&TestDbConfig::database_url()).unwrap();
//!     guard.execute("CREATE TABLE products (id INT)").unwrap();
//!     // Schema dropped on Drop
//! }
//! ```

pub mod cleanup;
pub mod config;

pub use cleanup::PostgresTestGuard;
pub use config::{DbVersion, TestDbConfig, DATABASE_URL_ENV};
