//! Command-line interface for strenum
//!
//! `compile` works offline on declaration files. `migrate` and `inspect`
//! talk to PostgreSQL.

pub mod compile;
pub mod config;
pub mod error;
pub mod inspect;
pub mod migrate;
pub mod output;
