//! Migration scripts: one administrative step per structural change.
//!
//! ```toml
//! schema = "public"
//!
//! [[step]]
//! op = "create_enum"
//! name = "color"
//! values = ["red", "green"]
//!
//! [[step]]
//! op = "add_value"
//! name = "color"
//! value = "blue"
//! after = "red"
//! ```

use crate::backend::SqlExecutor;
use crate::error::{MigrationError, Result};
use crate::migration::EnumMigrator;
use crate::types::{AddPosition, CodeMapping, ColumnConversion, TableName, TypeName, DEFAULT_SCHEMA};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A parsed migration script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationScript {
    /// Schema for names without one
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateEnum {
        name: String,
        values: Vec<String>,
    },
    AddValue {
        name: String,
        value: String,
        #[serde(default)]
        before: Option<String>,
        #[serde(default)]
        after: Option<String>,
    },
    RenameValue {
        name: String,
        from: String,
        to: String,
    },
    ReorderValues {
        name: String,
        values: Vec<String>,
    },
    DeleteValue {
        name: String,
        value: String,
    },
    StringToEnum {
        table: String,
        column: String,
        enum_name: String,
        values: Vec<String>,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        use_existing_type: bool,
    },
    IntToEnum {
        table: String,
        column: String,
        enum_name: String,
        mapping: Vec<CodeMapping>,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        use_existing_type: bool,
    },
    DropEnum {
        name: String,
    },
}

impl Step {
    /// Short human-readable form, e.g. `add_value color.blue`.
    pub fn describe(&self) -> String {
        match self {
            Step::CreateEnum { name, .. } => format!("create_enum {}", name),
            Step::AddValue { name, value, .. } => format!("add_value {}.{}", name, value),
            Step::RenameValue { name, from, to } => {
                format!("rename_value {}.{} -> {}", name, from, to)
            }
            Step::ReorderValues { name, .. } => format!("reorder_values {}", name),
            Step::DeleteValue { name, value } => format!("delete_value {}.{}", name, value),
            Step::StringToEnum { table, column, .. } => {
                format!("string_to_enum {}.{}", table, column)
            }
            Step::IntToEnum { table, column, .. } => format!("int_to_enum {}.{}", table, column),
            Step::DropEnum { name } => format!("drop_enum {}", name),
        }
    }

    fn position(before: &Option<String>, after: &Option<String>) -> Result<Option<AddPosition>> {
        match (before, after) {
            (Some(_), Some(_)) => Err(MigrationError::invalid_script(
                "add_value accepts either `before` or `after`, not both",
            )),
            (Some(anchor), None) => Ok(Some(AddPosition::Before(anchor.clone()))),
            (None, Some(anchor)) => Ok(Some(AddPosition::After(anchor.clone()))),
            (None, None) => Ok(None),
        }
    }

    fn apply<E: SqlExecutor>(&self, migrator: &mut EnumMigrator<E>, schema: &str) -> Result<()> {
        let type_name = |raw: &str| TypeName::parse(raw, schema);
        let table_name = |raw: &str| {
            let table = TableName::parse(raw);
            if table.schema().is_some() {
                table
            } else {
                table.in_schema(schema)
            }
        };

        match self {
            Step::CreateEnum { name, values } => {
                migrator.create_enum(&type_name(name), values.iter().cloned())
            }
            Step::AddValue {
                name,
                value,
                before,
                after,
            } => {
                let position = Self::position(before, after)?;
                migrator
                    .add_value(&type_name(name), value, position)
                    .map(|_| ())
            }
            Step::RenameValue { name, from, to } => {
                migrator.rename_value(&type_name(name), from, to)
            }
            Step::ReorderValues { name, values } => {
                migrator.reorder_values(&type_name(name), values.as_slice())
            }
            Step::DeleteValue { name, value } => migrator.delete_value(&type_name(name), value),
            Step::StringToEnum {
                table,
                column,
                enum_name,
                values,
                default,
                use_existing_type,
            } => {
                let mut conversion = ColumnConversion::strings(
                    table_name(table),
                    column.clone(),
                    type_name(enum_name),
                    values.iter().cloned(),
                )
                .using_existing_type(*use_existing_type);
                conversion.default = default.clone();
                migrator.convert_column(&conversion)
            }
            Step::IntToEnum {
                table,
                column,
                enum_name,
                mapping,
                default,
                use_existing_type,
            } => {
                let mut conversion = ColumnConversion::integer_codes(
                    table_name(table),
                    column.clone(),
                    type_name(enum_name),
                    mapping.clone(),
                )
                .using_existing_type(*use_existing_type);
                conversion.default = default.clone();
                migrator.convert_column(&conversion)
            }
            Step::DropEnum { name } => migrator.drop_enum(&type_name(name)),
        }
    }
}

impl MigrationScript {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let script: Self =
            toml::from_str(input).map_err(|e| MigrationError::invalid_script(e.to_string()))?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::invalid_script(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&input)
    }

    /// Schema for unqualified names.
    pub fn schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    fn validate(&self) -> Result<()> {
        for (idx, step) in self.steps.iter().enumerate() {
            if let Step::AddValue { before, after, .. } = step {
                Step::position(before, after).map_err(|e| MigrationError::Script {
                    step: idx + 1,
                    description: step.describe(),
                    source: Box::new(e),
                })?;
            }
        }
        Ok(())
    }
}

/// Outcome of one applied step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// 1-based position in the script
    pub index: usize,
    pub description: String,
    pub statements: usize,
}

/// Outcome of a completed script run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    pub fn total_statements(&self) -> usize {
        self.steps.iter().map(|s| s.statements).sum()
    }
}

impl<E: SqlExecutor> EnumMigrator<E> {
    /// Apply every step in order. The first failure stops the run; earlier
    /// steps stay applied.
    pub fn run_script(&mut self, script: &MigrationScript) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let mut steps = Vec::with_capacity(script.steps.len());

        for (idx, step) in script.steps.iter().enumerate() {
            let description = step.describe();
            let before = self.statements_executed();
            step.apply(self, script.schema())
                .map_err(|e| MigrationError::Script {
                    step: idx + 1,
                    description: description.clone(),
                    source: Box::new(e),
                })?;
            steps.push(StepReport {
                index: idx + 1,
                description,
                statements: self.statements_executed() - before,
            });
        }

        let report = MigrationReport {
            started_at,
            finished_at: Utc::now(),
            steps,
        };
        info!(
            steps = report.steps.len(),
            statements = report.total_statements(),
            "Migration script applied"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = MigrationScript::from_toml_str(
            r#"
            schema = "shop"

            [[step]]
            op = "create_enum"
            name = "color"
            values = ["red", "green"]

            [[step]]
            op = "int_to_enum"
            table = "users"
            column = "partner_type"
            enum_name = "partner"
            mapping = [{ label = "retail", code = 0 }, { label = "affiliate", code = 1 }]
            default = "retail"
            "#,
        )
        .unwrap();

        assert_eq!(script.schema(), "shop");
        assert_eq!(script.steps.len(), 2);
        assert_eq!(script.steps[0].describe(), "create_enum color");
        match &script.steps[1] {
            Step::IntToEnum {
                mapping,
                use_existing_type,
                ..
            } => {
                assert_eq!(mapping[1], CodeMapping::new("affiliate", 1));
                assert!(!use_existing_type);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_both_anchors_rejected() {
        let err = MigrationScript::from_toml_str(
            r#"
            [[step]]
            op = "add_value"
            name = "color"
            value = "blue"
            before = "red"
            after = "green"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("Migration step 1 (add_value color.blue) failed"));
    }

    #[test]
    fn test_unknown_op_rejected() {
        let err = MigrationScript::from_toml_str(
            r#"
            [[step]]
            op = "truncate_enum"
            name = "color"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidScript(_)));
    }

    #[test]
    fn test_default_schema() {
        let script = MigrationScript::from_toml_str("").unwrap();
        assert_eq!(script.schema(), "public");
        assert!(script.steps.is_empty());
    }
}
