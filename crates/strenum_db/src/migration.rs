//! Structural migrations of one enum type.
//!
//! Every operation introspects the catalog first and fails with
//! [`MigrationError::Precondition`] before emitting any statement. Executor
//! failures after that point are passed through untouched; nothing is
//! rolled back.

use crate::backend::SqlExecutor;
use crate::error::{MigrationError, Result};
use crate::sql::{validate_label, MAX_NAME_BYTES};
use crate::statement::{CastExpr, CatalogQuery, Statement};
use crate::types::{
    AddPosition, ColumnConversion, ColumnRef, ColumnSource, DependentColumn, EnumLabel, EnumType,
    TypeName,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const STRING_TYPES: &[&str] = &["text", "character varying", "character"];
const INTEGER_TYPES: &[&str] = &["smallint", "integer", "bigint"];

/// Applies enum migrations through a [`SqlExecutor`].
///
/// Not safe to run concurrently against the same type; serialize schema
/// migrations through one runner.
#[derive(Debug)]
pub struct EnumMigrator<E> {
    executor: E,
    statements_executed: usize,
}

impl<E: SqlExecutor> EnumMigrator<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            statements_executed: 0,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Statements sent to the executor so far.
    pub fn statements_executed(&self) -> usize {
        self.statements_executed
    }

    fn exec(&mut self, statement: Statement) -> Result<()> {
        if statement.is_transaction_sensitive() {
            warn!(
                type_name = %statement.type_name(),
                "ADD VALUE must run outside a transaction block on PostgreSQL < 12; \
                 the new label is not usable until commit"
            );
        }
        self.executor.execute(&statement)?;
        self.statements_executed += 1;
        Ok(())
    }

    pub fn type_exists(&mut self, type_name: &TypeName) -> Result<bool> {
        Ok(self.executor.query_scalar(&CatalogQuery::TypeExists {
            type_name: type_name.clone(),
        })?)
    }

    /// Labels of the type in sort order.
    pub fn labels(&mut self, type_name: &TypeName) -> Result<Vec<EnumLabel>> {
        let rows = self.executor.query_rows(&CatalogQuery::EnumLabels {
            type_name: type_name.clone(),
        })?;
        rows.iter()
            .map(|row| {
                Ok(EnumLabel {
                    label: row.get_by_name("label")?,
                    sort_order: row.get_by_name("sort_order")?,
                })
            })
            .collect()
    }

    /// Columns whose declared type is this type.
    pub fn dependents(&mut self, type_name: &TypeName) -> Result<Vec<DependentColumn>> {
        let rows = self.executor.query_rows(&CatalogQuery::DependentColumns {
            type_name: type_name.clone(),
        })?;
        rows.iter()
            .map(|row| {
                Ok(DependentColumn {
                    schema: row.get_by_name("table_schema")?,
                    table: row.get_by_name("table_name")?,
                    column: row.get_by_name("column_name")?,
                    default: row.get_by_name("column_default")?,
                })
            })
            .collect()
    }

    /// Labels and dependent columns of an existing type.
    pub fn describe(&mut self, type_name: &TypeName) -> Result<EnumType> {
        self.require_type(type_name)?;
        Ok(EnumType {
            type_name: type_name.clone(),
            labels: self.labels(type_name)?,
            dependents: self.dependents(type_name)?,
        })
    }

    fn require_type(&mut self, type_name: &TypeName) -> Result<()> {
        if self.type_exists(type_name)? {
            Ok(())
        } else {
            Err(MigrationError::precondition(type_name, "type does not exist"))
        }
    }

    /// Create a type with the given labels in order.
    pub fn create_enum<I, S>(&mut self, type_name: &TypeName, labels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        check_labels(type_name, &labels)?;
        if self.type_exists(type_name)? {
            return Err(MigrationError::precondition(type_name, "type already exists"));
        }

        self.exec(Statement::CreateType {
            type_name: type_name.clone(),
            labels: labels.clone(),
        })?;
        info!(type_name = %type_name, labels = labels.len(), "Created enum type");
        Ok(())
    }

    /// Add a label, optionally next to an existing one.
    ///
    /// Returns `false` when the label was already present; nothing is
    /// executed then, whatever the anchor.
    pub fn add_value(
        &mut self,
        type_name: &TypeName,
        label: &str,
        position: Option<AddPosition>,
    ) -> Result<bool> {
        validate_label(label)?;
        self.require_type(type_name)?;
        let labels = self.labels(type_name)?;

        if labels.iter().any(|l| l.label == label) {
            info!(type_name = %type_name, label, "Enum label already present; skipping");
            return Ok(false);
        }
        if let Some(pos) = &position {
            if !labels.iter().any(|l| l.label == pos.anchor()) {
                return Err(MigrationError::precondition(
                    type_name,
                    format!("anchor label \"{}\" does not exist", pos.anchor()),
                ));
            }
        }

        self.exec(Statement::AddValue {
            type_name: type_name.clone(),
            label: label.to_string(),
            position: position.clone(),
        })?;
        info!(type_name = %type_name, label, ?position, "Added enum label");
        Ok(true)
    }

    /// Rename a label in place. Stored rows follow the rename.
    pub fn rename_value(&mut self, type_name: &TypeName, from: &str, to: &str) -> Result<()> {
        validate_label(to)?;
        self.require_type(type_name)?;
        let labels = self.labels(type_name)?;

        if !labels.iter().any(|l| l.label == from) {
            return Err(MigrationError::precondition(
                type_name,
                format!("label \"{}\" does not exist", from),
            ));
        }
        if labels.iter().any(|l| l.label == to) {
            return Err(MigrationError::precondition(
                type_name,
                format!("label \"{}\" already exists", to),
            ));
        }

        self.exec(Statement::RenameValue {
            type_name: type_name.clone(),
            from: from.to_string(),
            to: to.to_string(),
        })?;
        info!(type_name = %type_name, from, to, "Renamed enum label");
        Ok(())
    }

    /// Move `order` to the front, in that order; other labels follow in their
    /// previous relative order.
    ///
    /// New sort keys start one past the floor of the current maximum, so no
    /// key collides with an existing one while the update runs.
    pub fn reorder_values<S: AsRef<str>>(&mut self, type_name: &TypeName, order: &[S]) -> Result<()> {
        self.require_type(type_name)?;
        let labels = self.labels(type_name)?;

        let mut requested = Vec::with_capacity(order.len());
        let mut seen = HashSet::new();
        for label in order.iter().map(AsRef::as_ref) {
            if !seen.insert(label) {
                return Err(MigrationError::precondition(
                    type_name,
                    format!("label \"{}\" is listed more than once", label),
                ));
            }
            if !labels.iter().any(|l| l.label == label) {
                return Err(MigrationError::precondition(
                    type_name,
                    format!("label \"{}\" does not exist", label),
                ));
            }
            requested.push(label.to_string());
        }
        if requested.is_empty() {
            debug!(type_name = %type_name, "Empty reorder request; nothing to do");
            return Ok(());
        }

        let order = reordered_keys(&labels, &requested);
        self.exec(Statement::SetSortOrder {
            type_name: type_name.clone(),
            order,
        })?;
        info!(type_name = %type_name, moved = requested.len(), "Reordered enum labels");
        Ok(())
    }

    /// Remove a label by swapping in a replacement type.
    ///
    /// Refused when any dependent column has a default or stores the label
    /// in any row. The swap renames the type to `<name>_old`, creates the
    /// replacement, casts every dependent column through text and drops the
    /// old type. A failure part-way leaves the statements already run in place.
    pub fn delete_value(&mut self, type_name: &TypeName, label: &str) -> Result<()> {
        self.require_type(type_name)?;
        let labels = self.labels(type_name)?;
        if !labels.iter().any(|l| l.label == label) {
            return Err(MigrationError::precondition(
                type_name,
                format!("label \"{}\" does not exist", label),
            ));
        }

        let shadow = type_name.shadow();
        if shadow.name().len() > MAX_NAME_BYTES {
            return Err(MigrationError::precondition(
                type_name,
                format!(
                    "shadow type name \"{}\" exceeds {} bytes; rename the type first",
                    shadow.name(),
                    MAX_NAME_BYTES
                ),
            ));
        }
        if self.type_exists(&shadow)? {
            return Err(MigrationError::precondition(
                type_name,
                format!("shadow type {} already exists; drop it first", shadow),
            ));
        }

        let dependents = self.dependents(type_name)?;
        for dep in &dependents {
            if let Some(default) = &dep.default {
                return Err(MigrationError::precondition(
                    type_name,
                    format!(
                        "column {} has default {}; drop the default manually before deleting \"{}\"",
                        dep, default, label
                    ),
                ));
            }
        }
        for dep in &dependents {
            let in_use: bool = self.executor.query_scalar(&CatalogQuery::LabelInUse {
                column: dep.column_ref(),
                label: label.to_string(),
            })?;
            if in_use {
                return Err(MigrationError::precondition(
                    type_name,
                    format!("label \"{}\" is still stored in {}", label, dep),
                ));
            }
        }

        let remaining: Vec<String> = labels
            .into_iter()
            .map(|l| l.label)
            .filter(|l| l != label)
            .collect();

        self.exec(Statement::RenameType {
            type_name: type_name.clone(),
            new_name: shadow.name().to_string(),
        })?;
        self.exec(Statement::CreateType {
            type_name: type_name.clone(),
            labels: remaining,
        })?;
        for dep in &dependents {
            self.exec(Statement::AlterColumnType {
                table: dep.column_ref().table,
                column: dep.column.clone(),
                type_name: type_name.clone(),
                cast: CastExpr::TextRoundTrip,
                drop_default: false,
                set_default: None,
            })?;
        }
        self.exec(Statement::DropType { type_name: shadow })?;

        info!(
            type_name = %type_name,
            label,
            columns = dependents.len(),
            "Deleted enum label"
        );
        Ok(())
    }

    /// Retype a string or integer-code column to an enum type.
    ///
    /// Refused when any non-NULL stored value has no label: a string that is
    /// not a label of the target type, or a code missing from the mapping.
    /// The column default is always dropped before the cast and only the
    /// requested default is set afterwards. When the cast itself fails a
    /// type created by this call stays behind.
    pub fn convert_column(&mut self, conversion: &ColumnConversion) -> Result<()> {
        let type_name = &conversion.type_name;
        let info = self
            .executor
            .query_optional(&CatalogQuery::ColumnInfo {
                table: conversion.table.clone(),
                column: conversion.column.clone(),
            })?
            .ok_or_else(|| {
                MigrationError::precondition(
                    type_name,
                    format!(
                        "column {}.{} does not exist",
                        conversion.table, conversion.column
                    ),
                )
            })?;
        let schema: String = info.get_by_name("table_schema")?;
        let data_type: String = info.get_by_name("data_type")?;

        let cast = match &conversion.source {
            ColumnSource::Strings(_) => {
                if !STRING_TYPES.contains(&data_type.as_str()) {
                    return Err(MigrationError::precondition(
                        type_name,
                        format!(
                            "column {}.{} has type {}; string conversion needs a character column",
                            conversion.table, conversion.column, data_type
                        ),
                    ));
                }
                CastExpr::Direct
            }
            ColumnSource::IntegerCodes(mapping) => {
                if !INTEGER_TYPES.contains(&data_type.as_str()) {
                    return Err(MigrationError::precondition(
                        type_name,
                        format!(
                            "column {}.{} has type {}; code conversion needs an integer column",
                            conversion.table, conversion.column, data_type
                        ),
                    ));
                }
                let mut codes = HashSet::new();
                if let Some(dup) = mapping.iter().find(|m| !codes.insert(m.code)) {
                    return Err(MigrationError::precondition(
                        type_name,
                        format!("code {} is mapped more than once", dup.code),
                    ));
                }
                CastExpr::CaseMap(mapping.clone())
            }
        };

        let labels = conversion.source.labels();
        check_labels(type_name, &labels)?;
        if let Some(default) = &conversion.default {
            if !labels.contains(default) {
                return Err(MigrationError::precondition(
                    type_name,
                    format!("default \"{}\" is not one of the labels", default),
                ));
            }
        }

        let exists = self.type_exists(type_name)?;
        let mut target_labels = labels.clone();
        if conversion.use_existing_type {
            if !exists {
                return Err(MigrationError::precondition(type_name, "type does not exist"));
            }
            let current = self.labels(type_name)?;
            if let Some(missing) = labels
                .iter()
                .find(|l| !current.iter().any(|c| &c.label == *l))
            {
                return Err(MigrationError::precondition(
                    type_name,
                    format!("label \"{}\" is missing from the existing type", missing),
                ));
            }
            target_labels = current.into_iter().map(|l| l.label).collect();
        } else if exists {
            return Err(MigrationError::precondition(
                type_name,
                "type already exists; reuse it with use_existing_type",
            ));
        }

        let table = conversion.table.in_schema(schema);
        let (allowed, what) = match &conversion.source {
            ColumnSource::Strings(_) => (target_labels, "a value that is not a label"),
            ColumnSource::IntegerCodes(mapping) => (
                mapping.iter().map(|m| m.code.to_string()).collect(),
                "a code with no label in the mapping",
            ),
        };
        let stray: Option<String> = self.executor.query_scalar(&CatalogQuery::UnexpectedValue {
            column: ColumnRef::new(table.clone(), conversion.column.clone()),
            allowed,
        })?;
        if let Some(value) = stray {
            return Err(MigrationError::precondition(
                type_name,
                format!(
                    "column {}.{} stores {} ({}); update or clear those rows first",
                    table, conversion.column, what, value
                ),
            ));
        }

        if !conversion.use_existing_type {
            self.exec(Statement::CreateType {
                type_name: type_name.clone(),
                labels: labels.clone(),
            })?;
        }
        self.exec(Statement::AlterColumnType {
            table,
            column: conversion.column.clone(),
            type_name: type_name.clone(),
            cast,
            drop_default: true,
            set_default: conversion.default.clone(),
        })?;

        info!(
            type_name = %type_name,
            table = %conversion.table,
            column = %conversion.column,
            "Converted column to enum type"
        );
        Ok(())
    }

    /// Drop a type no column depends on.
    pub fn drop_enum(&mut self, type_name: &TypeName) -> Result<()> {
        self.require_type(type_name)?;
        let dependents = self.dependents(type_name)?;
        if !dependents.is_empty() {
            let columns: Vec<String> = dependents.iter().map(ToString::to_string).collect();
            return Err(MigrationError::precondition(
                type_name,
                format!("type is still used by {}", columns.join(", ")),
            ));
        }

        self.exec(Statement::DropType {
            type_name: type_name.clone(),
        })?;
        info!(type_name = %type_name, "Dropped enum type");
        Ok(())
    }
}

fn check_labels(type_name: &TypeName, labels: &[String]) -> Result<()> {
    if labels.is_empty() {
        return Err(MigrationError::precondition(type_name, "no labels given"));
    }
    let mut seen = HashSet::new();
    for label in labels {
        validate_label(label)?;
        if !seen.insert(label.as_str()) {
            return Err(MigrationError::precondition(
                type_name,
                format!("label \"{}\" is listed more than once", label),
            ));
        }
    }
    Ok(())
}

/// Sort keys putting `requested` first, then the rest in current order.
fn reordered_keys(current: &[EnumLabel], requested: &[String]) -> Vec<(String, f64)> {
    let max = current
        .iter()
        .map(|l| l.sort_order)
        .fold(0.0_f64, f64::max);
    let base = max.floor() + 1.0;

    let mut sorted: Vec<&EnumLabel> = current.iter().collect();
    sorted.sort_by(|a, b| a.sort_order.total_cmp(&b.sort_order));

    requested
        .iter()
        .cloned()
        .chain(
            sorted
                .into_iter()
                .map(|l| l.label.clone())
                .filter(|l| !requested.contains(l)),
        )
        .enumerate()
        .map(|(i, label)| (label, base + i as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DbValue, DryRun};
    use crate::memory::{ColumnDef, MemoryCatalog};
    use crate::types::{CodeMapping, TableName};

    fn color() -> TypeName {
        TypeName::public("color")
    }

    fn label(label: &str, sort_order: f64) -> EnumLabel {
        EnumLabel {
            label: label.into(),
            sort_order,
        }
    }

    #[test]
    fn test_reordered_keys_start_past_max() {
        let current = vec![label("red", 1.0), label("green", 1.5), label("blue", 2.25)];
        let keys = reordered_keys(&current, &["blue".to_string()]);
        assert_eq!(
            keys,
            vec![
                ("blue".to_string(), 3.0),
                ("red".to_string(), 4.0),
                ("green".to_string(), 5.0)
            ]
        );
    }

    #[test]
    fn test_create_rejects_duplicates() {
        let mut migrator = EnumMigrator::new(MemoryCatalog::new());
        let err = migrator
            .create_enum(&color(), ["red", "red"])
            .unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(migrator.statements_executed(), 0);
    }

    #[test]
    fn test_add_value_is_idempotent() {
        let mut migrator = EnumMigrator::new(MemoryCatalog::new());
        migrator.create_enum(&color(), ["red", "green"]).unwrap();

        assert!(migrator.add_value(&color(), "blue", None).unwrap());
        assert!(!migrator.add_value(&color(), "blue", None).unwrap());
        assert!(!migrator
            .add_value(&color(), "blue", Some(AddPosition::Before("nope".into())))
            .unwrap());
        assert_eq!(migrator.statements_executed(), 2);
    }

    #[test]
    fn test_delete_value_blocked_by_default() {
        let mut catalog = MemoryCatalog::new();
        let mut migrator = EnumMigrator::new(&mut catalog);
        migrator.create_enum(&color(), ["red", "green"]).unwrap();
        migrator
            .executor_mut()
            .create_table(
                &TableName::new("products"),
                vec![ColumnDef::enumerated("color", color()).with_default("green")],
            )
            .unwrap();

        let err = migrator.delete_value(&color(), "red").unwrap_err();
        assert!(err.to_string().contains("drop the default manually"));
        assert!(err.to_string().contains("public.products.color"));
    }

    #[test]
    fn test_dry_run_plans_delete() {
        let mut catalog = MemoryCatalog::new();
        EnumMigrator::new(&mut catalog)
            .create_enum(&color(), ["red", "green"])
            .unwrap();
        catalog
            .create_table(
                &TableName::new("products"),
                vec![ColumnDef::enumerated("color", color())],
            )
            .unwrap();
        catalog
            .insert(&TableName::new("products"), &[("color", DbValue::from("green"))])
            .unwrap();

        let mut migrator = EnumMigrator::new(DryRun::new(&mut catalog));
        migrator.delete_value(&color(), "red").unwrap();
        let planned = migrator.into_inner().into_parts().1;

        assert_eq!(
            planned,
            vec![
                "ALTER TYPE \"public\".\"color\" RENAME TO \"color_old\"",
                "CREATE TYPE \"public\".\"color\" AS ENUM ('green')",
                "ALTER TABLE \"public\".\"products\" ALTER COLUMN \"color\" TYPE \"public\".\"color\" \
                 USING \"color\"::text::\"public\".\"color\"",
                "DROP TYPE \"public\".\"color_old\"",
            ]
        );
        assert_eq!(catalog.enum_labels(&color()).unwrap(), vec!["red", "green"]);
    }

    #[test]
    fn test_convert_column_type_mismatch() {
        let mut catalog = MemoryCatalog::new();
        catalog
            .create_table(&TableName::new("users"), vec![ColumnDef::text("kind")])
            .unwrap();
        let mut migrator = EnumMigrator::new(&mut catalog);

        let conversion = ColumnConversion::integer_codes(
            TableName::new("users"),
            "kind",
            TypeName::public("kind"),
            vec![CodeMapping::new("a", 0)],
        );
        let err = migrator.convert_column(&conversion).unwrap_err();
        assert!(err.to_string().contains("code conversion needs an integer column"));
        assert!(!catalog.has_type(&TypeName::public("kind")));
    }

    #[test]
    fn test_convert_column_refuses_unmapped_code() {
        let mut catalog = MemoryCatalog::new();
        let users = TableName::new("users");
        catalog
            .create_table(&users, vec![ColumnDef::integer("partner_type")])
            .unwrap();
        for code in [0, 1, 2] {
            catalog
                .insert(&users, &[("partner_type", DbValue::from(code))])
                .unwrap();
        }
        let partner = TypeName::public("partner");
        let conversion = ColumnConversion::integer_codes(
            users.clone(),
            "partner_type",
            partner.clone(),
            vec![CodeMapping::new("retail", 0), CodeMapping::new("affiliate", 1)],
        );

        let mut migrator = EnumMigrator::new(&mut catalog);
        let err = migrator.convert_column(&conversion).unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("a code with no label in the mapping (2)"));
        assert_eq!(migrator.statements_executed(), 0);

        assert!(!catalog.has_type(&partner));
        assert_eq!(
            catalog.column_values(&users, "partner_type").unwrap(),
            vec![DbValue::from(0), DbValue::from(1), DbValue::from(2)]
        );
    }

    #[test]
    fn test_delete_value_refuses_overlong_shadow_name() {
        let long = TypeName::public("c".repeat(60));
        let mut migrator = EnumMigrator::new(MemoryCatalog::new());
        migrator.create_enum(&long, ["red", "green"]).unwrap();

        let err = migrator.delete_value(&long, "red").unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("exceeds 63 bytes"));
        assert_eq!(migrator.statements_executed(), 1);
        assert_eq!(
            migrator.executor().enum_labels(&long).unwrap(),
            vec!["red", "green"]
        );
    }
}
