//! SQL execution abstraction.
//!
//! The migration engine only talks to a [`SqlExecutor`]: it hands over typed
//! [`Statement`]s and [`CatalogQuery`]s and reads plain [`DbRow`]s back.
//! Executors:
//! - `PgExecutor`: PostgreSQL over sqlx (feature `postgres`)
//! - [`MemoryCatalog`](crate::MemoryCatalog): in-process catalog model
//! - [`DryRun`]: records statements and plays them against an in-memory copy

use crate::memory::{ColumnDef, ColumnKind, MemoryCatalog, ScalarType};
use crate::sql::QuoteError;
use crate::statement::{CatalogQuery, Statement};
use crate::types::{ColumnRef, TableName, TypeName};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Errors from the SQL execution collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Invalid SQL input: {0}")]
    Quote(#[from] QuoteError),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Value read from a catalog row.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Text form as PostgreSQL's `::text` cast would print it.
    pub fn as_text(&self) -> Option<String> {
        match self {
            DbValue::Null => None,
            DbValue::Integer(v) => Some(v.to_string()),
            DbValue::Real(v) => Some(v.to_string()),
            DbValue::Text(v) => Some(v.clone()),
            DbValue::Boolean(v) => Some(if *v { "true" } else { "false" }.to_string()),
        }
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        DbValue::Integer(v as i64)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Real(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, DbValue)>,
        S: Into<String>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(column, value)| (column.into(), value))
            .unzip();
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T, BackendError> {
        self.values
            .get(index)
            .ok_or_else(|| {
                BackendError::TypeConversion(format!("Column index {} out of bounds", index))
            })
            .and_then(|v| T::from_db_value(v))
    }

    /// Get a value by column name.
    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T, BackendError> {
        let index = self.columns.iter().position(|c| c == name).ok_or_else(|| {
            BackendError::TypeConversion(format!("Column '{}' not found", name))
        })?;
        self.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }
}

/// Conversion from a [`DbValue`].
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError>;
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Null => Err(BackendError::TypeConversion(
                "i64 field is NULL - use Option<i64> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected integer".to_string())),
        }
    }
}

impl FromDbValue for f64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Real(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v as f64),
            DbValue::Null => Err(BackendError::TypeConversion(
                "f64 field is NULL - use Option<f64> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected real".to_string())),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            DbValue::Null => Err(BackendError::TypeConversion(
                "String field is NULL - use Option<String> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected text".to_string())),
        }
    }
}

impl FromDbValue for bool {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Boolean(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v != 0),
            DbValue::Text(v) if v == "t" || v == "true" => Ok(true),
            DbValue::Text(v) if v == "f" || v == "false" => Ok(false),
            DbValue::Null => Err(BackendError::TypeConversion(
                "bool field is NULL - use Option<bool> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected boolean".to_string())),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}

/// The SQL execution collaborator.
///
/// Statement latency, cancellation and transaction boundaries belong to the
/// implementation. Callers must not run two migrations against the same type
/// concurrently.
pub trait SqlExecutor {
    /// Execute one structural statement; returns affected rows where meaningful.
    fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError>;

    /// Run one catalog query and return every row.
    fn query_rows(&mut self, query: &CatalogQuery) -> Result<Vec<DbRow>, BackendError>;

    /// Run a catalog query and return the first row, if any.
    fn query_optional(&mut self, query: &CatalogQuery) -> Result<Option<DbRow>, BackendError> {
        Ok(self.query_rows(query)?.into_iter().next())
    }

    /// Run a catalog query and read the first column of its only row.
    fn query_scalar<T: FromDbValue>(&mut self, query: &CatalogQuery) -> Result<T, BackendError>
    where
        Self: Sized,
    {
        let row = self
            .query_optional(query)?
            .ok_or_else(|| BackendError::Query("Expected one row, got none".to_string()))?;
        row.get(0)
    }

    fn backend_name(&self) -> &'static str;
}

impl<E: SqlExecutor + ?Sized> SqlExecutor for &mut E {
    fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        (**self).execute(statement)
    }

    fn query_rows(&mut self, query: &CatalogQuery) -> Result<Vec<DbRow>, BackendError> {
        (**self).query_rows(query)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Executor that plans instead of executing.
///
/// Statements are rendered and recorded, then applied to a [`MemoryCatalog`]
/// overlay rather than the inner executor. A type or column is copied into
/// the overlay from the inner executor the first time anything touches it,
/// so later steps of a plan see what earlier ones would have done. The inner
/// executor only ever receives catalog queries.
#[derive(Debug)]
pub struct DryRun<E> {
    inner: E,
    overlay: MemoryCatalog,
    seeded_types: HashSet<TypeName>,
    seeded_columns: HashSet<ColumnRef>,
    planned: Vec<String>,
}

impl<E: SqlExecutor> DryRun<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            overlay: MemoryCatalog::new(),
            seeded_types: HashSet::new(),
            seeded_columns: HashSet::new(),
            planned: Vec::new(),
        }
    }

    /// Rendered statements, in the order they would have run.
    pub fn planned(&self) -> &[String] {
        &self.planned
    }

    /// The touched part of the catalog as it would look after the plan.
    pub fn overlay(&self) -> &MemoryCatalog {
        &self.overlay
    }

    pub fn into_parts(self) -> (E, Vec<String>) {
        (self.inner, self.planned)
    }

    /// Copy a type and every column using it from the inner executor.
    fn seed_type(&mut self, type_name: &TypeName) -> Result<(), BackendError> {
        if !self.seeded_types.insert(type_name.clone()) {
            return Ok(());
        }
        let exists: bool = self.inner.query_scalar(&CatalogQuery::TypeExists {
            type_name: type_name.clone(),
        })?;
        if !exists {
            return Ok(());
        }

        let labels = self
            .inner
            .query_rows(&CatalogQuery::EnumLabels {
                type_name: type_name.clone(),
            })?
            .iter()
            .map(|row| Ok((row.get_by_name("label")?, row.get_by_name("sort_order")?)))
            .collect::<Result<Vec<(String, f64)>, BackendError>>()?;
        self.overlay.import_type(type_name, labels)?;

        let dependents = self.inner.query_rows(&CatalogQuery::DependentColumns {
            type_name: type_name.clone(),
        })?;
        for row in &dependents {
            let column = ColumnRef::new(
                TableName::qualified(
                    row.get_by_name::<String>("table_schema")?,
                    row.get_by_name::<String>("table_name")?,
                ),
                row.get_by_name::<String>("column_name")?,
            );
            let default: Option<String> = row.get_by_name("column_default")?;
            self.import_column(column, ColumnKind::Enum(type_name.clone()), default)?;
        }
        debug!(type_name = %type_name, columns = dependents.len(), "Copied enum type into dry-run overlay");
        Ok(())
    }

    /// Copy one column, through its type when it is an enum column.
    /// Columns of types the overlay cannot model are left out.
    fn seed_column(&mut self, column: &ColumnRef) -> Result<(), BackendError> {
        if column.table.schema().is_some() && self.seeded_columns.contains(column) {
            return Ok(());
        }
        let Some(info) = self.inner.query_optional(&CatalogQuery::ColumnInfo {
            table: column.table.clone(),
            column: column.column.clone(),
        })?
        else {
            return Ok(());
        };
        let schema: String = info.get_by_name("table_schema")?;
        let qualified = ColumnRef::new(column.table.in_schema(schema), column.column.clone());
        if self.seeded_columns.contains(&qualified) {
            return Ok(());
        }

        let data_type: String = info.get_by_name("data_type")?;
        if data_type == "USER-DEFINED" {
            let udt = TypeName::new(
                info.get_by_name::<String>("udt_schema")?,
                info.get_by_name::<String>("udt_name")?,
            );
            return self.seed_type(&udt);
        }
        match ScalarType::from_data_type(&data_type) {
            Some(scalar) => {
                let default: Option<String> = info.get_by_name("column_default")?;
                self.import_column(qualified, ColumnKind::Scalar(scalar), default)
            }
            None => Ok(()),
        }
    }

    fn import_column(
        &mut self,
        column: ColumnRef,
        kind: ColumnKind,
        default: Option<String>,
    ) -> Result<(), BackendError> {
        if !self.seeded_columns.insert(column.clone()) {
            return Ok(());
        }
        let integer = matches!(kind, ColumnKind::Scalar(s) if s.is_integer());
        let values = self
            .inner
            .query_rows(&CatalogQuery::DistinctValues {
                column: column.clone(),
            })?
            .iter()
            .map(|row| row.get_by_name::<String>("value").map(|v| stored_value(v, integer)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut def = ColumnDef::new(column.column.clone(), kind);
        if let Some(default) = default {
            def = def.with_default(parse_default(&default, integer));
        }
        self.overlay.import_column(&column.table, def, values)
    }

    fn seed_statement(&mut self, statement: &Statement) -> Result<(), BackendError> {
        self.seed_type(statement.type_name())?;
        match statement {
            Statement::RenameType {
                type_name,
                new_name,
            } => self.seed_type(&type_name.with_name(new_name.clone())),
            Statement::AlterColumnType { table, column, .. } => {
                self.seed_column(&ColumnRef::new(table.clone(), column.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl<E: SqlExecutor> SqlExecutor for DryRun<E> {
    fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        let sql = statement.to_sql()?;
        self.seed_statement(statement)?;
        let affected = self.overlay.execute(statement)?;
        self.planned.push(sql);
        Ok(affected)
    }

    fn query_rows(&mut self, query: &CatalogQuery) -> Result<Vec<DbRow>, BackendError> {
        match query {
            CatalogQuery::TypeExists { type_name }
            | CatalogQuery::EnumLabels { type_name }
            | CatalogQuery::DependentColumns { type_name } => self.seed_type(type_name)?,
            _ => {
                if let Some(column) = query.column() {
                    self.seed_column(&column)?;
                    if !self.overlay.has_column(&column.table, &column.column) {
                        return self.inner.query_rows(query);
                    }
                }
            }
        }
        self.overlay.query_rows(query)
    }

    fn backend_name(&self) -> &'static str {
        "dry-run"
    }
}

fn stored_value(text: String, integer: bool) -> DbValue {
    match text.parse::<i64>() {
        Ok(code) if integer => DbValue::Integer(code),
        _ => DbValue::Text(text),
    }
}

/// Literal from a catalog default such as `'it''s'::color` or `0`.
/// Other expressions are kept as their text.
fn parse_default(rendered: &str, integer: bool) -> DbValue {
    if let Some(rest) = rendered.strip_prefix('\'') {
        let mut text = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '\'' {
                text.push(ch);
            } else if chars.peek() == Some(&'\'') {
                chars.next();
                text.push(ch);
            } else {
                return DbValue::Text(text);
            }
        }
    }
    stored_value(rendered.to_string(), integer)
}

pub(crate) fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

pub(crate) fn hash_sql(sql: &str) -> String {
    // FNV-1a 64-bit hash for low-cardinality, stable identification.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_access() {
        let row = DbRow::from_pairs([
            ("label", DbValue::from("red")),
            ("sort_order", DbValue::Real(1.5)),
            ("column_default", DbValue::Null),
        ]);

        assert_eq!(row.get::<String>(0).unwrap(), "red");
        assert_eq!(row.get_by_name::<f64>("sort_order").unwrap(), 1.5);
        assert_eq!(row.get_by_name::<Option<String>>("column_default").unwrap(), None);
        assert!(row.get_by_name::<String>("column_default").is_err());
        assert!(row.get::<String>(7).is_err());
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_bool_from_text() {
        assert!(bool::from_db_value(&DbValue::from("t")).unwrap());
        assert!(!bool::from_db_value(&DbValue::from("false")).unwrap());
        assert!(bool::from_db_value(&DbValue::from("maybe")).is_err());
    }

    #[test]
    fn test_dry_run_applies_plan_to_overlay_only() {
        let mut catalog = MemoryCatalog::new();
        let color = TypeName::public("color");

        let mut dry = DryRun::new(&mut catalog);
        dry.execute(&Statement::CreateType {
            type_name: color.clone(),
            labels: vec!["red".into()],
        })
        .unwrap();
        let exists: bool = dry
            .query_scalar(&CatalogQuery::TypeExists {
                type_name: color.clone(),
            })
            .unwrap();

        assert!(exists);
        assert_eq!(
            dry.planned(),
            ["CREATE TYPE \"public\".\"color\" AS ENUM ('red')"]
        );
        assert_eq!(dry.overlay().enum_labels(&color).unwrap(), vec!["red"]);
        assert!(catalog.executed().is_empty());
        assert!(!catalog.has_type(&color));
    }

    #[test]
    fn test_dry_run_copies_live_rows_and_defaults() {
        let mut catalog = MemoryCatalog::new();
        let color = TypeName::public("color");
        let products = TableName::new("products");
        catalog
            .execute(&Statement::CreateType {
                type_name: color.clone(),
                labels: vec!["red".into(), "green".into()],
            })
            .unwrap();
        catalog
            .create_table(
                &products,
                vec![ColumnDef::enumerated("color", color.clone()).with_default("green")],
            )
            .unwrap();
        catalog
            .insert(&products, &[("color", DbValue::from("red"))])
            .unwrap();

        let mut dry = DryRun::new(&mut catalog);
        dry.execute(&Statement::RenameValue {
            type_name: color.clone(),
            from: "red".into(),
            to: "crimson".into(),
        })
        .unwrap();
        let in_use: bool = dry
            .query_scalar(&CatalogQuery::LabelInUse {
                column: ColumnRef::new(products.in_schema("public"), "color"),
                label: "crimson".into(),
            })
            .unwrap();
        assert!(in_use);

        let err = dry
            .execute(&Statement::DropType {
                type_name: color.clone(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("other objects depend on it"));
        assert_eq!(dry.planned().len(), 1);

        let overlay = dry.overlay();
        assert_eq!(
            overlay.column_default(&products, "color").as_deref(),
            Some("'green'::color")
        );
        assert_eq!(catalog.enum_labels(&color).unwrap(), vec!["red", "green"]);
    }

    #[test]
    fn test_parse_default() {
        assert_eq!(parse_default("'it''s'::color", false), DbValue::from("it's"));
        assert_eq!(parse_default("0", true), DbValue::from(0));
        assert_eq!(parse_default("0", false), DbValue::from("0"));
        assert_eq!(
            parse_default("nextval('seq'::regclass)", true),
            DbValue::from("nextval('seq'::regclass)")
        );
    }

    #[test]
    fn test_hash_sql_is_stable() {
        assert_eq!(hash_sql("SELECT 1"), hash_sql("SELECT 1"));
        assert_ne!(hash_sql("SELECT 1"), hash_sql("SELECT 2"));
        assert_eq!(hash_sql("").len(), 16);
        assert_eq!(sql_op_name("  ALTER TYPE x"), "ALTER");
    }
}
