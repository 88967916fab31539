//! In-process model of PostgreSQL enum types and the tables that use them.
//!
//! Interprets [`Statement`]s with PostgreSQL's rules for the subset the
//! migration engine emits: `IF NOT EXISTS` on labels, `BEFORE`/`AFTER` sort
//! keys, enum cast failures, defaults blocking a type change, and `DROP
//! TYPE` refusing while columns depend on the type. Types are tracked by
//! oid, so renaming a type keeps its columns attached.

use crate::backend::{hash_sql, sql_op_name, BackendError, DbRow, DbValue, SqlExecutor};
use crate::sql::validate_read_only;
use crate::statement::{CastExpr, CatalogQuery, Statement};
use crate::types::{AddPosition, ColumnRef, TableName, TypeName, DEFAULT_SCHEMA};
use std::collections::{BTreeSet, HashMap};
use tracing::debug_span;

/// Built-in column types the catalog models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Text,
    Varchar,
    SmallInt,
    Integer,
    BigInt,
}

impl ScalarType {
    /// `information_schema.columns.data_type`
    pub fn data_type(&self) -> &'static str {
        match self {
            ScalarType::Text => "text",
            ScalarType::Varchar => "character varying",
            ScalarType::SmallInt => "smallint",
            ScalarType::Integer => "integer",
            ScalarType::BigInt => "bigint",
        }
    }

    /// `information_schema.columns.udt_name`
    pub fn udt_name(&self) -> &'static str {
        match self {
            ScalarType::Text => "text",
            ScalarType::Varchar => "varchar",
            ScalarType::SmallInt => "int2",
            ScalarType::Integer => "int4",
            ScalarType::BigInt => "int8",
        }
    }

    /// Inverse of [`ScalarType::data_type`].
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        match data_type {
            "text" => Some(ScalarType::Text),
            "character varying" => Some(ScalarType::Varchar),
            "smallint" => Some(ScalarType::SmallInt),
            "integer" => Some(ScalarType::Integer),
            "bigint" => Some(ScalarType::BigInt),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarType::SmallInt | ScalarType::Integer | ScalarType::BigInt
        )
    }
}

/// Declared type of a new column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar(ScalarType),
    Enum(TypeName),
}

/// Column definition for [`MemoryCatalog::create_table`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    name: String,
    kind: ColumnKind,
    default: Option<DbValue>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Scalar(ScalarType::Text))
    }

    pub fn varchar(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Scalar(ScalarType::Varchar))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Scalar(ScalarType::Integer))
    }

    pub fn smallint(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Scalar(ScalarType::SmallInt))
    }

    pub fn enumerated(name: impl Into<String>, type_name: TypeName) -> Self {
        Self::new(name, ColumnKind::Enum(type_name))
    }

    pub fn with_default(mut self, value: impl Into<DbValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColType {
    Scalar(ScalarType),
    Enum(u32),
}

#[derive(Debug, Clone)]
struct EnumEntry {
    oid: u32,
    schema: String,
    name: String,
    labels: Vec<(String, f64)>,
}

impl EnumEntry {
    fn type_name(&self) -> TypeName {
        TypeName::new(self.schema.clone(), self.name.clone())
    }

    fn sorted(&self) -> Vec<(String, f64)> {
        let mut labels = self.labels.clone();
        labels.sort_by(|a, b| a.1.total_cmp(&b.1));
        labels
    }

    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|(l, _)| l == label)
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    ty: ColType,
    default: Option<DbValue>,
}

#[derive(Debug, Clone)]
struct Table {
    schema: String,
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<DbValue>>,
}

impl Table {
    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }
}

/// In-memory [`SqlExecutor`].
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    next_oid: u32,
    types: Vec<EnumEntry>,
    tables: Vec<Table>,
    executed: Vec<String>,
    failures: Vec<(String, String)>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            next_oid: 16_384,
            types: Vec::new(),
            tables: Vec::new(),
            executed: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Create a table (schema defaults to `public`). Not logged.
    pub fn create_table(
        &mut self,
        table: &TableName,
        columns: Vec<ColumnDef>,
    ) -> Result<(), BackendError> {
        let schema = table.schema().unwrap_or(DEFAULT_SCHEMA).to_string();
        if self.find_table(Some(&schema), table.name()).is_some() {
            return Err(BackendError::Database(format!(
                "relation \"{}\" already exists",
                table.name()
            )));
        }

        let mut built = Vec::with_capacity(columns.len());
        for def in columns {
            let ty = match &def.kind {
                ColumnKind::Scalar(scalar) => ColType::Scalar(*scalar),
                ColumnKind::Enum(type_name) => ColType::Enum(self.require_type(type_name)?.oid),
            };
            if let Some(default) = &def.default {
                self.check_value(ty, default)?;
            }
            built.push(Column {
                name: def.name,
                ty,
                default: def.default,
            });
        }

        self.tables.push(Table {
            schema,
            name: table.name().to_string(),
            columns: built,
            rows: Vec::new(),
        });
        Ok(())
    }

    /// Insert one row; unnamed columns take their default. Not logged.
    pub fn insert(
        &mut self,
        table: &TableName,
        values: &[(&str, DbValue)],
    ) -> Result<(), BackendError> {
        let idx = self.table_index(table)?;
        let mut row: Vec<DbValue> = self.tables[idx]
            .columns
            .iter()
            .map(|c| c.default.clone().unwrap_or(DbValue::Null))
            .collect();

        for (column, value) in values {
            let col_idx = self.tables[idx].column_index(column).ok_or_else(|| {
                BackendError::Database(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    column, self.tables[idx].name
                ))
            })?;
            self.check_value(self.tables[idx].columns[col_idx].ty, value)?;
            row[col_idx] = value.clone();
        }

        self.tables[idx].rows.push(row);
        Ok(())
    }

    /// Register a type that already exists elsewhere, keeping its sort keys. Not logged.
    pub fn import_type(
        &mut self,
        type_name: &TypeName,
        labels: Vec<(String, f64)>,
    ) -> Result<(), BackendError> {
        if self.has_type(type_name) {
            return Err(BackendError::Database(format!(
                "type \"{}\" already exists",
                type_name.name()
            )));
        }
        let oid = self.next_oid;
        self.next_oid += 1;
        self.types.push(EnumEntry {
            oid,
            schema: type_name.schema().to_string(),
            name: type_name.name().to_string(),
            labels,
        });
        Ok(())
    }

    /// Add a column holding `values`, one per new row, creating the table
    /// when needed. Existing rows get NULL. Values are taken as-is. Not logged.
    pub fn import_column(
        &mut self,
        table: &TableName,
        column: ColumnDef,
        values: Vec<DbValue>,
    ) -> Result<(), BackendError> {
        let ty = match &column.kind {
            ColumnKind::Scalar(scalar) => ColType::Scalar(*scalar),
            ColumnKind::Enum(type_name) => ColType::Enum(self.require_type(type_name)?.oid),
        };
        let schema = table.schema().unwrap_or(DEFAULT_SCHEMA);
        let idx = match self.find_table(Some(schema), table.name()) {
            Some(idx) => idx,
            None => {
                self.tables.push(Table {
                    schema: schema.to_string(),
                    name: table.name().to_string(),
                    columns: Vec::new(),
                    rows: Vec::new(),
                });
                self.tables.len() - 1
            }
        };

        let target = &mut self.tables[idx];
        if target.column_index(&column.name).is_some() {
            return Err(BackendError::Database(format!(
                "column \"{}\" of relation \"{}\" already exists",
                column.name, target.name
            )));
        }
        target.columns.push(Column {
            name: column.name,
            ty,
            default: column.default,
        });
        let width = target.columns.len();
        for row in &mut target.rows {
            row.push(DbValue::Null);
        }
        for value in values {
            let mut row = vec![DbValue::Null; width];
            row[width - 1] = value;
            target.rows.push(row);
        }
        Ok(())
    }

    /// Whether the column exists; an unqualified table matches any schema.
    pub fn has_column(&self, table: &TableName, column: &str) -> bool {
        self.tables.iter().any(|t| {
            t.name == table.name()
                && table.schema().map_or(true, |s| t.schema == s)
                && t.column_index(column).is_some()
        })
    }

    /// Values stored in one column, in insertion order.
    pub fn column_values(&self, table: &TableName, column: &str) -> Option<Vec<DbValue>> {
        let t = self.lookup_table(table)?;
        let idx = t.column_index(column)?;
        Some(t.rows.iter().map(|row| row[idx].clone()).collect())
    }

    /// Declared type: `schema.name` for enums, the SQL type name otherwise.
    pub fn column_type(&self, table: &TableName, column: &str) -> Option<String> {
        let t = self.lookup_table(table)?;
        let col = &t.columns[t.column_index(column)?];
        match col.ty {
            ColType::Scalar(scalar) => Some(scalar.data_type().to_string()),
            ColType::Enum(oid) => self.type_by_oid(oid).map(|e| e.type_name().to_string()),
        }
    }

    /// Default expression as the catalog reports it.
    pub fn column_default(&self, table: &TableName, column: &str) -> Option<String> {
        let t = self.lookup_table(table)?;
        let col = &t.columns[t.column_index(column)?];
        self.render_default(col)
    }

    /// Labels in sort order, or `None` when the type does not exist.
    pub fn enum_labels(&self, type_name: &TypeName) -> Option<Vec<String>> {
        self.find_type(type_name)
            .map(|idx| self.types[idx].sorted().into_iter().map(|(l, _)| l).collect())
    }

    pub fn has_type(&self, type_name: &TypeName) -> bool {
        self.find_type(type_name).is_some()
    }

    /// Successfully executed statements.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn clear_log(&mut self) {
        self.executed.clear();
    }

    /// Fail the next statement whose SQL starts with `sql_prefix`.
    pub fn fail_on(&mut self, sql_prefix: impl Into<String>, message: impl Into<String>) {
        self.failures.push((sql_prefix.into(), message.into()));
    }

    fn find_type(&self, type_name: &TypeName) -> Option<usize> {
        self.types
            .iter()
            .position(|e| e.schema == type_name.schema() && e.name == type_name.name())
    }

    fn require_type(&self, type_name: &TypeName) -> Result<&EnumEntry, BackendError> {
        self.find_type(type_name)
            .map(|idx| &self.types[idx])
            .ok_or_else(|| {
                BackendError::Database(format!("type \"{}\" does not exist", type_name))
            })
    }

    fn type_by_oid(&self, oid: u32) -> Option<&EnumEntry> {
        self.types.iter().find(|e| e.oid == oid)
    }

    fn find_table(&self, schema: Option<&str>, name: &str) -> Option<usize> {
        let mut candidates: Vec<usize> = self
            .tables
            .iter()
            .enumerate()
            .filter(|(_, t)| t.name == name && schema.map_or(true, |s| t.schema == s))
            .map(|(idx, _)| idx)
            .collect();
        candidates.sort_by(|a, b| self.tables[*a].schema.cmp(&self.tables[*b].schema));
        candidates.into_iter().next()
    }

    fn lookup_table(&self, table: &TableName) -> Option<&Table> {
        let schema = table.schema().unwrap_or(DEFAULT_SCHEMA);
        self.find_table(Some(schema), table.name())
            .map(|idx| &self.tables[idx])
    }

    fn table_index(&self, table: &TableName) -> Result<usize, BackendError> {
        let schema = table.schema().unwrap_or(DEFAULT_SCHEMA);
        self.find_table(Some(schema), table.name()).ok_or_else(|| {
            BackendError::Database(format!("relation \"{}\" does not exist", table))
        })
    }

    fn check_value(&self, ty: ColType, value: &DbValue) -> Result<(), BackendError> {
        match (ty, value) {
            (_, DbValue::Null) => Ok(()),
            (ColType::Scalar(s), DbValue::Integer(_)) if s.is_integer() => Ok(()),
            (ColType::Scalar(s), DbValue::Text(_)) if !s.is_integer() => Ok(()),
            (ColType::Enum(oid), DbValue::Text(label)) => match self.type_by_oid(oid) {
                Some(entry) if entry.has_label(label) => Ok(()),
                Some(entry) => Err(invalid_enum_input(&entry.type_name(), label)),
                None => Err(BackendError::Database(format!(
                    "cache lookup failed for type {}",
                    oid
                ))),
            },
            (ColType::Scalar(s), other) => Err(BackendError::Database(format!(
                "invalid input for type {}: {:?}",
                s.data_type(),
                other
            ))),
            (ColType::Enum(_), other) => Err(BackendError::Database(format!(
                "invalid input for enum column: {:?}",
                other
            ))),
        }
    }

    fn render_default(&self, column: &Column) -> Option<String> {
        let default = column.default.as_ref()?;
        let text = default.as_text()?;
        Some(match column.ty {
            ColType::Scalar(s) if s.is_integer() => text,
            ColType::Scalar(s) => format!("'{}'::{}", text.replace('\'', "''"), s.data_type()),
            ColType::Enum(oid) => {
                let name = self
                    .type_by_oid(oid)
                    .map(|e| e.name.clone())
                    .unwrap_or_else(|| oid.to_string());
                format!("'{}'::{}", text.replace('\'', "''"), name)
            }
        })
    }

    fn apply(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        match statement {
            Statement::CreateType { type_name, labels } => {
                if self.has_type(type_name) {
                    return Err(BackendError::Database(format!(
                        "type \"{}\" already exists",
                        type_name.name()
                    )));
                }
                let mut seen = std::collections::HashSet::new();
                if let Some(dup) = labels.iter().find(|l| !seen.insert(l.as_str())) {
                    return Err(BackendError::Database(format!(
                        "enum label \"{}\" used more than once",
                        dup
                    )));
                }
                let oid = self.next_oid;
                self.next_oid += 1;
                self.types.push(EnumEntry {
                    oid,
                    schema: type_name.schema().to_string(),
                    name: type_name.name().to_string(),
                    labels: labels
                        .iter()
                        .enumerate()
                        .map(|(i, l)| (l.clone(), (i + 1) as f64))
                        .collect(),
                });
                Ok(0)
            }

            Statement::AddValue {
                type_name,
                label,
                position,
            } => {
                let entry = self.require_type(type_name)?;
                if entry.has_label(label) {
                    return Ok(0);
                }
                let sorted = entry.sorted();
                let key = match position {
                    None => sorted.last().map_or(1.0, |(_, k)| k + 1.0),
                    Some(pos) => {
                        let idx = sorted
                            .iter()
                            .position(|(l, _)| l == pos.anchor())
                            .ok_or_else(|| {
                                BackendError::Database(format!(
                                    "\"{}\" is not an existing enum label",
                                    pos.anchor()
                                ))
                            })?;
                        let anchor = sorted[idx].1;
                        match pos {
                            AddPosition::Before(_) if idx == 0 => anchor - 1.0,
                            AddPosition::Before(_) => (sorted[idx - 1].1 + anchor) / 2.0,
                            AddPosition::After(_) if idx + 1 == sorted.len() => anchor + 1.0,
                            AddPosition::After(_) => (anchor + sorted[idx + 1].1) / 2.0,
                        }
                    }
                };
                let idx = self.find_type(type_name).unwrap_or_default();
                self.types[idx].labels.push((label.clone(), key));
                Ok(0)
            }

            Statement::RenameValue {
                type_name,
                from,
                to,
            } => {
                let entry = self.require_type(type_name)?;
                if !entry.has_label(from) {
                    return Err(BackendError::Database(format!(
                        "\"{}\" is not an existing enum label",
                        from
                    )));
                }
                if entry.has_label(to) {
                    return Err(BackendError::Database(format!(
                        "enum label \"{}\" already exists",
                        to
                    )));
                }
                let oid = entry.oid;
                let idx = self.find_type(type_name).unwrap_or_default();
                for (label, _) in &mut self.types[idx].labels {
                    if label == from {
                        *label = to.clone();
                    }
                }
                self.relabel_rows(oid, from, to);
                Ok(0)
            }

            Statement::SetSortOrder { type_name, order } => {
                let entry = self.require_type(type_name)?;
                let keys: HashMap<&str, f64> =
                    order.iter().map(|(l, k)| (l.as_str(), *k)).collect();

                let mut updated = Vec::with_capacity(entry.labels.len());
                for (label, _) in &entry.labels {
                    let key = keys.get(label.as_str()).copied().ok_or_else(|| {
                        BackendError::Database(
                            "null value in column \"enumsortorder\" of relation \"pg_enum\" \
                             violates not-null constraint"
                                .to_string(),
                        )
                    })?;
                    if updated.iter().any(|(_, k): &(String, f64)| *k == key) {
                        return Err(BackendError::Database(
                            "duplicate key value violates unique constraint \
                             \"pg_enum_typid_sortorder_index\""
                                .to_string(),
                        ));
                    }
                    updated.push((label.clone(), key));
                }

                let count = updated.len() as u64;
                let idx = self.find_type(type_name).unwrap_or_default();
                self.types[idx].labels = updated;
                Ok(count)
            }

            Statement::RenameType {
                type_name,
                new_name,
            } => {
                self.require_type(type_name)?;
                if self.has_type(&type_name.with_name(new_name.clone())) {
                    return Err(BackendError::Database(format!(
                        "type \"{}\" already exists",
                        new_name
                    )));
                }
                let idx = self.find_type(type_name).unwrap_or_default();
                self.types[idx].name = new_name.clone();
                Ok(0)
            }

            Statement::AlterColumnType {
                table,
                column,
                type_name,
                cast,
                drop_default,
                set_default,
            } => self.alter_column(table, column, type_name, cast, *drop_default, set_default),

            Statement::DropType { type_name } => {
                let oid = self.require_type(type_name)?.oid;
                let in_use = self
                    .tables
                    .iter()
                    .flat_map(|t| t.columns.iter())
                    .any(|c| c.ty == ColType::Enum(oid));
                if in_use {
                    return Err(BackendError::Database(format!(
                        "cannot drop type {} because other objects depend on it",
                        type_name
                    )));
                }
                self.types.retain(|e| e.oid != oid);
                Ok(0)
            }
        }
    }

    fn alter_column(
        &mut self,
        table: &TableName,
        column: &str,
        type_name: &TypeName,
        cast: &CastExpr,
        drop_default: bool,
        set_default: &Option<String>,
    ) -> Result<u64, BackendError> {
        let t_idx = self.table_index(table)?;
        let c_idx = self.tables[t_idx].column_index(column).ok_or_else(|| {
            BackendError::Database(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                column,
                table.name()
            ))
        })?;
        let target = self.require_type(type_name)?.clone();
        let source = self.tables[t_idx].columns[c_idx].ty;

        if !drop_default && self.tables[t_idx].columns[c_idx].default.is_some() {
            return Err(BackendError::Database(format!(
                "default for column \"{}\" cannot be cast automatically to type {}",
                column, type_name
            )));
        }

        let mut converted = Vec::with_capacity(self.tables[t_idx].rows.len());
        for row in &self.tables[t_idx].rows {
            let value = &row[c_idx];
            let text = match (cast, source) {
                (CastExpr::TextRoundTrip, _) => value.as_text(),
                (CastExpr::Direct, ColType::Scalar(s)) if !s.is_integer() => value.as_text(),
                (CastExpr::Direct, ColType::Scalar(s)) => {
                    return Err(BackendError::Database(format!(
                        "cannot cast type {} to {}",
                        s.data_type(),
                        type_name
                    )))
                }
                (CastExpr::Direct, ColType::Enum(oid)) => {
                    let from = self
                        .type_by_oid(oid)
                        .map(|e| e.type_name().to_string())
                        .unwrap_or_default();
                    return Err(BackendError::Database(format!(
                        "cannot cast type {} to {}",
                        from, type_name
                    )));
                }
                (CastExpr::CaseMap(mapping), ColType::Scalar(s)) if s.is_integer() => {
                    match value {
                        DbValue::Integer(code) => mapping
                            .iter()
                            .find(|m| m.code == *code)
                            .map(|m| m.label.clone()),
                        _ => None,
                    }
                }
                (CastExpr::CaseMap(_), ColType::Scalar(s)) => {
                    return Err(BackendError::Database(format!(
                        "operator does not exist: {} = integer",
                        s.data_type()
                    )))
                }
                (CastExpr::CaseMap(_), ColType::Enum(_)) => {
                    return Err(BackendError::Database(
                        "operator does not exist: enum = integer".to_string(),
                    ))
                }
            };

            match text {
                None => converted.push(DbValue::Null),
                Some(label) if target.has_label(&label) => converted.push(DbValue::Text(label)),
                Some(label) => return Err(invalid_enum_input(type_name, &label)),
            }
        }

        if let Some(default) = set_default {
            if !target.has_label(default) {
                return Err(invalid_enum_input(type_name, default));
            }
        }

        let table = &mut self.tables[t_idx];
        for (row, value) in table.rows.iter_mut().zip(converted) {
            row[c_idx] = value;
        }
        let col = &mut table.columns[c_idx];
        col.ty = ColType::Enum(target.oid);
        col.default = set_default.clone().map(DbValue::Text);
        Ok(0)
    }

    fn relabel_rows(&mut self, oid: u32, from: &str, to: &str) {
        for table in &mut self.tables {
            let indexes: Vec<usize> = table
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.ty == ColType::Enum(oid))
                .map(|(i, _)| i)
                .collect();
            for &i in &indexes {
                if table.columns[i].default == Some(DbValue::Text(from.to_string())) {
                    table.columns[i].default = Some(DbValue::Text(to.to_string()));
                }
                for row in &mut table.rows {
                    if row[i] == DbValue::Text(from.to_string()) {
                        row[i] = DbValue::Text(to.to_string());
                    }
                }
            }
        }
    }

    fn answer(&self, query: &CatalogQuery) -> Result<Vec<DbRow>, BackendError> {
        match query {
            CatalogQuery::TypeExists { type_name } => Ok(vec![DbRow::from_pairs([(
                "exists",
                DbValue::Boolean(self.has_type(type_name)),
            )])]),

            CatalogQuery::EnumLabels { type_name } => Ok(self
                .find_type(type_name)
                .map(|idx| self.types[idx].sorted())
                .unwrap_or_default()
                .into_iter()
                .map(|(label, key)| {
                    DbRow::from_pairs([
                        ("label", DbValue::Text(label)),
                        ("sort_order", DbValue::Real(key)),
                    ])
                })
                .collect()),

            CatalogQuery::DependentColumns { type_name } => {
                let Some(idx) = self.find_type(type_name) else {
                    return Ok(Vec::new());
                };
                let oid = self.types[idx].oid;
                let mut tables: Vec<&Table> = self.tables.iter().collect();
                tables.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));

                let mut rows = Vec::new();
                for table in tables {
                    for column in table.columns.iter().filter(|c| c.ty == ColType::Enum(oid)) {
                        rows.push(DbRow::from_pairs([
                            ("table_schema", DbValue::Text(table.schema.clone())),
                            ("table_name", DbValue::Text(table.name.clone())),
                            ("column_name", DbValue::Text(column.name.clone())),
                            ("column_default", DbValue::from(self.render_default(column))),
                        ]));
                    }
                }
                Ok(rows)
            }

            CatalogQuery::LabelInUse { column, label } => {
                let t_idx = self.table_index(&column.table)?;
                let table = &self.tables[t_idx];
                let c_idx = table.column_index(&column.column).ok_or_else(|| {
                    BackendError::Database(format!(
                        "column \"{}\" does not exist",
                        column.column
                    ))
                })?;
                let in_use = table
                    .rows
                    .iter()
                    .any(|row| row[c_idx].as_text().as_deref() == Some(label.as_str()));
                Ok(vec![DbRow::from_pairs([("in_use", DbValue::Boolean(in_use))])])
            }

            CatalogQuery::ColumnInfo { table, column } => {
                let mut tables: Vec<&Table> = self
                    .tables
                    .iter()
                    .filter(|t| {
                        t.name == table.name() && table.schema().map_or(true, |s| t.schema == s)
                    })
                    .collect();
                tables.sort_by(|a, b| a.schema.cmp(&b.schema));

                for t in tables {
                    let Some(c_idx) = t.column_index(column) else {
                        continue;
                    };
                    let col = &t.columns[c_idx];
                    let (data_type, udt_schema, udt_name) = match col.ty {
                        ColType::Scalar(s) => (
                            s.data_type().to_string(),
                            "pg_catalog".to_string(),
                            s.udt_name().to_string(),
                        ),
                        ColType::Enum(oid) => {
                            let entry = self.type_by_oid(oid);
                            (
                                "USER-DEFINED".to_string(),
                                entry.map(|e| e.schema.clone()).unwrap_or_default(),
                                entry.map(|e| e.name.clone()).unwrap_or_default(),
                            )
                        }
                    };
                    return Ok(vec![DbRow::from_pairs([
                        ("table_schema", DbValue::Text(t.schema.clone())),
                        ("data_type", DbValue::Text(data_type)),
                        ("udt_schema", DbValue::Text(udt_schema)),
                        ("udt_name", DbValue::Text(udt_name)),
                        ("column_default", DbValue::from(self.render_default(col))),
                    ])]);
                }
                Ok(Vec::new())
            }

            CatalogQuery::UnexpectedValue { column, allowed } => {
                let value = self
                    .stored_texts(column)?
                    .into_iter()
                    .find(|v| !allowed.contains(v));
                Ok(vec![DbRow::from_pairs([("value", DbValue::from(value))])])
            }

            CatalogQuery::DistinctValues { column } => Ok(self
                .stored_texts(column)?
                .into_iter()
                .map(|v| DbRow::from_pairs([("value", DbValue::Text(v))]))
                .collect()),
        }
    }

    /// Distinct non-NULL text forms stored in a column, sorted.
    fn stored_texts(&self, column: &ColumnRef) -> Result<BTreeSet<String>, BackendError> {
        let table = &self.tables[self.table_index(&column.table)?];
        let c_idx = table.column_index(&column.column).ok_or_else(|| {
            BackendError::Database(format!("column \"{}\" does not exist", column.column))
        })?;
        Ok(table.rows.iter().filter_map(|row| row[c_idx].as_text()).collect())
    }
}

fn invalid_enum_input(type_name: &TypeName, label: &str) -> BackendError {
    BackendError::Database(format!(
        "invalid input value for enum {}: \"{}\"",
        type_name, label
    ))
}

impl SqlExecutor for MemoryCatalog {
    fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        let sql = statement.to_sql()?;
        let span = debug_span!("db.exec", op = sql_op_name(&sql), sql_hash = %hash_sql(&sql));
        let _guard = span.enter();

        if let Some(pos) = self
            .failures
            .iter()
            .position(|(prefix, _)| sql.starts_with(prefix.as_str()))
        {
            let (_, message) = self.failures.remove(pos);
            return Err(BackendError::Database(message));
        }

        let affected = self.apply(statement)?;
        self.executed.push(sql);
        Ok(affected)
    }

    fn query_rows(&mut self, query: &CatalogQuery) -> Result<Vec<DbRow>, BackendError> {
        let sql = query.to_sql()?;
        validate_read_only(&sql).map_err(|e| BackendError::Query(e.to_string()))?;
        let span = debug_span!("db.query", op = sql_op_name(&sql), sql_hash = %hash_sql(&sql));
        let _guard = span.enter();
        self.answer(query)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
