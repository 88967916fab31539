//! Domain types for enum migrations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema used when none is given.
pub const DEFAULT_SCHEMA: &str = "public";

/// Schema-qualified enum type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName {
    schema: String,
    name: String,
}

impl TypeName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Type in the `public` schema.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_SCHEMA, name)
    }

    /// Parse `schema.name`, or `name` in `default_schema`.
    pub fn parse(raw: &str, default_schema: &str) -> Self {
        match raw.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new(default_schema, raw),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same schema, different name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self::new(self.schema.clone(), name)
    }

    /// Name of the shadow type used while a label is deleted.
    pub fn shadow(&self) -> Self {
        self.with_name(format!("{}_old", self.name))
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Table name with an optional schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Parse `schema.table` or a bare `table`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((schema, name)) => Self::qualified(schema, name),
            None => Self::new(raw),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same table, pinned to a schema.
    pub fn in_schema(&self, schema: impl Into<String>) -> Self {
        Self::qualified(schema, self.name.clone())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One column of one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: TableName,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: TableName, column: impl Into<String>) -> Self {
        Self {
            table,
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A label and its backend sort key.
///
/// Sort keys are floats maintained by the database and need not be
/// contiguous; only their relative order matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumLabel {
    pub label: String,
    pub sort_order: f64,
}

/// A column whose declared type is the enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentColumn {
    pub schema: String,
    pub table: String,
    pub column: String,
    /// Default expression as reported by the catalog
    pub default: Option<String>,
}

impl DependentColumn {
    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(
            TableName::qualified(self.schema.clone(), self.table.clone()),
            self.column.clone(),
        )
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Display for DependentColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.schema, self.table, self.column)
    }
}

/// Introspected state of one enum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub type_name: TypeName,
    /// Labels in sort order
    pub labels: Vec<EnumLabel>,
    pub dependents: Vec<DependentColumn>,
}

impl EnumType {
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.label.as_str()).collect()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.label == label)
    }
}

/// Where `add_value` places a new label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddPosition {
    Before(String),
    After(String),
}

impl AddPosition {
    pub fn anchor(&self) -> &str {
        match self {
            Self::Before(anchor) | Self::After(anchor) => anchor,
        }
    }
}

/// Integer code stored in a legacy column and the label it becomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMapping {
    pub label: String,
    pub code: i64,
}

impl CodeMapping {
    pub fn new(label: impl Into<String>, code: i64) -> Self {
        Self {
            label: label.into(),
            code,
        }
    }
}

/// What the column holds before conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSource {
    /// Raw strings, already equal to the labels
    Strings(Vec<String>),
    /// Small integer codes mapped to labels
    IntegerCodes(Vec<CodeMapping>),
}

impl ColumnSource {
    /// Labels of the target type, in declared order.
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Strings(values) => values.clone(),
            Self::IntegerCodes(mapping) => mapping.iter().map(|m| m.label.clone()).collect(),
        }
    }
}

/// A request to retype an existing column to an enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConversion {
    pub table: TableName,
    pub column: String,
    pub type_name: TypeName,
    pub source: ColumnSource,
    /// Label restored as the column default after the cast
    pub default: Option<String>,
    /// Reuse an existing type instead of creating one
    pub use_existing_type: bool,
}

impl ColumnConversion {
    pub fn strings<I, S>(table: TableName, column: impl Into<String>, type_name: TypeName, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table,
            column: column.into(),
            type_name,
            source: ColumnSource::Strings(values.into_iter().map(Into::into).collect()),
            default: None,
            use_existing_type: false,
        }
    }

    pub fn integer_codes(
        table: TableName,
        column: impl Into<String>,
        type_name: TypeName,
        mapping: Vec<CodeMapping>,
    ) -> Self {
        Self {
            table,
            column: column.into(),
            type_name,
            source: ColumnSource::IntegerCodes(mapping),
            default: None,
            use_existing_type: false,
        }
    }

    pub fn with_default(mut self, label: impl Into<String>) -> Self {
        self.default = Some(label.into());
        self
    }

    pub fn using_existing_type(mut self, reuse: bool) -> Self {
        self.use_existing_type = reuse;
        self
    }
}
