//! Typed statements and catalog queries, rendered to PostgreSQL.

use crate::sql::{quote_ident, quote_label, quote_literal, quote_table, quote_type, QuoteError};
use crate::types::{AddPosition, CodeMapping, ColumnRef, TableName, TypeName};
use std::fmt::Write as _;

/// How stored values are cast to the enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastExpr {
    /// `"c"::text::"s"."t"` (enum to enum through text)
    TextRoundTrip,
    /// `"c"::"s"."t"` (string column)
    Direct,
    /// `(CASE "c" WHEN 0 THEN 'a' ... END)::"s"."t"` (integer codes)
    CaseMap(Vec<CodeMapping>),
}

/// A structural statement against one enum type or its dependents.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateType {
        type_name: TypeName,
        labels: Vec<String>,
    },
    AddValue {
        type_name: TypeName,
        label: String,
        position: Option<AddPosition>,
    },
    RenameValue {
        type_name: TypeName,
        from: String,
        to: String,
    },
    /// Rewrites `pg_enum.enumsortorder`; every label of the type must be listed.
    SetSortOrder {
        type_name: TypeName,
        order: Vec<(String, f64)>,
    },
    RenameType {
        type_name: TypeName,
        new_name: String,
    },
    AlterColumnType {
        table: TableName,
        column: String,
        type_name: TypeName,
        cast: CastExpr,
        drop_default: bool,
        set_default: Option<String>,
    },
    DropType {
        type_name: TypeName,
    },
}

impl Statement {
    /// Render to SQL, quoting every identifier and literal.
    pub fn to_sql(&self) -> Result<String, QuoteError> {
        match self {
            Statement::CreateType { type_name, labels } => {
                let labels = labels
                    .iter()
                    .map(|l| quote_label(l))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!(
                    "CREATE TYPE {} AS ENUM ({})",
                    quote_type(type_name)?,
                    labels.join(", ")
                ))
            }
            Statement::AddValue {
                type_name,
                label,
                position,
            } => {
                let mut sql = format!(
                    "ALTER TYPE {} ADD VALUE IF NOT EXISTS {}",
                    quote_type(type_name)?,
                    quote_label(label)?
                );
                match position {
                    Some(AddPosition::Before(anchor)) => {
                        let _ = write!(sql, " BEFORE {}", quote_label(anchor)?);
                    }
                    Some(AddPosition::After(anchor)) => {
                        let _ = write!(sql, " AFTER {}", quote_label(anchor)?);
                    }
                    None => {}
                }
                Ok(sql)
            }
            Statement::RenameValue {
                type_name,
                from,
                to,
            } => Ok(format!(
                "ALTER TYPE {} RENAME VALUE {} TO {}",
                quote_type(type_name)?,
                quote_label(from)?,
                quote_label(to)?
            )),
            Statement::SetSortOrder { type_name, order } => {
                let mut cases = String::new();
                for (label, key) in order {
                    let _ = write!(cases, " WHEN {} THEN {}", quote_label(label)?, key);
                }
                let regtype = quote_literal(&quote_type(type_name)?)?;
                Ok(format!(
                    "UPDATE pg_catalog.pg_enum SET enumsortorder = CASE enumlabel{} END \
                     WHERE enumtypid = {}::regtype::oid",
                    cases, regtype
                ))
            }
            Statement::RenameType {
                type_name,
                new_name,
            } => Ok(format!(
                "ALTER TYPE {} RENAME TO {}",
                quote_type(type_name)?,
                quote_ident(new_name)?
            )),
            Statement::AlterColumnType {
                table,
                column,
                type_name,
                cast,
                drop_default,
                set_default,
            } => {
                let col = quote_ident(column)?;
                let ty = quote_type(type_name)?;
                let using = match cast {
                    CastExpr::TextRoundTrip => format!("{}::text::{}", col, ty),
                    CastExpr::Direct => format!("{}::{}", col, ty),
                    CastExpr::CaseMap(mapping) => {
                        let mut case = format!("CASE {}", col);
                        for m in mapping {
                            let _ = write!(case, " WHEN {} THEN {}", m.code, quote_label(&m.label)?);
                        }
                        format!("({} END)::{}", case, ty)
                    }
                };

                let mut actions = Vec::with_capacity(3);
                if *drop_default {
                    actions.push(format!("ALTER COLUMN {} DROP DEFAULT", col));
                }
                actions.push(format!("ALTER COLUMN {} TYPE {} USING {}", col, ty, using));
                if let Some(default) = set_default {
                    actions.push(format!(
                        "ALTER COLUMN {} SET DEFAULT {}",
                        col,
                        quote_label(default)?
                    ));
                }

                Ok(format!(
                    "ALTER TABLE {} {}",
                    quote_table(table)?,
                    actions.join(", ")
                ))
            }
            Statement::DropType { type_name } => {
                Ok(format!("DROP TYPE {}", quote_type(type_name)?))
            }
        }
    }

    /// Type this statement changes.
    pub fn type_name(&self) -> &TypeName {
        match self {
            Statement::CreateType { type_name, .. }
            | Statement::AddValue { type_name, .. }
            | Statement::RenameValue { type_name, .. }
            | Statement::SetSortOrder { type_name, .. }
            | Statement::RenameType { type_name, .. }
            | Statement::AlterColumnType { type_name, .. }
            | Statement::DropType { type_name } => type_name,
        }
    }

    /// `ADD VALUE` cannot run inside a transaction block before PostgreSQL 12,
    /// and the new label is unusable until the transaction commits.
    pub fn is_transaction_sensitive(&self) -> bool {
        matches!(self, Statement::AddValue { .. })
    }
}

/// Read-only introspection queries. Every output column is cast to
/// `text`, `float8` or `bool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// One row: `exists`
    TypeExists { type_name: TypeName },
    /// Rows: `label`, `sort_order`, in sort order
    EnumLabels { type_name: TypeName },
    /// Rows: `table_schema`, `table_name`, `column_name`, `column_default`
    DependentColumns { type_name: TypeName },
    /// One row: `in_use`
    LabelInUse { column: ColumnRef, label: String },
    /// Zero or one row: `table_schema`, `data_type`, `udt_schema`, `udt_name`, `column_default`
    ColumnInfo { table: TableName, column: String },
    /// One row: `value`, the smallest non-NULL stored value whose text form
    /// is not in `allowed`, or NULL when every row fits
    UnexpectedValue { column: ColumnRef, allowed: Vec<String> },
    /// Rows: `value`, each distinct non-NULL stored value as text
    DistinctValues { column: ColumnRef },
}

impl CatalogQuery {
    pub fn to_sql(&self) -> Result<String, QuoteError> {
        match self {
            CatalogQuery::TypeExists { type_name } => Ok(format!(
                "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_type t \
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
                 WHERE n.nspname = {} AND t.typname = {} AND t.typtype = 'e') AS \"exists\"",
                quote_literal(type_name.schema())?,
                quote_literal(type_name.name())?
            )),
            CatalogQuery::EnumLabels { type_name } => Ok(format!(
                "SELECT e.enumlabel::text AS label, e.enumsortorder::float8 AS sort_order \
                 FROM pg_catalog.pg_enum e \
                 JOIN pg_catalog.pg_type t ON t.oid = e.enumtypid \
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
                 WHERE n.nspname = {} AND t.typname = {} \
                 ORDER BY e.enumsortorder",
                quote_literal(type_name.schema())?,
                quote_literal(type_name.name())?
            )),
            CatalogQuery::DependentColumns { type_name } => Ok(format!(
                "SELECT c.table_schema::text AS table_schema, c.table_name::text AS table_name, \
                 c.column_name::text AS column_name, c.column_default::text AS column_default \
                 FROM information_schema.columns c \
                 WHERE c.udt_schema = {} AND c.udt_name = {} \
                 ORDER BY c.table_schema, c.table_name, c.ordinal_position",
                quote_literal(type_name.schema())?,
                quote_literal(type_name.name())?
            )),
            CatalogQuery::LabelInUse { column, label } => Ok(format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE {}::text = {}) AS in_use",
                quote_table(&column.table)?,
                quote_ident(&column.column)?,
                quote_literal(label)?
            )),
            CatalogQuery::ColumnInfo { table, column } => {
                let schema_filter = match table.schema() {
                    Some(schema) => format!(" AND c.table_schema = {}", quote_literal(schema)?),
                    None => String::new(),
                };
                Ok(format!(
                    "SELECT c.table_schema::text AS table_schema, c.data_type::text AS data_type, \
                     c.udt_schema::text AS udt_schema, c.udt_name::text AS udt_name, \
                     c.column_default::text AS column_default \
                     FROM information_schema.columns c \
                     WHERE c.table_name = {} AND c.column_name = {}{} \
                     ORDER BY c.table_schema LIMIT 1",
                    quote_literal(table.name())?,
                    quote_literal(column)?,
                    schema_filter
                ))
            }
            CatalogQuery::UnexpectedValue { column, allowed } => {
                let col = quote_ident(&column.column)?;
                let mut filter = format!("{} IS NOT NULL", col);
                if !allowed.is_empty() {
                    let allowed = allowed
                        .iter()
                        .map(|v| quote_literal(v))
                        .collect::<Result<Vec<_>, _>>()?;
                    let _ = write!(filter, " AND {}::text NOT IN ({})", col, allowed.join(", "));
                }
                Ok(format!(
                    "SELECT (SELECT {}::text FROM {} WHERE {} ORDER BY 1 LIMIT 1) AS value",
                    col,
                    quote_table(&column.table)?,
                    filter
                ))
            }
            CatalogQuery::DistinctValues { column } => {
                let col = quote_ident(&column.column)?;
                Ok(format!(
                    "SELECT DISTINCT {}::text AS value FROM {} WHERE {} IS NOT NULL ORDER BY 1",
                    col,
                    quote_table(&column.table)?,
                    col
                ))
            }
        }
    }

    /// Column whose stored rows this query reads, if any.
    pub fn column(&self) -> Option<ColumnRef> {
        match self {
            CatalogQuery::LabelInUse { column, .. }
            | CatalogQuery::UnexpectedValue { column, .. }
            | CatalogQuery::DistinctValues { column } => Some(column.clone()),
            CatalogQuery::ColumnInfo { table, column } => {
                Some(ColumnRef::new(table.clone(), column.clone()))
            }
            CatalogQuery::TypeExists { .. }
            | CatalogQuery::EnumLabels { .. }
            | CatalogQuery::DependentColumns { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::validate_read_only;

    fn color() -> TypeName {
        TypeName::public("color")
    }

    #[test]
    fn test_create_type() {
        let sql = Statement::CreateType {
            type_name: TypeName::new("cmyk", "color"),
            labels: vec!["red".into(), "it's".into()],
        }
        .to_sql()
        .unwrap();
        assert_eq!(sql, "CREATE TYPE \"cmyk\".\"color\" AS ENUM ('red', 'it''s')");
    }

    #[test]
    fn test_add_value_positions() {
        let add = |position| Statement::AddValue {
            type_name: color(),
            label: "purple".into(),
            position,
        };

        assert_eq!(
            add(None).to_sql().unwrap(),
            "ALTER TYPE \"public\".\"color\" ADD VALUE IF NOT EXISTS 'purple'"
        );
        assert_eq!(
            add(Some(AddPosition::After("red".into()))).to_sql().unwrap(),
            "ALTER TYPE \"public\".\"color\" ADD VALUE IF NOT EXISTS 'purple' AFTER 'red'"
        );
        assert_eq!(
            add(Some(AddPosition::Before("red".into()))).to_sql().unwrap(),
            "ALTER TYPE \"public\".\"color\" ADD VALUE IF NOT EXISTS 'purple' BEFORE 'red'"
        );
        assert!(add(None).is_transaction_sensitive());
    }

    #[test]
    fn test_rename_value() {
        let sql = Statement::RenameValue {
            type_name: color(),
            from: "white".into(),
            to: "pale".into(),
        }
        .to_sql()
        .unwrap();
        assert_eq!(
            sql,
            "ALTER TYPE \"public\".\"color\" RENAME VALUE 'white' TO 'pale'"
        );
    }

    #[test]
    fn test_set_sort_order() {
        let sql = Statement::SetSortOrder {
            type_name: color(),
            order: vec![("green".into(), 5.0), ("red".into(), 6.0)],
        }
        .to_sql()
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE pg_catalog.pg_enum SET enumsortorder = CASE enumlabel WHEN 'green' THEN 5 \
             WHEN 'red' THEN 6 END WHERE enumtypid = '\"public\".\"color\"'::regtype::oid"
        );
    }

    #[test]
    fn test_alter_column_int_codes() {
        let sql = Statement::AlterColumnType {
            table: TableName::qualified("public", "users"),
            column: "partner_type".into(),
            type_name: TypeName::public("user_partner_type_enum"),
            cast: CastExpr::CaseMap(vec![
                CodeMapping::new("retail", 0),
                CodeMapping::new("affiliate", 1),
            ]),
            drop_default: true,
            set_default: Some("retail".into()),
        }
        .to_sql()
        .unwrap();

        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"users\" ALTER COLUMN \"partner_type\" DROP DEFAULT, \
             ALTER COLUMN \"partner_type\" TYPE \"public\".\"user_partner_type_enum\" \
             USING (CASE \"partner_type\" WHEN 0 THEN 'retail' WHEN 1 THEN 'affiliate' END)::\"public\".\"user_partner_type_enum\", \
             ALTER COLUMN \"partner_type\" SET DEFAULT 'retail'"
        );
    }

    #[test]
    fn test_alter_column_text_round_trip() {
        let sql = Statement::AlterColumnType {
            table: TableName::qualified("public", "products"),
            column: "color".into(),
            type_name: color(),
            cast: CastExpr::TextRoundTrip,
            drop_default: false,
            set_default: None,
        }
        .to_sql()
        .unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"products\" ALTER COLUMN \"color\" TYPE \"public\".\"color\" \
             USING \"color\"::text::\"public\".\"color\""
        );
    }

    #[test]
    fn test_hostile_input_is_quoted() {
        let sql = Statement::DropType {
            type_name: TypeName::public("x\"; DROP TABLE users; --"),
        }
        .to_sql()
        .unwrap();
        assert_eq!(sql, "DROP TYPE \"public\".\"x\"\"; DROP TABLE users; --\"");

        let err = Statement::CreateType {
            type_name: color(),
            labels: vec![String::new()],
        }
        .to_sql();
        assert!(err.is_err());
    }

    #[test]
    fn test_catalog_queries_are_read_only() {
        let queries = [
            CatalogQuery::TypeExists { type_name: color() },
            CatalogQuery::EnumLabels { type_name: color() },
            CatalogQuery::DependentColumns { type_name: color() },
            CatalogQuery::LabelInUse {
                column: ColumnRef::new(TableName::qualified("public", "update"), "delete"),
                label: "drop'; DELETE FROM x; --".into(),
            },
            CatalogQuery::ColumnInfo {
                table: TableName::new("products"),
                column: "color".into(),
            },
            CatalogQuery::ColumnInfo {
                table: TableName::qualified("shop", "products"),
                column: "color".into(),
            },
            CatalogQuery::UnexpectedValue {
                column: ColumnRef::new(TableName::qualified("public", "users"), "kind"),
                allowed: vec!["0".into(), "x'); DROP TABLE users; --".into()],
            },
            CatalogQuery::DistinctValues {
                column: ColumnRef::new(TableName::qualified("public", "users"), "kind"),
            },
        ];

        for query in &queries {
            let sql = query.to_sql().unwrap();
            assert!(validate_read_only(&sql).is_ok(), "{}", sql);
        }
    }

    #[test]
    fn test_unexpected_value_query() {
        let column = ColumnRef::new(TableName::qualified("public", "users"), "partner_type");
        let sql = CatalogQuery::UnexpectedValue {
            column: column.clone(),
            allowed: vec!["0".into(), "1".into()],
        }
        .to_sql()
        .unwrap();
        assert_eq!(
            sql,
            "SELECT (SELECT \"partner_type\"::text FROM \"public\".\"users\" \
             WHERE \"partner_type\" IS NOT NULL AND \"partner_type\"::text NOT IN ('0', '1') \
             ORDER BY 1 LIMIT 1) AS value"
        );

        let sql = CatalogQuery::UnexpectedValue {
            column,
            allowed: Vec::new(),
        }
        .to_sql()
        .unwrap();
        assert!(sql.contains("WHERE \"partner_type\" IS NOT NULL ORDER BY 1"));
    }
}
