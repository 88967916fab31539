//! PostgreSQL executor over sqlx.
//!
//! The migration engine is synchronous; this executor owns a current-thread
//! tokio runtime and blocks on one connection. Statements go out through the
//! simple query protocol so DDL such as `ALTER TYPE ... ADD VALUE` is never
//! prepared.

use crate::backend::{hash_sql, sql_op_name, BackendError, DbRow, DbValue, SqlExecutor};
use crate::sql::validate_read_only;
use crate::statement::{CatalogQuery, Statement};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};
use std::time::Instant;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug_span, info};

/// Blocking PostgreSQL connection.
pub struct PgExecutor {
    runtime: Runtime,
    conn: Option<PgConnection>,
}

impl std::fmt::Debug for PgExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgExecutor")
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

impl PgExecutor {
    /// Connect to `postgres://...`.
    pub fn connect(url: &str) -> Result<Self, BackendError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let conn = runtime.block_on(PgConnection::connect(url))?;
        info!("Connected to PostgreSQL");
        Ok(Self {
            runtime,
            conn: Some(conn),
        })
    }

    /// Close the connection gracefully.
    pub fn close(mut self) -> Result<(), BackendError> {
        if let Some(conn) = self.conn.take() {
            self.runtime.block_on(conn.close())?;
        }
        Ok(())
    }

    fn parts(&mut self) -> Result<(&Runtime, &mut PgConnection), BackendError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| BackendError::NotAvailable("connection is closed".to_string()))?;
        Ok((&self.runtime, conn))
    }
}

impl SqlExecutor for PgExecutor {
    fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        let sql = statement.to_sql()?;
        let span = debug_span!(
            "db.exec",
            op = sql_op_name(&sql),
            sql_hash = %hash_sql(&sql),
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let (runtime, conn) = self.parts()?;
        let result = runtime.block_on(sqlx::raw_sql(&sql).execute(conn))?;
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(result.rows_affected())
    }

    fn query_rows(&mut self, query: &CatalogQuery) -> Result<Vec<DbRow>, BackendError> {
        let sql = query.to_sql()?;
        validate_read_only(&sql).map_err(|e| BackendError::Query(e.to_string()))?;
        let span = debug_span!(
            "db.query",
            op = sql_op_name(&sql),
            sql_hash = %hash_sql(&sql),
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let (runtime, conn) = self.parts()?;
        let rows = runtime.block_on(sqlx::raw_sql(&sql).fetch_all(conn))?;
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        rows.iter().map(decode_row).collect()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn decode_row(row: &PgRow) -> Result<DbRow, BackendError> {
    let mut names = Vec::with_capacity(row.columns().len());
    let mut values = Vec::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        names.push(column.name().to_string());
        if row.try_get_raw(idx)?.is_null() {
            values.push(DbValue::Null);
            continue;
        }
        let value = match column.type_info().name() {
            "BOOL" => DbValue::Boolean(row.try_get::<bool, _>(idx)?),
            "INT2" => DbValue::Integer(row.try_get::<i16, _>(idx)? as i64),
            "INT4" => DbValue::Integer(row.try_get::<i32, _>(idx)? as i64),
            "INT8" => DbValue::Integer(row.try_get::<i64, _>(idx)?),
            "FLOAT4" => DbValue::Real(row.try_get::<f32, _>(idx)? as f64),
            "FLOAT8" => DbValue::Real(row.try_get::<f64, _>(idx)?),
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => DbValue::Text(row.try_get::<String, _>(idx)?),
            other => {
                return Err(BackendError::TypeConversion(format!(
                    "Unsupported column type {} for column '{}'",
                    other,
                    column.name()
                )))
            }
        };
        values.push(value);
    }

    Ok(DbRow::new(names, values))
}
