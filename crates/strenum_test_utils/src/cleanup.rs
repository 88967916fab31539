//! Schema-per-test isolation.

use anyhow::{Context, Result};
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use strenum_db::{quote_ident, PgExecutor, TableName, TypeName};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};
use uuid::Uuid;

/// RAII guard for PostgreSQL test isolation.
///
/// Creates a uniquely named schema on construction and drops it (with
/// everything in it) on Drop. Fixture SQL runs over the guard's own
/// connection; code under test connects separately via [`Self::executor`].
///
/// ```rust,ignore
/// let guard = PostgresTestGuard::new(&TestDbConfig::database_url()).unwrap();
/// guard.execute("CREATE TABLE products (id INT)").unwrap();
/// let mut migrator = EnumMigrator::new(guard.executor().unwrap());
/// migrator.create_enum(&guard.type_name("color"), ["red"]).unwrap();
/// ```
pub struct PostgresTestGuard {
    runtime: Runtime,
    conn: Option<PgConnection>,
    url: String,
    schema_name: String,
}

impl PostgresTestGuard {
    pub fn new(url: &str) -> Result<Self> {
        let schema_name = format!("test_{}", Uuid::new_v4().simple());
        Self::with_name(url, &schema_name)
    }

    /// Use a predictable schema name (created if missing).
    pub fn with_name(url: &str, schema_name: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build test runtime")?;
        let conn = runtime
            .block_on(PgConnection::connect(url))
            .with_context(|| format!("Failed to connect to test database at {}", url))?;

        let mut guard = Self {
            runtime,
            conn: Some(conn),
            url: url.to_string(),
            schema_name: schema_name.to_string(),
        };
        debug!("Creating test schema: {}", schema_name);
        guard.execute(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(schema_name)?
        ))?;
        Ok(guard)
    }

    /// Run fixture SQL (simple protocol, may hold several statements).
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        let conn = self
            .conn
            .as_mut()
            .context("Test connection already closed")?;
        self.runtime
            .block_on(sqlx::raw_sql(sql).execute(conn))
            .with_context(|| format!("Fixture SQL failed: {}", sql))?;
        Ok(())
    }

    /// First column of every row, as text.
    pub fn fetch_column(&mut self, sql: &str) -> Result<Vec<Option<String>>> {
        let conn = self
            .conn
            .as_mut()
            .context("Test connection already closed")?;
        let rows = self
            .runtime
            .block_on(sqlx::query(sql).fetch_all(conn))
            .with_context(|| format!("Fixture query failed: {}", sql))?;
        rows.iter()
            .map(|row| row.try_get::<Option<String>, _>(0).map_err(Into::into))
            .collect()
    }

    /// A fresh executor on its own connection.
    pub fn executor(&self) -> Result<PgExecutor> {
        PgExecutor::connect(&self.url).context("Failed to connect executor")
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Type name inside the test schema.
    pub fn type_name(&self, name: &str) -> TypeName {
        TypeName::new(self.schema_name.clone(), name)
    }

    /// Table name inside the test schema.
    pub fn table(&self, name: &str) -> TableName {
        TableName::qualified(self.schema_name.clone(), name)
    }

    /// Drop the schema now instead of on Drop.
    pub fn cleanup(&mut self) -> Result<()> {
        debug!("Dropping test schema: {}", self.schema_name);
        let sql = format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(&self.schema_name)?);
        self.execute(&sql)?;
        if let Some(conn) = self.conn.take() {
            self.runtime.block_on(conn.close())?;
        }
        Ok(())
    }
}

impl Drop for PostgresTestGuard {
    fn drop(&mut self) {
        if self.conn.is_none() {
            return;
        }
        if let Err(e) = self.cleanup() {
            warn!("Failed to drop test schema {}: {:#}", self.schema_name, e);
        }
    }
}
