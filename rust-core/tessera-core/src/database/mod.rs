//! # Database Module
//!
//! Async database connectivity with SQLx for PostgreSQL and SQLite, plus the
//! statement layer built on it.
//!
//! - [`Adapter`] is the quoting capability a [`Statement`] needs; the pool
//!   implements it per dialect and [`StandardQuoter`] implements it with no
//!   connection at all.
//! - [`DatabasePool::execute_statement`] binds natively;
//!   [`DatabasePool::execute_statement_emulated`] runs the spliced SQL for
//!   callers that need the literal text.

pub mod adapter;
pub mod select;
pub mod statement;

pub use adapter::{Adapter, BindSupport, StandardQuoter};
pub use select::{Select, SqlSource};
pub use statement::{BindParameter, ColumnRef, FetchMode, FetchedRow, Slot, Statement};

use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo};
use std::collections::HashMap;
use tracing::debug;

/// Default pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connection pool for one backend
#[derive(Clone)]
pub enum Backend {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(_) => f.write_str("Backend::Sqlite"),
            Self::Postgres(_) => f.write_str("Backend::Postgres"),
        }
    }
}

/// Database connection pool supporting multiple backends
///
/// Statements prepared from the pool start in its default fetch mode.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    backend: Backend,
    fetch_mode: FetchMode,
}

impl DatabasePool {
    /// Wrap a backend pool with the default fetch mode
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            fetch_mode: FetchMode::default(),
        }
    }

    /// Set the fetch mode statements prepared from this pool start with
    ///
    /// # Errors
    ///
    /// `Error::InvalidFetchMode` for `FetchMode::Column`, which is only
    /// valid per fetch call.
    pub fn with_fetch_mode(mut self, mode: FetchMode) -> Result<Self> {
        if mode == FetchMode::Column {
            return Err(Error::InvalidFetchMode {
                mode: "column".to_string(),
            });
        }
        self.fetch_mode = mode;
        Ok(self)
    }

    /// Default fetch mode for prepared statements
    #[must_use]
    pub const fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Underlying backend pool
    #[must_use]
    pub const fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Connect to whichever backend the URL scheme names
    ///
    /// # Errors
    ///
    /// `Error::Database` for an unknown scheme or a failed connection.
    pub async fn connect(url: &str, max_connections: Option<u32>) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Self::connect_sqlite(url, max_connections).await
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::connect_postgres(url, max_connections).await
        } else {
            Err(Error::Database {
                message: format!("Unsupported database URL: {url}"),
            })
        }
    }

    /// Connect to a SQLite database
    ///
    /// # Arguments
    ///
    /// * `url` - Database URL (e.g., "sqlite:mydb.db" or "sqlite::memory:")
    /// * `max_connections` - Maximum pool size (default: 10)
    ///
    /// # Errors
    ///
    /// `Error::Database` if the connection fails.
    pub async fn connect_sqlite(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool_size = max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect(url)
            .await
            .map_err(|e| Error::Database {
                message: format!("SQLite connection failed: {e}"),
            })?;

        Ok(Self::new(Backend::Sqlite(pool)))
    }

    /// Connect to a PostgreSQL database
    ///
    /// # Errors
    ///
    /// `Error::Database` if the connection fails.
    pub async fn connect_postgres(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool_size = max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(url)
            .await
            .map_err(|e| Error::Database {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        Ok(Self::new(Backend::Postgres(pool)))
    }

    /// Execute a query that doesn't return rows (INSERT, UPDATE, DELETE)
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// `Error::Database` if the query fails.
    pub async fn execute(&self, query: &str) -> Result<u64> {
        self.execute_with(query, &[]).await
    }

    /// Fetch all rows from a query, keyed by column name
    ///
    /// # Errors
    ///
    /// `Error::Database` if the query fails.
    pub async fn fetch_all(&self, query: &str) -> Result<Vec<HashMap<String, DbValue>>> {
        Ok(self.fetch_result(query, &[]).await?.into_maps())
    }

    /// Fetch a single row (optional)
    ///
    /// # Errors
    ///
    /// `Error::Database` if the query fails.
    pub async fn fetch_optional(&self, query: &str) -> Result<Option<HashMap<String, DbValue>>> {
        Ok(self.fetch_result(query, &[]).await?.into_maps().into_iter().next())
    }

    /// Fetch a single row from a query
    ///
    /// # Errors
    ///
    /// `Error::Database` if the query fails or returns no row.
    pub async fn fetch_one(&self, query: &str) -> Result<HashMap<String, DbValue>> {
        self.fetch_optional(query).await?.ok_or_else(|| Error::Database {
            message: "Query error: no rows returned".to_string(),
        })
    }

    /// Prepare a statement against this pool's dialect and fetch mode
    pub fn prepare<S: SqlSource + ?Sized>(&self, sql: &S) -> Statement<'_> {
        Statement::new(self, sql).with_default_fetch_mode(self.fetch_mode)
    }

    /// Run a statement with native parameter binding
    ///
    /// Row-returning statements load their result into the statement;
    /// others record the affected row count.
    ///
    /// # Errors
    ///
    /// `Error::InvalidBindPosition` if a placeholder is unbound,
    /// `Error::Database` if the query fails.
    pub async fn execute_statement(&self, statement: &mut Statement<'_>) -> Result<u64> {
        let (sql, values) = statement.native_sql()?;
        self.run_statement(statement, &sql, &values).await
    }

    /// Run a statement with its values spliced in as quoted literals
    ///
    /// # Errors
    ///
    /// `Error::Database` if the query fails.
    pub async fn execute_statement_emulated(&self, statement: &mut Statement<'_>) -> Result<u64> {
        let sql = statement.assemble_sql();
        self.run_statement(statement, &sql, &[]).await
    }

    async fn run_statement(
        &self,
        statement: &mut Statement<'_>,
        sql: &str,
        values: &[DbValue],
    ) -> Result<u64> {
        debug!(sql = %sql, params = values.len(), "Executing statement");

        if returns_rows(sql) {
            let result = self.fetch_result(sql, values).await?;
            let count = result.rows.len() as u64;
            statement.load_result(result);
            Ok(count)
        } else {
            let affected = self.execute_with(sql, values).await?;
            statement.set_affected_rows(affected);
            Ok(affected)
        }
    }

    async fn execute_with(&self, sql: &str, values: &[DbValue]) -> Result<u64> {
        let result = match &self.backend {
            Backend::Sqlite(pool) => bind_sqlite(sqlx::query(sql), values)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Postgres(pool) => bind_postgres(sqlx::query(sql), values)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        result.map_err(query_error)
    }

    async fn fetch_result(&self, sql: &str, values: &[DbValue]) -> Result<ResultSet> {
        match &self.backend {
            Backend::Sqlite(pool) => {
                let rows: Vec<SqliteRow> = bind_sqlite(sqlx::query(sql), values)
                    .fetch_all(pool)
                    .await
                    .map_err(query_error)?;
                Ok(ResultSet::from_rows(&rows, sqlite_row_values))
            }
            Backend::Postgres(pool) => {
                let rows: Vec<PgRow> = bind_postgres(sqlx::query(sql), values)
                    .fetch_all(pool)
                    .await
                    .map_err(query_error)?;
                Ok(ResultSet::from_rows(&rows, pg_row_values))
            }
        }
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        match &self.backend {
            Backend::Sqlite(pool) => pool.close().await,
            Backend::Postgres(pool) => pool.close().await,
        }
    }
}

impl Adapter for DatabasePool {
    fn quote(&self, value: &DbValue) -> String {
        match self.backend {
            Backend::Sqlite(_) => adapter::quote_standard(value),
            Backend::Postgres(_) => adapter::quote_postgres(value),
        }
    }

    fn placeholder(&self, position: usize) -> String {
        match self.backend {
            Backend::Sqlite(_) => "?".to_string(),
            Backend::Postgres(_) => format!("${position}"),
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn query_error(e: sqlx::Error) -> Error {
    Error::Database {
        message: format!("Query error: {e}"),
    }
}

/// Whether a statement produces a result set
fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    ["SELECT", "WITH", "PRAGMA", "VALUES", "SHOW", "EXPLAIN"]
        .iter()
        .any(|kw| upper.starts_with(kw))
        || upper.contains(" RETURNING ")
}

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &'q [DbValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Int(i) => query.bind(*i),
            DbValue::Float(f) => query.bind(*f),
            DbValue::String(s) => query.bind(s.as_str()),
            DbValue::Bool(b) => query.bind(*b),
            DbValue::Bytes(b) => query.bind(b.as_slice()),
        };
    }
    query
}

fn bind_postgres<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: &'q [DbValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Int(i) => query.bind(*i),
            DbValue::Float(f) => query.bind(*f),
            DbValue::String(s) => query.bind(s.as_str()),
            DbValue::Bool(b) => query.bind(*b),
            DbValue::Bytes(b) => query.bind(b.as_slice()),
        };
    }
    query
}

/// Database value types
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// Null value
    #[default]
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// Binary data
    Bytes(Vec<u8>),
}

impl DbValue {
    /// Whether the value is SQL NULL
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for DbValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for DbValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for DbValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for DbValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for DbValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for DbValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Rows of a query with their column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Row values, each in column order
    pub rows: Vec<Vec<DbValue>>,
}

impl ResultSet {
    fn from_rows<T: Row>(rows: &[T], values: fn(&T) -> Vec<DbValue>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        Self {
            columns,
            rows: rows.iter().map(values).collect(),
        }
    }

    /// Rows keyed by column name
    #[must_use]
    pub fn into_maps(self) -> Vec<HashMap<String, DbValue>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// Convert a SQLite row to values in column order
fn sqlite_row_values(row: &SqliteRow) -> Vec<DbValue> {
    (0..row.columns().len())
        .map(|i| {
            let type_name = row.columns()[i].type_info().name();
            match type_name {
                "INTEGER" | "INT" | "BIGINT" => row.try_get::<i64, _>(i).map(DbValue::Int),
                "REAL" | "FLOAT" | "DOUBLE" => row.try_get::<f64, _>(i).map(DbValue::Float),
                "BOOLEAN" => row.try_get::<bool, _>(i).map(DbValue::Bool),
                "TEXT" => row.try_get::<String, _>(i).map(DbValue::String),
                "BLOB" => row.try_get::<Vec<u8>, _>(i).map(DbValue::Bytes),
                _ => row
                    .try_get::<i64, _>(i)
                    .map(DbValue::Int)
                    .or_else(|_| row.try_get::<f64, _>(i).map(DbValue::Float))
                    .or_else(|_| row.try_get::<String, _>(i).map(DbValue::String)),
            }
            .unwrap_or(DbValue::Null)
        })
        .collect()
}

/// Convert a PostgreSQL row to values in column order
fn pg_row_values(row: &PgRow) -> Vec<DbValue> {
    (0..row.columns().len())
        .map(|i| {
            let type_name = row.columns()[i].type_info().name();
            match type_name {
                "INT2" => row.try_get::<i16, _>(i).map(|v| DbValue::Int(v.into())),
                "INT4" => row.try_get::<i32, _>(i).map(|v| DbValue::Int(v.into())),
                "INT8" => row.try_get::<i64, _>(i).map(DbValue::Int),
                "FLOAT4" => row.try_get::<f32, _>(i).map(|v| DbValue::Float(v.into())),
                "FLOAT8" => row.try_get::<f64, _>(i).map(DbValue::Float),
                "BOOL" => row.try_get::<bool, _>(i).map(DbValue::Bool),
                "BYTEA" => row.try_get::<Vec<u8>, _>(i).map(DbValue::Bytes),
                _ => row.try_get::<String, _>(i).map(DbValue::String),
            }
            .unwrap_or(DbValue::Null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> DatabasePool {
        DatabasePool::connect_sqlite("sqlite::memory:", Some(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_memory_connection() {
        let pool = DatabasePool::connect("sqlite::memory:", None).await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let err = DatabasePool::connect("mysql://localhost/db", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database { .. }));
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_fetch() {
        let pool = memory_pool().await;

        pool.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
        pool.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')")
            .await
            .unwrap();
        pool.execute("INSERT INTO users (id, name) VALUES (2, 'Bob')")
            .await
            .unwrap();

        let rows = pool.fetch_all("SELECT * FROM users").await.unwrap();
        assert_eq!(rows.len(), 2);

        let row = pool
            .fetch_one("SELECT * FROM users WHERE id = 2")
            .await
            .unwrap();
        assert_eq!(row.get("name"), Some(&DbValue::from("Bob")));

        let none = pool
            .fetch_optional("SELECT * FROM users WHERE id = 9")
            .await
            .unwrap();
        assert!(none.is_none());
        assert!(pool.fetch_one("SELECT * FROM users WHERE id = 9").await.is_err());
    }

    #[tokio::test]
    async fn test_statement_native_binding() {
        let pool = memory_pool().await;
        pool.execute("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, draft BOOLEAN)")
            .await
            .unwrap();

        let mut insert = pool.prepare("INSERT INTO posts (id, title, draft) VALUES (:id, :title, ?)");
        insert.bind_value("id", 1).unwrap();
        insert.bind_value("title", "It's live").unwrap();
        insert.bind_value(3, false).unwrap();
        assert_eq!(pool.execute_statement(&mut insert).await.unwrap(), 1);
        assert_eq!(insert.row_count(), 1);

        let mut select = pool.prepare(&Select::new().from("posts", &["id", "title"]).and_where("id = ?"));
        select.bind_value(1, 1).unwrap();
        pool.execute_statement(&mut select).await.unwrap();

        assert_eq!(select.column_count(), 2);
        let row = select.fetch(None).unwrap().unwrap();
        assert_eq!(row.get("title"), Some(&DbValue::from("It's live")));
        assert!(select.fetch(None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prepare_uses_pool_fetch_mode() {
        let pool = memory_pool().await.with_fetch_mode(FetchMode::Num).unwrap();
        assert_eq!(pool.fetch_mode(), FetchMode::Num);
        pool.execute("CREATE TABLE nums (n INTEGER)").await.unwrap();
        pool.execute("INSERT INTO nums (n) VALUES (7)").await.unwrap();

        let mut stmt = pool.prepare("SELECT n FROM nums");
        assert_eq!(stmt.fetch_mode(), FetchMode::Num);
        pool.execute_statement(&mut stmt).await.unwrap();
        assert_eq!(
            stmt.fetch(None).unwrap(),
            Some(FetchedRow::Num(vec![DbValue::Int(7)]))
        );

        assert!(matches!(
            pool.clone().with_fetch_mode(FetchMode::Column),
            Err(Error::InvalidFetchMode { .. })
        ));
    }

    #[tokio::test]
    async fn test_statement_emulated_splice() {
        let pool = memory_pool().await;
        pool.execute("CREATE TABLE tags (name TEXT)").await.unwrap();

        let name = Slot::new("first");
        let mut insert = pool.prepare("INSERT INTO tags (name) VALUES (?)");
        insert.bind_slot(1, &name).unwrap();
        pool.execute_statement_emulated(&mut insert).await.unwrap();
        name.set("O'Neil");
        assert_eq!(insert.assemble_sql(), "INSERT INTO tags (name) VALUES ('O''Neil')");
        pool.execute_statement_emulated(&mut insert).await.unwrap();

        let mut select = pool.prepare("SELECT name FROM tags ORDER BY rowid");
        pool.execute_statement(&mut select).await.unwrap();
        let names = select.fetch_all(Some(FetchMode::Column), None).unwrap();
        assert_eq!(
            names,
            vec![
                FetchedRow::Column(DbValue::from("first")),
                FetchedRow::Column(DbValue::from("O'Neil")),
            ]
        );
    }

    #[tokio::test]
    async fn test_unbound_placeholder_rejected() {
        let pool = memory_pool().await;
        let mut stmt = pool.prepare("SELECT :a");
        let err = pool.execute_statement(&mut stmt).await.unwrap_err();
        assert!(matches!(err, Error::InvalidBindPosition { .. }));
    }

    #[test]
    fn test_sqlite_dialect_hooks() {
        tokio_test::block_on(async {
            let pool = memory_pool().await;
            assert_eq!(pool.placeholder(3), "?");
            assert_eq!(pool.quote(&DbValue::Bool(true)), "1");
            pool.close().await;
        });
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(returns_rows("DELETE FROM t WHERE id = 1 RETURNING id"));
        assert!(!returns_rows("UPDATE t SET a = 1"));
    }

    #[test]
    fn test_result_set_into_maps() {
        let result = ResultSet {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec![DbValue::Int(1), DbValue::Null]],
        };
        let maps = result.into_maps();
        assert_eq!(maps[0].get("a"), Some(&DbValue::Int(1)));
        assert!(maps[0].get("b").is_some_and(DbValue::is_null));
    }

    #[test]
    fn test_db_value_conversions() {
        assert_eq!(DbValue::from(Some(3)), DbValue::Int(3));
        assert_eq!(DbValue::from(None::<&str>), DbValue::Null);
        assert_eq!(DbValue::from(vec![1u8]), DbValue::Bytes(vec![1]));
        assert_eq!(crate::json::to_json(&DbValue::from("x")).unwrap(), "\"x\"");
    }
}
