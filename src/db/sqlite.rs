//! SQLite driver implementation using rusqlite
//!
//! Uses `spawn_blocking` to open the file off the async runtime. Statements run
//! while holding the connection lock.

use crate::db::dialect::Dialect;
use crate::db::driver::{DatabaseBackend, DatabaseDriver};
use crate::db::query::{ColumnInfo, QueryResult, Row};
use crate::db::schema::TableColumn;
use crate::db::value::Value;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use rusqlite::{params_from_iter, types::ValueRef, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// SQLite driver
pub struct SqliteDriver {
    conn: Arc<Mutex<Option<Connection>>>,
    pub path: PathBuf,
}

impl SqliteDriver {
    /// Open (or create) a SQLite database file
    pub async fn new(path: PathBuf) -> Result<Self> {
        let conn = Self::open(&path).await?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
        })
    }

    async fn open(path: &Path) -> Result<Connection> {
        let p = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || Connection::open(&p)).await??;
        Ok(conn)
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        let guard = self.conn.lock().await;
        if guard.is_none() {
            return Err(DbError::NotConnected);
        }
        Ok(guard)
    }
}

/// Run `f` against the open connection held by `guard`
fn with_conn<T>(
    guard: &MutexGuard<'_, Option<Connection>>,
    f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
) -> Result<T> {
    let conn = guard.as_ref().ok_or(DbError::NotConnected)?;
    Ok(f(conn)?)
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).to_string()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<QueryResult> {
    let start = Instant::now();
    let mut stmt = conn.prepare(sql)?;
    let col_count = stmt.column_count();

    let mut columns: Vec<ColumnInfo> = stmt
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            type_name: c.decl_type().unwrap_or("").to_string(),
        })
        .collect();
    let names: Arc<[String]> = columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>().into();

    let mut rows: Vec<Row> = Vec::new();
    let mut raw_rows = stmt.query(params_from_iter(params.iter()))?;

    while let Some(row) = raw_rows.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let val = read_value(row.get_ref(i)?);
            // Expression columns have no declared type; take it from the first value
            if rows.is_empty() && columns[i].type_name.is_empty() {
                columns[i].type_name = match &val {
                    Value::Null => "NULL",
                    Value::Int(_) => "INTEGER",
                    Value::Float(_) => "REAL",
                    Value::Blob(_) => "BLOB",
                    _ => "TEXT",
                }
                .to_string();
            }
            values.push(val);
        }
        rows.push(Row::new(Arc::clone(&names), values));
    }

    Ok(QueryResult {
        row_count: rows.len(),
        columns,
        rows,
        execution_time: start.elapsed(),
        affected_rows: None,
    })
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    fn database_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "sqlite".to_string())
    }

    async fn test_connection(&self) -> Result<bool> {
        let guard = self.conn.lock().await;
        Ok(guard
            .as_ref()
            .map(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok())
            .unwrap_or(false))
    }

    async fn get_server_version(&self) -> Result<String> {
        let guard = self.lock().await?;
        let version: String =
            with_conn(&guard, |c| c.query_row("SELECT sqlite_version()", [], |row| row.get(0)))?;
        Ok(format!("SQLite {}", version))
    }

    async fn reconnect(&mut self) -> Result<()> {
        let conn = Self::open(&self.path).await?;
        *self.conn.lock().await = Some(conn);
        info!("Reopened SQLite database: {}", self.path.display());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
        }
        Ok(())
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!(sql, "sqlite execute_batch");
        let guard = self.lock().await?;
        with_conn(&guard, |c| c.execute_batch(sql))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql, params = params.len(), "sqlite execute");
        let guard = self.lock().await?;
        let affected = with_conn(&guard, |c| c.execute(sql, params_from_iter(params.iter())))?;
        Ok(affected as u64)
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        debug!(sql, params = params.len(), "sqlite insert");
        let guard = self.lock().await?;
        with_conn(&guard, |c| {
            c.execute(sql, params_from_iter(params.iter()))?;
            Ok(c.last_insert_rowid())
        })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        debug!(sql, params = params.len(), "sqlite query");
        let guard = self.lock().await?;
        with_conn(&guard, |c| run_query(c, sql, params))
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let guard = self.lock().await?;
        let found: Option<String> = with_conn(&guard, |c| {
            c.query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name = ?1 COLLATE NOCASE",
                [table],
                |row| row.get(0),
            )
            .optional()
        })?;
        Ok(found.is_some())
    }

    async fn get_tables(&self) -> Result<Vec<String>> {
        let guard = self.lock().await?;
        with_conn(&guard, |c| {
            let mut stmt = c.prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let mut tables = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                tables.push(row.get(0)?);
            }
            Ok(tables)
        })
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<TableColumn>> {
        let query = format!(
            "PRAGMA table_info({})",
            Dialect::new(DatabaseBackend::Sqlite).quote_identifier(table)?
        );
        let guard = self.lock().await?;
        with_conn(&guard, |c| {
            let mut stmt = c.prepare(&query)?;
            let mut columns = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let not_null: bool = row.get(3)?;
                let pk: i32 = row.get(5)?;
                columns.push(TableColumn {
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    is_nullable: !not_null,
                    is_primary_key: pk > 0,
                });
            }
            Ok(columns)
        })
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        let statements = Dialect::new(DatabaseBackend::Sqlite).truncate_statements(table)?;
        let guard = self.lock().await?;
        with_conn(&guard, |c| {
            let mut statements = statements.iter();
            if let Some(delete) = statements.next() {
                c.execute_batch(delete)?;
            }
            let has_sequence: Option<String> = c
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name='sqlite_sequence'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            if has_sequence.is_some() {
                for stmt in statements {
                    c.execute_batch(stmt)?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, SqliteDriver) {
        let dir = tempfile::tempdir().unwrap();
        let driver = SqliteDriver::new(dir.path().join("test.db")).await.unwrap();
        (dir, driver)
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let (_dir, driver) = open_temp().await;
        driver
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, score REAL, ok BOOLEAN)")
            .await
            .unwrap();

        let id = driver
            .insert(
                "INSERT INTO t (name, score, ok) VALUES (?, ?, ?)",
                &[Value::from("a"), Value::from(1.5), Value::from(true)],
            )
            .await
            .unwrap();
        assert_eq!(id, 1);

        let result = driver.query("SELECT * FROM t WHERE id = ?", &[Value::Int(id)]).await.unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.columns[1].type_name, "TEXT");
        let row = result.first().unwrap();
        assert_eq!(row.get_string("name"), "a");
        assert_eq!(row.get_double("score"), 1.5);
        assert!(row.get_bool("ok"));

        let empty = driver.query("SELECT * FROM t WHERE id = ?", &[Value::Int(-1)]).await.unwrap();
        assert_eq!(empty.row_count, 0);
        assert_eq!(empty.columns.len(), 4);
    }

    #[tokio::test]
    async fn test_schema_introspection() {
        let (_dir, driver) = open_temp().await;
        driver
            .execute_batch("CREATE TABLE b (id INTEGER PRIMARY KEY, v TEXT NOT NULL); CREATE TABLE a (x INT)")
            .await
            .unwrap();

        assert_eq!(driver.get_tables().await.unwrap(), vec!["a", "b"]);
        assert!(driver.table_exists("b").await.unwrap());
        assert!(!driver.table_exists("c").await.unwrap());
        // table names are case-insensitive in SQLite
        assert!(driver.table_exists("B").await.unwrap());

        let cols = driver.get_columns("b").await.unwrap();
        assert_eq!(cols.len(), 2);
        assert!(cols[0].is_primary_key);
        assert!(!cols[1].is_nullable);
    }

    #[tokio::test]
    async fn test_truncate_without_sequence_table() {
        let (_dir, driver) = open_temp().await;
        driver.execute_batch("CREATE TABLE plain (v INT)").await.unwrap();
        driver.execute("INSERT INTO plain (v) VALUES (?)", &[Value::Int(1)]).await.unwrap();
        driver.truncate_table("plain").await.unwrap();
        let count = driver.query("SELECT COUNT(*) FROM plain", &[]).await.unwrap();
        assert_eq!(count.first().unwrap().get_long("COUNT(*)"), 0);
    }

    #[tokio::test]
    async fn test_close_then_reconnect() {
        let (_dir, mut driver) = open_temp().await;
        driver.close().await.unwrap();
        assert!(!driver.test_connection().await.unwrap());
        assert!(matches!(driver.execute_batch("SELECT 1").await, Err(DbError::NotConnected)));

        driver.reconnect().await.unwrap();
        assert!(driver.test_connection().await.unwrap());
        assert!(driver.get_server_version().await.unwrap().starts_with("SQLite"));
    }
}
