//! Database driver abstraction trait
//!
//! Defines the interface that all database backends must implement.

use crate::db::{QueryResult, TableColumn, Value};
use crate::error::{DbError, Result};
use async_trait::async_trait;
use std::str::FromStr;

/// Which database backend is in use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    MySql,
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackend::Sqlite => write!(f, "SQLite"),
            DatabaseBackend::MySql => write!(f, "MySQL"),
        }
    }
}

impl Default for DatabaseBackend {
    fn default() -> Self {
        DatabaseBackend::Sqlite
    }
}

impl FromStr for DatabaseBackend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DatabaseBackend::Sqlite),
            "mysql" => Ok(DatabaseBackend::MySql),
            other => Err(DbError::InvalidConfig(format!("unknown backend '{}'", other))),
        }
    }
}

/// Trait that all database drivers must implement.
///
/// All methods are async because the manager lives in a tokio runtime.
/// Synchronous drivers (like rusqlite) should use `spawn_blocking` for slow setup work.
/// Parameters are positional and bound to `?` placeholders in order.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Which backend this driver represents
    fn backend(&self) -> DatabaseBackend;

    /// Get the name of the current database / file
    fn database_name(&self) -> String;

    /// Test that the connection is alive
    async fn test_connection(&self) -> Result<bool>;

    /// Get a human-readable server/engine version string
    async fn get_server_version(&self) -> Result<String>;

    /// Reconnect using the same configuration
    async fn reconnect(&mut self) -> Result<()>;

    /// Release the connection. Later calls fail with `DbError::NotConnected`.
    async fn close(&self) -> Result<()>;

    /// Run one or more statements that take no parameters (DDL)
    async fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run a statement and return the number of affected rows
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run an INSERT and return the generated key
    async fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;

    /// Run a query and collect all rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// List user tables in the current database
    async fn get_tables(&self) -> Result<Vec<String>>;

    /// Get column definitions for a table
    async fn get_columns(&self, table: &str) -> Result<Vec<TableColumn>>;

    /// Delete every row and reset the auto-increment counter
    async fn truncate_table(&self, table: &str) -> Result<()>;
}
