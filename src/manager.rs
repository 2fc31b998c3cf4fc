//! Database manager: one handle over either backend
//!
//! `DbManager` is cheap to clone; clones share the same connection and the schemas of
//! tables created through it. Every data operation checks the connection first and
//! reconnects once when it has dropped.

use crate::builder::{InsertBuilder, QueryBuilder, TableBuilder};
use crate::config::ConnectionConfig;
use crate::db::mysql::MySqlDriver;
use crate::db::sqlite::SqliteDriver;
use crate::db::{
    DatabaseBackend, DatabaseDriver, Dialect, QueryResult, Row, TableColumn, TableSchema, Value,
};
use crate::error::{DbError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

struct Inner {
    config: ConnectionConfig,
    driver: RwLock<Option<Box<dyn DatabaseDriver>>>,
    schemas: RwLock<HashMap<String, TableSchema>>,
}

#[derive(Clone)]
pub struct DbManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbManager")
            .field("backend", &self.inner.config.backend)
            .field("database", &self.inner.config.database)
            .finish()
    }
}

impl DbManager {
    /// Create a manager; nothing is opened until `connect`
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                driver: RwLock::new(None),
                schemas: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Manager for a local SQLite file
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(ConnectionConfig::sqlite(path))
    }

    /// Manager for a MySQL database; the database is created on connect when missing
    pub fn mysql(
        database: impl Into<String>,
        host: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(ConnectionConfig::mysql(database, host, user, password))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn database_type(&self) -> DatabaseBackend {
        self.inner.config.backend
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::new(self.database_type())
    }

    /// Pick between two hand-written statements by backend
    pub fn dialect_query<'a>(&self, sqlite_sql: &'a str, mysql_sql: &'a str) -> &'a str {
        self.dialect().pick(sqlite_sql, mysql_sql)
    }

    async fn open_driver(config: &ConnectionConfig) -> Result<Box<dyn DatabaseDriver>> {
        config.validate()?;
        let driver: Box<dyn DatabaseDriver> = match config.backend {
            DatabaseBackend::Sqlite => Box::new(SqliteDriver::new(config.sqlite_path()).await?),
            DatabaseBackend::MySql => Box::new(MySqlDriver::new(config.mysql_config()).await?),
        };
        Ok(driver)
    }

    /// Open the connection, replacing any existing one
    pub async fn connect(&self) -> Result<()> {
        let config = &self.inner.config;
        match Self::open_driver(config).await {
            Ok(driver) => {
                if let Some(old) = self.inner.driver.write().await.replace(driver) {
                    let _ = old.close().await;
                }
                info!("Database connection successful: {}", config.database);
                Ok(())
            }
            Err(e) => {
                error!("Database connection error: {}", e);
                Err(DbError::Connect {
                    backend: config.backend,
                    database: config.database.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        match self.inner.driver.read().await.as_ref() {
            Some(driver) => driver.test_connection().await.unwrap_or(false),
            None => false,
        }
    }

    /// Re-establish the connection using the same configuration
    pub async fn reconnect(&self) -> Result<()> {
        {
            let mut guard = self.inner.driver.write().await;
            if let Some(driver) = guard.as_mut() {
                match driver.reconnect().await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!("Reconnect failed, opening a fresh connection: {}", e);
                        *guard = None;
                    }
                }
            }
        }
        self.connect().await
    }

    /// Close the connection. Later operations reconnect on demand.
    pub async fn close(&self) -> Result<()> {
        if let Some(driver) = self.inner.driver.write().await.take() {
            driver.close().await?;
            info!("Database connection closed.");
        }
        Ok(())
    }

    async fn ensure_connection(&self) -> Result<()> {
        if !self.is_connected().await {
            self.reconnect().await?;
        }
        Ok(())
    }

    async fn driver(&self) -> Result<RwLockReadGuard<'_, Box<dyn DatabaseDriver>>> {
        self.ensure_connection().await?;
        RwLockReadGuard::try_map(self.inner.driver.read().await, |d| d.as_ref())
            .map_err(|_| DbError::NotConnected)
    }

    pub fn create_table(&self, table: &str) -> TableBuilder {
        TableBuilder::new(self.clone(), table)
    }

    pub fn insert(&self, table: &str) -> InsertBuilder {
        InsertBuilder::new(self.clone(), table)
    }

    pub fn query(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(self.clone(), table)
    }

    /// Schema recorded when the table was created through this manager
    pub async fn table_schema(&self, table: &str) -> Option<TableSchema> {
        self.inner.schemas.read().await.get(table).cloned()
    }

    pub(crate) async fn create_table_from(&self, schema: TableSchema, drop_if_exists: bool) -> Result<()> {
        let dialect = self.dialect();
        let create_sql = dialect.create_table_sql(&schema)?;
        let driver = self.driver().await?;

        if drop_if_exists {
            driver.execute_batch(&dialect.drop_table_sql(&schema.name)?).await?;
            self.inner.schemas.write().await.remove(&schema.name);
        }
        if let Err(e) = driver.execute_batch(&create_sql).await {
            error!("Table creation error for {}: {}", schema.name, e);
            return Err(e);
        }
        drop(driver);

        info!("Table created successfully: {}", schema.name);
        self.inner
            .schemas
            .write()
            .await
            .insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Insert one row. Columns with a declared default that were not set get that default.
    pub(crate) async fn insert_row(&self, table: &str, mut values: Vec<(String, Value)>) -> Result<i64> {
        if let Some(schema) = self.inner.schemas.read().await.get(table) {
            for (column, default) in schema.defaults() {
                if !values.iter().any(|(c, _)| c == column) {
                    values.push((column.to_string(), default.clone()));
                }
            }
        }
        if values.is_empty() {
            return Err(DbError::EmptyInsert(table.to_string()));
        }

        let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
        let sql = self.dialect().insert_sql(table, &columns)?;
        let params: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();

        let id = self.driver().await?.insert(&sql, &params).await?;
        info!("Data inserted into table: {}, ID: {}", table, id);
        Ok(id)
    }

    /// Fetch a row by its `id` primary key
    pub async fn select(&self, table: &str, id: i64) -> Result<Option<Row>> {
        let sql = self.dialect().select_by_id_sql(table)?;
        let result = self.driver().await?.query(&sql, &[Value::Int(id)]).await?;
        Ok(result.into_rows().into_iter().next())
    }

    /// Run any query with positional `?` parameters
    pub async fn execute_query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.driver().await?.query(sql, params).await
    }

    /// Run an INSERT/UPDATE/DELETE and return the affected row count
    pub async fn execute_update(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.driver().await?.execute(sql, params).await
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        self.driver().await?.table_exists(table).await
    }

    /// Delete all rows and reset the id counter
    pub async fn truncate_table(&self, table: &str) -> Result<()> {
        self.driver().await?.truncate_table(table).await?;
        info!("Table truncated: {}", table);
        Ok(())
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.driver().await?.get_tables().await
    }

    pub async fn table_columns(&self, table: &str) -> Result<Vec<TableColumn>> {
        self.driver().await?.get_columns(table).await
    }

    pub async fn server_version(&self) -> Result<String> {
        self.driver().await?.get_server_version().await
    }

    /// Run an operation in the background on the tokio runtime
    pub fn spawn<F, Fut, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce(DbManager) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(f(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_manager() -> (tempfile::TempDir, DbManager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        let db = DbManager::sqlite(path.to_string_lossy().to_string());
        (dir, db)
    }

    async fn create_users(db: &DbManager) {
        db.create_table("users")
            .add_string_len("username", 50)
            .add_string_len("email", 100)
            .add_string("firstName")
            .add_string("lastName")
            .add_integer_default("loginCount", 0)
            .add_double_default("money", 0.0)
            .add_boolean_default("active", false)
            .add_string_default("level", "beginner")
            .add_timestamp("lastLogin")
            .add_text_default("notes", "New user")
            .create_or_replace()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_and_close() {
        let (_dir, db) = temp_manager();
        assert!(!db.is_connected().await);
        db.connect().await.unwrap();
        assert!(db.is_connected().await);
        assert_eq!(db.database_type(), DatabaseBackend::Sqlite);
        db.close().await.unwrap();
        assert!(!db.is_connected().await);
    }

    #[tokio::test]
    async fn test_operations_reconnect_after_close() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        create_users(&db).await;
        db.close().await.unwrap();

        assert!(db.table_exists("users").await.unwrap());
        assert!(db.is_connected().await);
    }

    #[tokio::test]
    async fn test_insert_fills_declared_defaults() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        create_users(&db).await;

        let id = db
            .insert("users")
            .set_string("username", "janedoe")
            .set_string("email", "jane@example.com")
            .execute()
            .await
            .unwrap();
        assert_eq!(id, 1);

        let row = db.select("users", id).await.unwrap().unwrap();
        assert_eq!(row.get_string("username"), "janedoe");
        assert_eq!(row.get_int("loginCount"), 0);
        assert_eq!(row.get_string("level"), "beginner");
        assert_eq!(row.get_string("notes"), "New user");
        assert!(!row.get_bool("active"));
        assert!(!row.has("lastLogin"));
        assert_eq!(row.get_long("id"), 1);
    }

    #[tokio::test]
    async fn test_failed_replace_forgets_old_schema() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        db.create_table("t").add_string_default("lvl", "x").create().await.unwrap();
        assert!(db.table_schema("t").await.is_some());

        let replaced = db
            .create_table("t")
            .add_string("name")
            .constraint("BOGUS(")
            .create_or_replace()
            .await;
        assert!(replaced.is_err());
        assert!(!db.table_exists("t").await.unwrap());
        assert!(db.table_schema("t").await.is_none());

        // Old defaults would add an `lvl` column this table does not have
        db.execute_update("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)", &[])
            .await
            .unwrap();
        let id = db.insert("t").set_string("name", "a").execute().await.unwrap();
        let row = db.select("t", id).await.unwrap().unwrap();
        assert!(row.get("lvl").is_none());
    }

    #[tokio::test]
    async fn test_select_missing_row() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        create_users(&db).await;
        assert!(db.select("users", 42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_execute_update_and_truncate() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        create_users(&db).await;

        let id = db.insert("users").set_string("username", "bob").execute().await.unwrap();
        let updated = db
            .execute_update(
                "UPDATE users SET loginCount = loginCount + 1, level = ? WHERE id = ?",
                &[Value::from("intermediate"), Value::Int(id)],
            )
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let row = db.select("users", id).await.unwrap().unwrap();
        assert_eq!(row.get_int("loginCount"), 1);
        assert_eq!(row.get_string("level"), "intermediate");

        db.truncate_table("users").await.unwrap();
        assert_eq!(db.query("users").count().await.unwrap(), 0);

        // id counter restarts after truncation
        let id = db.insert("users").set_string("username", "again").execute().await.unwrap();
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_schema_listing() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        create_users(&db).await;

        assert_eq!(db.list_tables().await.unwrap(), vec!["users"]);
        let columns = db.table_columns("users").await.unwrap();
        assert_eq!(columns[0].name, "id");
        assert!(columns[0].is_primary_key);
        assert_eq!(columns.len(), 11);
        assert!(db.table_schema("users").await.is_some());
        assert!(!db.table_exists("orders").await.unwrap());
        assert!(db.table_exists("USERS").await.unwrap());
        assert_eq!(db.query("USERS").count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_insert() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        create_users(&db).await;

        let handle = db.spawn(|db| async move {
            db.insert("users").set_string("username", "async").execute().await
        });
        let id = handle.await.unwrap().unwrap();
        assert!(db.select("users", id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dialect_query_and_invalid_names() {
        let (_dir, db) = temp_manager();
        db.connect().await.unwrap();
        assert_eq!(db.dialect_query("sqlite", "mysql"), "sqlite");
        assert!(matches!(
            db.select("users; --", 1).await,
            Err(DbError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            db.insert("empty").execute().await,
            Err(DbError::EmptyInsert(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_to_connect() {
        let db = DbManager::mysql("shop", "localhost", "", "");
        assert!(matches!(db.connect().await, Err(DbError::Connect { .. })));
        assert!(!db.is_connected().await);
    }
}
