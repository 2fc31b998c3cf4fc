//! MySQL driver implementation using sqlx
//!
//! Creates the target database on first connect, then keeps a small connection pool
//! against it.

use crate::db::dialect::Dialect;
use crate::db::driver::{DatabaseBackend, DatabaseDriver};
use crate::db::query::{ColumnInfo, QueryResult, Row};
use crate::db::schema::TableColumn;
use crate::db::value::Value;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{
    MySqlArguments, MySqlColumn, MySqlConnectOptions, MySqlConnection, MySqlPool,
    MySqlPoolOptions, MySqlRow, MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{Column, Connection, Executor, MySql, Row as _, Statement, TypeInfo, ValueRef};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration specific to MySQL connections
#[derive(Clone, Debug)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub use_ssl: bool,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: String::new(),
            use_ssl: false,
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl MySqlConfig {
    /// Server-level options, not bound to any database
    fn server_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .charset("utf8mb4")
            .ssl_mode(if self.use_ssl {
                MySqlSslMode::Preferred
            } else {
                MySqlSslMode::Disabled
            })
    }

    fn database_options(&self) -> MySqlConnectOptions {
        self.server_options().database(&self.database)
    }
}

/// MySQL driver
pub struct MySqlDriver {
    pool: MySqlPool,
    pub config: MySqlConfig,
}

impl MySqlDriver {
    /// Connect to the server, creating the database when missing
    pub async fn new(config: MySqlConfig) -> Result<Self> {
        let pool = Self::connect_internal(&config).await?;
        Ok(Self { pool, config })
    }

    async fn connect_internal(cfg: &MySqlConfig) -> Result<MySqlPool> {
        if let Err(e) = Self::create_database(cfg).await {
            // The account may lack CREATE rights while the database already exists
            warn!("Database creation error for '{}': {}", cfg.database, e);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.max_connections.max(1))
            .acquire_timeout(cfg.connect_timeout)
            .connect_with(cfg.database_options())
            .await?;
        Ok(pool)
    }

    async fn create_database(cfg: &MySqlConfig) -> Result<()> {
        let sql = Dialect::new(DatabaseBackend::MySql).create_database_sql(&cfg.database)?;
        let mut conn = MySqlConnection::connect_with(&cfg.server_options()).await?;
        conn.execute(sqlx::raw_sql(&sql)).await?;
        conn.close().await?;
        info!("Ensured database exists: {}", cfg.database);
        Ok(())
    }

    async fn first_string(&self, sql: &str, params: &[Value]) -> Result<Option<String>> {
        let result = self.query(sql, params).await?;
        Ok(result
            .first()
            .and_then(|row| row.values().first())
            .filter(|v| !v.is_null())
            .map(|v| v.to_string()))
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param.clone() {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(i8::from(v)),
            Value::Int(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Date(v) => query.bind(v),
            Value::Timestamp(v) => query.bind(v),
            Value::Blob(v) => query.bind(v),
        };
    }
    query
}

fn decode_error(column: &str, e: sqlx::Error) -> DbError {
    DbError::Decode {
        column: column.to_string(),
        reason: e.to_string(),
    }
}

/// Convert one column of a fetched row into a `Value`, driven by the reported type name
fn extract_value(row: &MySqlRow, idx: usize) -> Result<Value> {
    let column = row.column(idx).name().to_string();
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();
    let err = |e| decode_error(&column, e);

    let value = match type_name.as_str() {
        "BOOLEAN" => match row.try_get::<bool, _>(idx) {
            Ok(v) => Value::Bool(v),
            Err(_) => Value::Bool(row.try_get::<i8, _>(idx).map_err(err)? != 0),
        },
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::Int(row.try_get::<i64, _>(idx).map_err(err)?)
        }
        t if t.ends_with("UNSIGNED") => {
            let v = row.try_get::<u64, _>(idx).map_err(err)?;
            i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(v.to_string()))
        }
        "FLOAT" => Value::Float(f64::from(row.try_get::<f32, _>(idx).map_err(err)?)),
        "DOUBLE" => Value::Float(row.try_get::<f64, _>(idx).map_err(err)?),
        "DECIMAL" => {
            let d = row.try_get::<Decimal, _>(idx).map_err(err)?;
            d.to_f64()
                .map(Value::Float)
                .unwrap_or_else(|| Value::Text(d.to_string()))
        }
        "DATE" => Value::Date(row.try_get::<NaiveDate, _>(idx).map_err(err)?),
        "DATETIME" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(idx).map_err(err)?),
        "TIMESTAMP" => Value::Timestamp(
            row.try_get::<DateTime<Utc>, _>(idx)
                .map_err(err)?
                .naive_utc(),
        ),
        "TIME" => Value::Text(row.try_get::<NaiveTime, _>(idx).map_err(err)?.to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            Value::Blob(row.try_get::<Vec<u8>, _>(idx).map_err(err)?)
        }
        _ => match row.try_get::<String, _>(idx) {
            Ok(v) => Value::Text(v),
            Err(_) => Value::Blob(row.try_get::<Vec<u8>, _>(idx).map_err(err)?),
        },
    };
    Ok(value)
}

fn column_info(columns: &[MySqlColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            type_name: c.type_info().name().to_string(),
        })
        .collect()
}

fn process_rows(rows: Vec<MySqlRow>, columns: Vec<ColumnInfo>, start: Instant) -> Result<QueryResult> {
    let names: Arc<[String]> = columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>().into();

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let values = (0..row.len())
            .map(|i| extract_value(row, i))
            .collect::<Result<Vec<_>>>()?;
        out.push(Row::new(Arc::clone(&names), values));
    }

    Ok(QueryResult {
        row_count: out.len(),
        columns,
        rows: out,
        execution_time: start.elapsed(),
        affected_rows: None,
    })
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    fn database_name(&self) -> String {
        self.config.database.clone()
    }

    async fn test_connection(&self) -> Result<bool> {
        if self.pool.is_closed() {
            return Ok(false);
        }
        Ok(sqlx::query("SELECT 1").execute(&self.pool).await.is_ok())
    }

    async fn get_server_version(&self) -> Result<String> {
        let version = self
            .first_string("SELECT VERSION()", &[])
            .await?
            .unwrap_or_default();
        Ok(format!("MySQL {}", version))
    }

    async fn reconnect(&mut self) -> Result<()> {
        let pool = Self::connect_internal(&self.config).await?;
        let old = std::mem::replace(&mut self.pool, pool);
        old.close().await;
        info!("Reconnected to {}", self.config.database);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        if self.pool.is_closed() {
            return Err(DbError::NotConnected);
        }
        debug!(sql, "mysql execute_batch");
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        if self.pool.is_closed() {
            return Err(DbError::NotConnected);
        }
        debug!(sql, params = params.len(), "mysql execute");
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        if self.pool.is_closed() {
            return Err(DbError::NotConnected);
        }
        debug!(sql, params = params.len(), "mysql insert");
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_id() as i64)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if self.pool.is_closed() {
            return Err(DbError::NotConnected);
        }
        debug!(sql, params = params.len(), "mysql query");
        let start = Instant::now();
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        // An empty result carries no column metadata; ask the prepared statement
        let columns = match rows.first() {
            Some(row) => column_info(row.columns()),
            None => column_info(self.pool.prepare(sql).await?.columns()),
        };
        process_rows(rows, columns, start)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let count = self
            .first_string(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
                &[Value::from(self.config.database.as_str()), Value::from(table)],
            )
            .await?;
        Ok(count.map(|c| c != "0").unwrap_or(false))
    }

    async fn get_tables(&self) -> Result<Vec<String>> {
        let result = self
            .query(
                "SELECT table_name AS name FROM information_schema.tables \
                 WHERE table_schema = ? AND table_type = 'BASE TABLE' ORDER BY table_name",
                &[Value::from(self.config.database.as_str())],
            )
            .await?;
        Ok(result.rows.iter().map(|r| r.get_string("name")).collect())
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<TableColumn>> {
        let result = self
            .query(
                "SELECT column_name AS name, column_type AS data_type, is_nullable AS nullable, \
                 column_key AS col_key FROM information_schema.columns \
                 WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
                &[Value::from(self.config.database.as_str()), Value::from(table)],
            )
            .await?;
        Ok(result
            .rows
            .iter()
            .map(|r| TableColumn {
                name: r.get_string("name"),
                data_type: r.get_string("data_type"),
                is_nullable: r.get_string("nullable").eq_ignore_ascii_case("YES"),
                is_primary_key: r.get_string("col_key") == "PRI",
            })
            .collect())
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        for stmt in Dialect::new(DatabaseBackend::MySql).truncate_statements(table)? {
            self.execute_batch(&stmt).await?;
        }
        Ok(())
    }
}
