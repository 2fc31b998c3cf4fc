//! Error types for the database layer

use crate::db::DatabaseBackend;
use thiserror::Error;

/// Errors produced by the database manager and its drivers.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database is not connected")]
    NotConnected,

    #[error("failed to connect to {backend} database '{database}': {reason}")]
    Connect {
        backend: DatabaseBackend,
        database: String,
        reason: String,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("mysql error: {0}")]
    MySql(#[from] sqlx::Error),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot decode column '{column}': {reason}")]
    Decode { column: String, reason: String },

    #[error("insert into '{0}' has no values")]
    EmptyInsert(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
