//! Unified database manager - Library
//! One async API over an embedded SQLite file or a MySQL server, with fluent
//! builders for tables, inserts and queries.

pub mod builder;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod manager;

pub use builder::{InsertBuilder, QueryBuilder, TableBuilder};
pub use config::{AppConfig, ConnectionConfig};
pub use db::{DatabaseBackend, QueryResult, Row, Value};
pub use error::{DbError, Result};
pub use manager::DbManager;
