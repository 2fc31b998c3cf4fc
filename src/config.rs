//! Configuration management for the database manager
//!
//! Resolves connection settings from code, the environment (`.env` supported) or the
//! saved profiles in ~/.config/db_manager/config.json

use crate::db::mysql::MySqlConfig;
use crate::db::DatabaseBackend;
use crate::error::DbError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a single database connection
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub name: String,
    pub backend: DatabaseBackend,
    /// Database name (MySQL) or file path (SQLite)
    pub database: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub use_ssl: bool,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            backend: DatabaseBackend::Sqlite,
            database: String::new(),
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            use_ssl: false,
            max_connections: 5,
            connect_timeout_secs: 10,
        }
    }
}

impl ConnectionConfig {
    /// Local SQLite file
    pub fn sqlite(path: impl Into<String>) -> Self {
        let database = path.into();
        Self {
            name: database.clone(),
            backend: DatabaseBackend::Sqlite,
            database,
            ..Self::default()
        }
    }

    /// MySQL server; `host` may carry an explicit port (`db.local:3307`)
    pub fn mysql(
        database: impl Into<String>,
        host: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let database = database.into();
        let (host, port) = split_host_port(host, 3306);
        Self {
            name: database.clone(),
            backend: DatabaseBackend::MySql,
            database,
            host,
            port,
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Read `DB_*` variables, loading `.env` first when present
    pub fn from_env() -> std::result::Result<Self, DbError> {
        let _ = dotenvy::dotenv();
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let backend = match var("DB_BACKEND") {
            Some(b) => b.parse()?,
            None => DatabaseBackend::Sqlite,
        };
        let database = var("DB_DATABASE").unwrap_or_else(|| match backend {
            DatabaseBackend::Sqlite => "users.db".to_string(),
            DatabaseBackend::MySql => "example".to_string(),
        });

        let mut config = match backend {
            DatabaseBackend::Sqlite => Self::sqlite(database),
            DatabaseBackend::MySql => Self::mysql(
                database,
                &var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                var("DB_USER").unwrap_or_else(|| "root".to_string()),
                std::env::var("DB_PASSWORD").unwrap_or_default(),
            ),
        };

        if let Some(port) = var("DB_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| DbError::InvalidConfig(format!("DB_PORT '{}' is not a port", port)))?;
        }
        if let Some(ssl) = var("DB_USE_SSL") {
            config.use_ssl = matches!(ssl.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(max) = var("DB_MAX_CONNECTIONS").and_then(|m| m.trim().parse().ok()) {
            config.max_connections = max;
        }
        Ok(config)
    }

    /// Check if all required fields are filled
    pub fn is_valid(&self) -> bool {
        if self.database.trim().is_empty() {
            return false;
        }
        match self.backend {
            DatabaseBackend::Sqlite => true,
            // password can be empty for local root accounts
            DatabaseBackend::MySql => {
                !self.host.trim().is_empty() && self.port > 0 && !self.user.trim().is_empty()
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), DbError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(DbError::InvalidConfig(format!(
                "{} connection '{}' is missing required fields",
                self.backend, self.name
            )))
        }
    }

    pub fn sqlite_path(&self) -> PathBuf {
        PathBuf::from(&self.database)
    }

    pub fn mysql_config(&self) -> MySqlConfig {
        MySqlConfig {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            use_ssl: self.use_ssl,
            max_connections: self.max_connections,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

fn split_host_port(host: &str, default_port: u16) -> (String, u16) {
    match host.rsplit_once(':') {
        Some((h, p)) if !h.is_empty() => match p.parse() {
            Ok(port) => (h.to_string(), port),
            Err(_) => (host.to_string(), default_port),
        },
        _ => (host.to_string(), default_port),
    }
}

/// Application configuration
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// List of saved connections
    pub connections: Vec<ConnectionConfig>,
    /// Name of the last used connection
    pub last_connection: Option<String>,
    /// Log level override (e.g. "debug"). `RUST_LOG` still wins when set
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Get the config file path (~/.config/db_manager/config.json)
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("db_manager");

        Ok(config_dir.join("config.json"))
    }

    /// Load configuration from disk, falling back to an empty config
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load configuration from a specific file. A missing file yields the default config.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = serde_json::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Add or update a connection (updates if name already exists)
    pub fn add_connection(&mut self, conn: ConnectionConfig) {
        if let Some(existing) = self.connections.iter_mut().find(|c| c.name == conn.name) {
            *existing = conn;
        } else {
            self.connections.push(conn);
        }
    }

    /// Remove a connection by name
    pub fn remove_connection(&mut self, name: &str) {
        self.connections.retain(|c| c.name != name);

        // Clear last_connection if it was the removed one
        if self.last_connection.as_deref() == Some(name) {
            self.last_connection = None;
        }
    }

    /// Get a connection by name
    pub fn get_connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// Set the last used connection
    pub fn set_last_connection(&mut self, name: &str) {
        self.last_connection = Some(name.to_string());
    }

    /// The connection that was used last, if it still exists
    pub fn last_connection(&self) -> Option<&ConnectionConfig> {
        self.last_connection
            .as_deref()
            .and_then(|name| self.get_connection(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_host_with_port() {
        let cfg = ConnectionConfig::mysql("example", "db.local:3307", "root", "");
        assert_eq!(cfg.host, "db.local");
        assert_eq!(cfg.port, 3307);
        assert_eq!(cfg.backend, DatabaseBackend::MySql);
        assert!(cfg.is_valid());

        let cfg = ConnectionConfig::mysql("example", "localhost", "root", "pw");
        assert_eq!(cfg.port, 3306);
        assert_eq!(cfg.mysql_config().password, "pw");
    }

    #[test]
    fn test_validity() {
        assert!(ConnectionConfig::sqlite("users.db").is_valid());
        assert!(!ConnectionConfig::sqlite("  ").is_valid());
        assert!(!ConnectionConfig::mysql("example", "localhost", "", "").is_valid());
        assert!(matches!(
            ConnectionConfig::mysql("", "localhost", "root", "").validate(),
            Err(DbError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.add_connection(ConnectionConfig::sqlite("a.db"));
        config.add_connection(ConnectionConfig::mysql("shop", "localhost", "root", ""));
        config.set_last_connection("shop");
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.last_connection().unwrap().backend, DatabaseBackend::MySql);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_profile_uses_defaults() {
        let cfg: ConnectionConfig =
            serde_json::from_str(r#"{"name":"x","backend":"mysql","database":"x","user":"u"}"#).unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 3306);
        assert_eq!(cfg.max_connections, 5);
    }

    const DB_VARS: [&str; 8] = [
        "DB_BACKEND",
        "DB_DATABASE",
        "DB_HOST",
        "DB_PORT",
        "DB_USER",
        "DB_PASSWORD",
        "DB_USE_SSL",
        "DB_MAX_CONNECTIONS",
    ];

    /// Environment variables are process-wide; run env tests one at a time
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        for key in DB_VARS {
            std::env::set_var(key, "");
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let out = f();
        for key in DB_VARS {
            std::env::set_var(key, "");
        }
        out
    }

    #[test]
    fn test_from_env_defaults_to_sqlite() {
        let cfg = with_env(&[], ConnectionConfig::from_env).unwrap();
        assert_eq!(cfg.backend, DatabaseBackend::Sqlite);
        assert_eq!(cfg.database, "users.db");
        assert_eq!(cfg.sqlite_path(), PathBuf::from("users.db"));
    }

    #[test]
    fn test_from_env_mysql() {
        let cfg = with_env(
            &[
                ("DB_BACKEND", "MySQL"),
                ("DB_DATABASE", "shop"),
                ("DB_HOST", "db.local:3307"),
                ("DB_USER", "app"),
                ("DB_PASSWORD", "secret"),
                ("DB_USE_SSL", "yes"),
                ("DB_MAX_CONNECTIONS", "12"),
            ],
            ConnectionConfig::from_env,
        )
        .unwrap();
        assert_eq!(cfg.backend, DatabaseBackend::MySql);
        assert_eq!(cfg.database, "shop");
        assert_eq!(cfg.host, "db.local");
        assert_eq!(cfg.port, 3307);
        assert_eq!(cfg.user, "app");
        assert_eq!(cfg.password, "secret");
        assert!(cfg.use_ssl);
        assert_eq!(cfg.max_connections, 12);
    }

    #[test]
    fn test_from_env_mysql_defaults_and_port_override() {
        let cfg = with_env(
            &[("DB_BACKEND", "mysql"), ("DB_PORT", "3310"), ("DB_MAX_CONNECTIONS", "many")],
            ConnectionConfig::from_env,
        )
        .unwrap();
        assert_eq!(cfg.database, "example");
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.user, "root");
        assert_eq!(cfg.port, 3310);
        assert!(!cfg.use_ssl);
        assert_eq!(cfg.max_connections, 5);
    }

    #[test]
    fn test_from_env_rejects_bad_values() {
        let bad_port = with_env(
            &[("DB_BACKEND", "mysql"), ("DB_PORT", "abc")],
            ConnectionConfig::from_env,
        );
        assert!(matches!(bad_port, Err(DbError::InvalidConfig(_))));

        let bad_backend = with_env(&[("DB_BACKEND", "oracle")], ConnectionConfig::from_env);
        assert!(matches!(bad_backend, Err(DbError::InvalidConfig(_))));
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut config = AppConfig::default();
        config.add_connection(ConnectionConfig::sqlite("a.db"));
        let mut updated = ConnectionConfig::sqlite("a.db");
        updated.database = "b.db".to_string();
        config.add_connection(updated);
        assert_eq!(config.connections.len(), 1);
        assert_eq!(config.get_connection("a.db").unwrap().database, "b.db");

        config.set_last_connection("a.db");
        config.remove_connection("a.db");
        assert!(config.connections.is_empty());
        assert!(config.last_connection.is_none());
    }
}
