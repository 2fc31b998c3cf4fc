//! Per-backend SQL differences: type names, primary keys, table options and truncation

use crate::db::schema::{ColumnDef, ColumnType, TableSchema};
use crate::db::value::Value;
use crate::db::DatabaseBackend;
use crate::error::{DbError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Check that a table or column name is a plain SQL identifier
pub fn validate_identifier(name: &str) -> Result<&str> {
    static IDENT: OnceLock<Option<Regex>> = OnceLock::new();
    let valid = IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name));
    if valid {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Quote a string as a SQL text literal
pub fn text_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub backend: DatabaseBackend,
}

impl Dialect {
    pub fn new(backend: DatabaseBackend) -> Self {
        Self { backend }
    }

    /// Backticks are understood by both SQLite and MySQL
    pub fn quote_identifier(&self, identifier: &str) -> Result<String> {
        Ok(format!("`{}`", validate_identifier(identifier)?))
    }

    pub fn column_type(&self, column_type: &ColumnType) -> String {
        match (self.backend, column_type) {
            (_, ColumnType::String(len)) => format!("VARCHAR({})", len),
            (_, ColumnType::Text) => "TEXT".to_string(),
            (_, ColumnType::Date) => "DATE".to_string(),
            (_, ColumnType::Timestamp) => "TIMESTAMP".to_string(),
            (_, ColumnType::Custom(raw)) => raw.clone(),
            (DatabaseBackend::Sqlite, ColumnType::Integer) => "INTEGER".to_string(),
            (DatabaseBackend::Sqlite, ColumnType::Double) => "REAL".to_string(),
            (DatabaseBackend::Sqlite, ColumnType::Boolean) => "BOOLEAN".to_string(),
            (DatabaseBackend::MySql, ColumnType::Integer) => "INT".to_string(),
            (DatabaseBackend::MySql, ColumnType::Double) => "DOUBLE".to_string(),
            (DatabaseBackend::MySql, ColumnType::Boolean) => "TINYINT(1)".to_string(),
        }
    }

    pub fn primary_key(&self) -> &'static str {
        match self.backend {
            DatabaseBackend::Sqlite => "`id` INTEGER PRIMARY KEY AUTOINCREMENT",
            DatabaseBackend::MySql => "`id` INT AUTO_INCREMENT PRIMARY KEY",
        }
    }

    pub fn table_suffix(&self) -> &'static str {
        match self.backend {
            DatabaseBackend::Sqlite => "",
            DatabaseBackend::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
        }
    }

    /// Render a DEFAULT clause value for a column
    pub fn default_literal(&self, column_type: &ColumnType, value: &Value) -> String {
        let literal = match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Blob(_) => format!("X'{}'", value.to_string().trim_start_matches("0x")),
            Value::Text(v) => text_literal(v),
            other => text_literal(&other.to_string()),
        };

        // MySQL only accepts expression defaults on TEXT columns
        if self.backend == DatabaseBackend::MySql && *column_type == ColumnType::Text {
            format!("({})", literal)
        } else {
            literal
        }
    }

    fn column_sql(&self, column: &ColumnDef) -> Result<String> {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name)?,
            self.column_type(&column.column_type)
        );
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.default_literal(&column.column_type, default));
        }
        if let Some(constraints) = column.constraints.as_deref().filter(|c| !c.trim().is_empty()) {
            sql.push(' ');
            sql.push_str(constraints.trim());
        }
        Ok(sql)
    }

    pub fn create_table_sql(&self, schema: &TableSchema) -> Result<String> {
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}",
            self.quote_identifier(&schema.name)?,
            self.primary_key()
        );
        for column in &schema.columns {
            sql.push_str(", ");
            sql.push_str(&self.column_sql(column)?);
        }
        sql.push(')');
        sql.push_str(self.table_suffix());
        Ok(sql)
    }

    pub fn drop_table_sql(&self, table: &str) -> Result<String> {
        Ok(format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table)?))
    }

    pub fn insert_sql(&self, table: &str, columns: &[&str]) -> Result<String> {
        let names = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Result<Vec<_>>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table)?,
            names.join(", "),
            placeholders
        ))
    }

    pub fn select_by_id_sql(&self, table: &str) -> Result<String> {
        Ok(format!(
            "SELECT * FROM {} WHERE `id` = ?",
            self.quote_identifier(table)?
        ))
    }

    /// Statements that empty a table and reset its id counter.
    ///
    /// For SQLite the second statement touches `sqlite_sequence`, which only exists once
    /// an AUTOINCREMENT table has been created; the driver checks for it first.
    pub fn truncate_statements(&self, table: &str) -> Result<Vec<String>> {
        let quoted = self.quote_identifier(table)?;
        Ok(match self.backend {
            DatabaseBackend::Sqlite => vec![
                format!("DELETE FROM {}", quoted),
                format!("DELETE FROM sqlite_sequence WHERE name = {}", text_literal(table)),
            ],
            DatabaseBackend::MySql => vec![format!("TRUNCATE TABLE {}", quoted)],
        })
    }

    pub fn create_database_sql(&self, database: &str) -> Result<String> {
        Ok(format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            self.quote_identifier(database)?
        ))
    }

    /// Pick the statement written for this dialect
    pub fn pick<'a>(&self, sqlite: &'a str, mysql: &'a str) -> &'a str {
        match self.backend {
            DatabaseBackend::Sqlite => sqlite,
            DatabaseBackend::MySql => mysql,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> TableSchema {
        let mut schema = TableSchema::new("users");
        schema.upsert_column(ColumnDef::new("username", ColumnType::String(50)));
        schema.upsert_column(ColumnDef::new("loginCount", ColumnType::Integer).with_default(0));
        schema.upsert_column(ColumnDef::new("money", ColumnType::Double).with_default(0.5));
        schema.upsert_column(ColumnDef::new("active", ColumnType::Boolean).with_default(false));
        schema.upsert_column(ColumnDef::new("level", ColumnType::String(255)).with_default("it's"));
        schema.upsert_column(ColumnDef::new("notes", ColumnType::Text).with_default("New user"));
        schema
    }

    #[test]
    fn test_create_table_sqlite() {
        let sql = Dialect::new(DatabaseBackend::Sqlite)
            .create_table_sql(&users_schema())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `users` (`id` INTEGER PRIMARY KEY AUTOINCREMENT, \
             `username` VARCHAR(50), `loginCount` INTEGER DEFAULT 0, `money` REAL DEFAULT 0.5, \
             `active` BOOLEAN DEFAULT 0, `level` VARCHAR(255) DEFAULT 'it''s', \
             `notes` TEXT DEFAULT 'New user')"
        );
    }

    #[test]
    fn test_create_table_mysql() {
        let sql = Dialect::new(DatabaseBackend::MySql)
            .create_table_sql(&users_schema())
            .unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `users` (`id` INT AUTO_INCREMENT PRIMARY KEY"));
        assert!(sql.contains("`loginCount` INT DEFAULT 0"));
        assert!(sql.contains("`money` DOUBLE DEFAULT 0.5"));
        assert!(sql.contains("`active` TINYINT(1) DEFAULT 0"));
        assert!(sql.contains("`notes` TEXT DEFAULT ('New user')"));
        assert!(sql.ends_with(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"));
    }

    #[test]
    fn test_constraints_are_appended() {
        let mut schema = TableSchema::new("t");
        let mut col = ColumnDef::new("email", ColumnType::String(100));
        col.constraints = Some("NOT NULL UNIQUE".to_string());
        schema.upsert_column(col);
        let sql = Dialect::new(DatabaseBackend::Sqlite).create_table_sql(&schema).unwrap();
        assert!(sql.contains("`email` VARCHAR(100) NOT NULL UNIQUE"));
    }

    #[test]
    fn test_insert_sql() {
        let sql = Dialect::new(DatabaseBackend::MySql)
            .insert_sql("users", &["username", "email"])
            .unwrap();
        assert_eq!(sql, "INSERT INTO `users` (`username`, `email`) VALUES (?, ?)");
    }

    #[test]
    fn test_truncate_statements() {
        let sqlite = Dialect::new(DatabaseBackend::Sqlite).truncate_statements("users").unwrap();
        assert_eq!(
            sqlite,
            vec![
                "DELETE FROM `users`".to_string(),
                "DELETE FROM sqlite_sequence WHERE name = 'users'".to_string()
            ]
        );
        let mysql = Dialect::new(DatabaseBackend::MySql).truncate_statements("users").unwrap();
        assert_eq!(mysql, vec!["TRUNCATE TABLE `users`".to_string()]);
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        let dialect = Dialect::new(DatabaseBackend::Sqlite);
        assert!(matches!(
            dialect.quote_identifier("users; DROP TABLE x"),
            Err(DbError::InvalidIdentifier(_))
        ));
        assert!(dialect.quote_identifier("1abc").is_err());
        assert!(dialect.quote_identifier("a`b").is_err());
        assert_eq!(dialect.quote_identifier("_ok1").unwrap(), "`_ok1`");
    }

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("loginCount").unwrap(), "loginCount");
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("na me").is_err());
        assert!(matches!(
            validate_identifier("x'--"),
            Err(DbError::InvalidIdentifier(name)) if name == "x'--"
        ));
    }

    #[test]
    fn test_pick() {
        assert_eq!(Dialect::new(DatabaseBackend::Sqlite).pick("a", "b"), "a");
        assert_eq!(Dialect::new(DatabaseBackend::MySql).pick("a", "b"), "b");
    }
}
