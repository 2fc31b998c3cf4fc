//! Fluent table definition

use crate::db::{ColumnDef, ColumnType, TableSchema, Value};
use crate::error::Result;
use crate::manager::DbManager;
use chrono::{NaiveDate, NaiveDateTime};

/// Collects column definitions and creates the table.
///
/// Every table gets an auto-increment `id` primary key ahead of the declared columns.
#[must_use = "call create() or create_or_replace() to run the statement"]
pub struct TableBuilder {
    db: DbManager,
    schema: TableSchema,
}

impl TableBuilder {
    pub fn new(db: DbManager, table: &str) -> Self {
        Self {
            db,
            schema: TableSchema::new(table),
        }
    }

    fn column(mut self, name: &str, column_type: ColumnType, default: Option<Value>) -> Self {
        let mut def = ColumnDef::new(name, column_type);
        def.default = default;
        self.schema.upsert_column(def);
        self
    }

    /// VARCHAR(255)
    pub fn add_string(self, name: &str) -> Self {
        self.add_string_len(name, ColumnType::DEFAULT_STRING_LENGTH)
    }

    pub fn add_string_len(self, name: &str, length: u32) -> Self {
        self.column(name, ColumnType::String(length), None)
    }

    pub fn add_integer(self, name: &str) -> Self {
        self.column(name, ColumnType::Integer, None)
    }

    pub fn add_double(self, name: &str) -> Self {
        self.column(name, ColumnType::Double, None)
    }

    pub fn add_boolean(self, name: &str) -> Self {
        self.column(name, ColumnType::Boolean, None)
    }

    pub fn add_text(self, name: &str) -> Self {
        self.column(name, ColumnType::Text, None)
    }

    pub fn add_date(self, name: &str) -> Self {
        self.column(name, ColumnType::Date, None)
    }

    pub fn add_timestamp(self, name: &str) -> Self {
        self.column(name, ColumnType::Timestamp, None)
    }

    pub fn add_string_default(self, name: &str, default: &str) -> Self {
        self.add_string_len_default(name, ColumnType::DEFAULT_STRING_LENGTH, default)
    }

    pub fn add_string_len_default(self, name: &str, length: u32, default: &str) -> Self {
        self.column(name, ColumnType::String(length), Some(default.into()))
    }

    pub fn add_integer_default(self, name: &str, default: i64) -> Self {
        self.column(name, ColumnType::Integer, Some(default.into()))
    }

    pub fn add_double_default(self, name: &str, default: f64) -> Self {
        self.column(name, ColumnType::Double, Some(default.into()))
    }

    pub fn add_boolean_default(self, name: &str, default: bool) -> Self {
        self.column(name, ColumnType::Boolean, Some(default.into()))
    }

    pub fn add_text_default(self, name: &str, default: &str) -> Self {
        self.column(name, ColumnType::Text, Some(default.into()))
    }

    pub fn add_date_default(self, name: &str, default: NaiveDate) -> Self {
        self.column(name, ColumnType::Date, Some(default.into()))
    }

    pub fn add_timestamp_default(self, name: &str, default: NaiveDateTime) -> Self {
        self.column(name, ColumnType::Timestamp, Some(default.into()))
    }

    /// Any column type, including engine-specific ones via `ColumnType::Custom`
    pub fn add_column(self, name: &str, column_type: ColumnType) -> Self {
        self.column(name, column_type, None)
    }

    /// Append raw constraints (e.g. `NOT NULL UNIQUE`) to the last added column
    pub fn constraint(mut self, constraints: &str) -> Self {
        if let Some(last) = self.schema.columns.last_mut() {
            last.constraints = Some(constraints.to_string());
        }
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Create the table if it does not exist yet
    pub async fn create(self) -> Result<DbManager> {
        self.db.create_table_from(self.schema, false).await?;
        Ok(self.db)
    }

    /// Drop any existing table with this name, then create it
    pub async fn create_or_replace(self) -> Result<DbManager> {
        self.db.create_table_from(self.schema, true).await?;
        Ok(self.db)
    }
}
