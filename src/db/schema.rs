//! Table and column definitions used when creating and inspecting tables

use crate::db::value::Value;

/// Logical column type, mapped to a concrete SQL type per dialect
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnType {
    String(u32),
    Integer,
    Double,
    Boolean,
    Text,
    Date,
    Timestamp,
    /// Passed through to the engine untouched
    Custom(String),
}

impl ColumnType {
    /// Default length for string columns
    pub const DEFAULT_STRING_LENGTH: u32 = 255;
}

/// Column definition for a table being created
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub constraints: Option<String>,
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            constraints: None,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Table definition. Every table also gets an auto-increment `id` primary key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column, replacing any earlier column with the same name in place
    pub fn upsert_column(&mut self, column: ColumnDef) {
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == column.name) {
            *existing = column;
        } else {
            self.columns.push(column);
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns that declare a default value
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .filter_map(|c| c.default.as_ref().map(|d| (c.name.as_str(), d)))
    }
}

/// Column as reported by the engine when inspecting an existing table
#[derive(Clone, Debug, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
}
