//! Fluent row insertion

use crate::db::Value;
use crate::error::Result;
use crate::manager::DbManager;
use chrono::{NaiveDate, NaiveDateTime};

/// Collects column values for one row. Setting a column twice keeps the last value.
pub struct InsertBuilder {
    db: DbManager,
    table: String,
    values: Vec<(String, Value)>,
    last_insert_id: Option<i64>,
}

impl InsertBuilder {
    pub fn new(db: DbManager, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            values: Vec::new(),
            last_insert_id: None,
        }
    }

    pub fn set_value(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column.to_string(), value)),
        }
        self
    }

    pub fn set_string(self, column: &str, value: impl Into<String>) -> Self {
        self.set_value(column, Value::Text(value.into()))
    }

    pub fn set_integer(self, column: &str, value: i32) -> Self {
        self.set_value(column, value)
    }

    pub fn set_long(self, column: &str, value: i64) -> Self {
        self.set_value(column, value)
    }

    pub fn set_double(self, column: &str, value: f64) -> Self {
        self.set_value(column, value)
    }

    pub fn set_boolean(self, column: &str, value: bool) -> Self {
        self.set_value(column, value)
    }

    pub fn set_date(self, column: &str, value: NaiveDate) -> Self {
        self.set_value(column, value)
    }

    pub fn set_timestamp(self, column: &str, value: NaiveDateTime) -> Self {
        self.set_value(column, value)
    }

    pub fn set_null(self, column: &str) -> Self {
        self.set_value(column, Value::Null)
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// Insert the row and return its generated id
    pub async fn execute(&mut self) -> Result<i64> {
        let id = self.db.insert_row(&self.table, self.values.clone()).await?;
        self.last_insert_id = Some(id);
        Ok(id)
    }

    /// Id produced by the last successful `execute`
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}
