//! Shared query result types used by all database drivers

use crate::db::value::{Value, DATE_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use std::time::Duration;

/// Column metadata
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

/// One fetched row. Column names are shared between all rows of a result.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self::new(columns.into(), values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of a column, if the column exists
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// True when the column exists and is not NULL
    pub fn has(&self, column: &str) -> bool {
        self.present(column).is_some()
    }

    fn present(&self, column: &str) -> Option<&Value> {
        self.get(column).filter(|v| !v.is_null())
    }

    pub fn get_string(&self, column: &str) -> String {
        self.get_string_or(column, "")
    }

    pub fn get_string_or(&self, column: &str, default: &str) -> String {
        self.present(column)
            .map(|v| v.to_string())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, column: &str) -> i32 {
        self.get_int_or(column, 0)
    }

    pub fn get_int_or(&self, column: &str, default: i32) -> i32 {
        match self.present(column) {
            Some(Value::Int(v)) => *v as i32,
            Some(Value::Float(v)) => *v as i32,
            Some(Value::Bool(v)) => i32::from(*v),
            Some(Value::Text(v)) => v.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_long(&self, column: &str) -> i64 {
        self.get_long_or(column, 0)
    }

    pub fn get_long_or(&self, column: &str, default: i64) -> i64 {
        match self.present(column) {
            Some(Value::Int(v)) => *v,
            Some(Value::Float(v)) => *v as i64,
            Some(Value::Bool(v)) => i64::from(*v),
            Some(Value::Text(v)) => v.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_double(&self, column: &str) -> f64 {
        self.get_double_or(column, 0.0)
    }

    pub fn get_double_or(&self, column: &str, default: f64) -> f64 {
        match self.present(column) {
            Some(Value::Int(v)) => *v as f64,
            Some(Value::Float(v)) => *v,
            Some(Value::Text(v)) => v.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_bool(&self, column: &str) -> bool {
        self.get_bool_or(column, false)
    }

    pub fn get_bool_or(&self, column: &str, default: bool) -> bool {
        match self.present(column) {
            Some(Value::Bool(v)) => *v,
            Some(Value::Int(v)) => *v != 0,
            Some(Value::Float(v)) => *v != 0.0,
            Some(other) => {
                let s = other.to_string().to_lowercase();
                s == "true" || s == "1"
            }
            None => default,
        }
    }

    pub fn get_date(&self, column: &str) -> Option<NaiveDate> {
        match self.present(column)? {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .ok()
                .or_else(|| parse_timestamp(s).map(|ts| ts.date())),
            Value::Int(ms) => from_epoch_millis(*ms).map(|ts| ts.date()),
            _ => None,
        }
    }

    pub fn get_date_or(&self, column: &str, default: NaiveDate) -> NaiveDate {
        self.get_date(column).unwrap_or(default)
    }

    pub fn get_timestamp(&self, column: &str) -> Option<NaiveDateTime> {
        match self.present(column)? {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Text(s) => parse_timestamp(s).or_else(|| {
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }),
            Value::Int(ms) => from_epoch_millis(*ms),
            _ => None,
        }
    }

    pub fn get_timestamp_or(&self, column: &str, default: NaiveDateTime) -> NaiveDateTime {
        self.get_timestamp(column).unwrap_or(default)
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn from_epoch_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (col, val)) in self.columns.iter().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", col, val)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (col, val) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(col, val)?;
        }
        map.end()
    }
}

/// Query result
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time: Duration,
    pub affected_rows: Option<u64>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time: Duration::ZERO,
            affected_rows: None,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
