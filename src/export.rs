//! Export functionality for query results

use crate::db::QueryResult;
use crate::error::Result;
use std::path::Path;

/// Write results to a CSV file
pub fn write_csv(result: &QueryResult, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let headers: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    wtr.write_record(&headers)?;
    for row in &result.rows {
        let record: Vec<String> = row.values().iter().map(|c| c.to_string()).collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write results to a JSON file as an array of objects
pub fn write_json(result: &QueryResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&result.rows)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, Row, Value};

    fn sample() -> QueryResult {
        let rows = vec![
            Row::from_pairs([("id", Value::Int(1)), ("name", Value::Text("a,b".into()))]),
            Row::from_pairs([("id", Value::Int(2)), ("name", Value::Null)]),
        ];
        QueryResult {
            columns: vec![
                ColumnInfo { name: "id".into(), type_name: "INTEGER".into() },
                ColumnInfo { name: "name".into(), type_name: "TEXT".into() },
            ],
            row_count: rows.len(),
            rows,
            ..QueryResult::empty()
        }
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&sample(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,name\n1,\"a,b\"\n2,NULL\n");
    }

    #[test]
    fn test_write_csv_empty_result_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let empty = QueryResult {
            rows: Vec::new(),
            row_count: 0,
            ..sample()
        };
        write_csv(&empty, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,name\n");
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&sample(), &path).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed[0]["name"], "a,b");
        assert!(parsed[1]["name"].is_null());
    }
}
