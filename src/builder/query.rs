//! Fluent SELECT / COUNT building

use crate::db::{Dialect, Row, Value};
use crate::error::Result;
use crate::manager::DbManager;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Joiner {
    And,
    Or,
}

#[derive(Clone, Debug)]
struct Condition {
    joiner: Joiner,
    column: String,
    operator: &'static str,
    value: Value,
}

/// Builds a query against one table.
///
/// Conditions are joined left to right exactly as added, without grouping, so
/// `where_eq(a).or_where(b).where_eq(c)` yields `a = ? OR b = ? AND c = ?`.
#[derive(Clone)]
pub struct QueryBuilder {
    db: DbManager,
    table: String,
    conditions: Vec<Condition>,
    order_by: Option<(String, bool)>,
    limit: Option<(u64, Option<u64>)>,
}

impl QueryBuilder {
    pub fn new(db: DbManager, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            conditions: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    fn condition(mut self, joiner: Joiner, column: &str, operator: &'static str, value: Value) -> Self {
        self.conditions.push(Condition {
            joiner,
            column: column.to_string(),
            operator,
            value,
        });
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.condition(Joiner::And, column, "=", value.into())
    }

    /// `value` carries its own `%` wildcards
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.condition(Joiner::And, column, "LIKE", pattern.into())
    }

    pub fn where_greater_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.condition(Joiner::And, column, ">", value.into())
    }

    pub fn where_less_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.condition(Joiner::And, column, "<", value.into())
    }

    pub fn or_where(self, column: &str, value: impl Into<Value>) -> Self {
        self.condition(Joiner::Or, column, "=", value.into())
    }

    /// Replaces any earlier ordering
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order_by = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some((limit, None));
        self
    }

    pub fn limit_offset(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some((limit, Some(offset)));
        self
    }

    /// SQL text and its parameters. The count form ignores ordering and limits.
    pub fn build_sql(&self, count: bool) -> Result<(String, Vec<Value>)> {
        let dialect: Dialect = self.db.dialect();
        let mut sql = if count {
            String::from("SELECT COUNT(*) FROM ")
        } else {
            String::from("SELECT * FROM ")
        };
        sql.push_str(&dialect.quote_identifier(&self.table)?);

        let mut params = Vec::with_capacity(self.conditions.len());
        for (i, cond) in self.conditions.iter().enumerate() {
            sql.push_str(match (i, cond.joiner) {
                (0, _) => " WHERE ",
                (_, Joiner::And) => " AND ",
                (_, Joiner::Or) => " OR ",
            });
            sql.push_str(&dialect.quote_identifier(&cond.column)?);
            sql.push(' ');
            sql.push_str(cond.operator);
            sql.push_str(" ?");
            params.push(cond.value.clone());
        }

        if !count {
            if let Some((column, ascending)) = &self.order_by {
                sql.push_str(" ORDER BY ");
                sql.push_str(&dialect.quote_identifier(column)?);
                sql.push_str(if *ascending { " ASC" } else { " DESC" });
            }
            if let Some((limit, offset)) = self.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
                if let Some(offset) = offset {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
            }
        }

        Ok((sql, params))
    }

    /// First matching row
    pub async fn first(&self) -> Result<Option<Row>> {
        let query = if self.limit.is_none() {
            self.clone().limit(1)
        } else {
            self.clone()
        };
        Ok(query.get().await?.into_iter().next())
    }

    /// All matching rows
    pub async fn get(&self) -> Result<Vec<Row>> {
        let (sql, params) = self.build_sql(false)?;
        Ok(self.db.execute_query(&sql, &params).await?.into_rows())
    }

    pub async fn count(&self) -> Result<i64> {
        let (sql, params) = self.build_sql(true)?;
        let result = self.db.execute_query(&sql, &params).await?;
        Ok(result
            .first()
            .and_then(|row| row.values().first())
            .map(|v| match v {
                Value::Int(n) => *n,
                other => other.to_string().parse().unwrap_or(0),
            })
            .unwrap_or(0))
    }
}
