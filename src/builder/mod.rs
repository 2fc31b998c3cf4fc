//! Fluent builders for creating tables, inserting rows and querying

mod insert;
mod query;
mod table;

pub use insert::InsertBuilder;
pub use query::QueryBuilder;
pub use table::TableBuilder;
