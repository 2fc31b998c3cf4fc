//! Database module: driver abstraction plus SQLite and MySQL backends

pub mod dialect;
mod driver;
pub mod mysql;
mod query;
mod schema;
pub mod sqlite;
mod value;

pub use dialect::Dialect;
pub use driver::*;
pub use query::*;
pub use schema::*;
pub use value::*;
