//! Core database infrastructure
//!
//! - `DatabaseConn`: SQLite connection wrapper, the default execution engine
//! - `SchemaManager`: creation of the version bookkeeping table

mod connection;
mod schema;

pub use connection::DatabaseConn;
pub use schema::{SchemaDefinitions, SchemaManager, VERSIONS_TABLE_NAME};
