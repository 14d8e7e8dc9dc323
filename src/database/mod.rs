//! Database module
//!
//! SQLite implementations of the collaborator interfaces in [`crate::engine`]:
//!
//! ```text
//! database/
//! ├── core/            # Foundation
//! │   ├── connection   # DatabaseConn, the SQLite ExecutionEngine
//! │   └── schema       # version bookkeeping table definitions
//! │
//! └── version_store    # SqliteVersionStore, the SQLite VersionStore
//! ```
//!
//! Both usually share one connection: the store keeps its bookkeeping table
//! next to the tables it tracks.
//!
//! ```rust,ignore
//! use sitetables::database::{DatabaseConn, SqliteVersionStore};
//!
//! let db = DatabaseConn::open_path("/var/lib/app/sitetables.sqlite3")?;
//! let store = SqliteVersionStore::new(&db.conn)?;
//! ```

pub mod core;
mod version_store;

pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, VERSIONS_TABLE_NAME};
pub use version_store::{SqliteVersionStore, VersionRecord};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
