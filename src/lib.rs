#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Sitetables - per-table schema lifecycle for multi-tenant installations
//!
//! Sitetables tracks each table's persisted schema version against the
//! version the deployed code expects, creates or upgrades the physical table
//! when it falls behind, and keeps table names consistent across tenant
//! ("site") boundaries.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (always) | Controller, hooks, SQLite engine and version store | `rusqlite` |
//! | `display` | Table formatting of status rows | `tabled` |
//! | `cli` | `sitetables` binary | `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`table`]**: `TableDescriptor` and the `Table` capability trait
//! - **[`tenant`]**: tenant-aware name resolution (`ResolvedTable`)
//! - **[`controller`]**: `LifecycleController`, the create-or-upgrade decision engine
//! - **[`hooks`]**: `HostHooks`, inbound activation / tenant-switch / admin-init triggers
//! - **[`engine`]**: collaborator traits for the SQL engine and version store
//! - **[`database`]**: SQLite implementations of those traits
//! - **[`manifest`]**: tables declared in TOML
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sitetables::*;
//!
//! let db = DatabaseConn::open_path("/var/lib/app/app.sqlite3")?;
//! let store = SqliteVersionStore::new(&db.conn)?;
//!
//! let logs = TableDescriptor::new("logs", 3, TableScope::TenantLocal, "id INTEGER PRIMARY KEY, message TEXT")?;
//! let controller = LifecycleController::new(
//!     ScriptedTable::new(logs),
//!     TableNaming::default(),
//!     UpgradePolicy::default(),
//! );
//!
//! let mut hooks = HostHooks::new(&db, &store, TenantId(1));
//! hooks.register(controller)?;
//! hooks.on_activate();
//!
//! hooks.on_tenant_switch(TenantId(5))?;
//! for run in hooks.on_admin_init() {
//!     println!("{}: {:?}", run.table, run.result);
//! }
//! ```

pub mod config;
pub mod controller;
pub mod database;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod output;
pub mod table;
pub mod tenant;

pub use config::SiteTablesConfig;
pub use controller::{
    GlobalUpgradePolicy, LifecycleController, TableState, TableStatus, UpgradeOutcome,
    UpgradePolicy,
};
pub use database::{DatabaseConn, SqliteVersionStore};
pub use engine::{ExecutionEngine, VersionScope, VersionStore};
pub use error::SchemaError;
pub use hooks::{HostHooks, ManagedTable, TableRun};
pub use manifest::TableManifest;
pub use output::OutputFormat;
pub use table::{ScriptedTable, Table, TableDescriptor, TableScope, UpgradeStep};
pub use tenant::{ResolvedTable, TableNaming, TenantId};
