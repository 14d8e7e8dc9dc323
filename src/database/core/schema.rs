//! Version store schema
//!
//! The persisted table versions live in a single bookkeeping table keyed by
//! scope and version key. Installation-wide versions use the scope
//! `installation`, tenant versions use `tenant:<id>`.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Name of the bookkeeping table holding persisted versions
pub const VERSIONS_TABLE_NAME: &str = "sitetables_versions";

/// Schema definitions for the version store
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the versions table
    pub const VERSIONS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS sitetables_versions (
            scope TEXT NOT NULL,
            key TEXT NOT NULL,
            version INTEGER NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (scope, key)
        );
    "#;

    /// Upsert that never lowers an already stored version
    pub const UPSERT_VERSION: &'static str = r#"
        INSERT INTO sitetables_versions (scope, key, version, updated_at)
        VALUES (?1, ?2, ?3, strftime('%s', 'now'))
        ON CONFLICT (scope, key) DO UPDATE SET
            version = MAX(version, excluded.version),
            updated_at = excluded.updated_at
    "#;
}

/// Creates and inspects the bookkeeping schema
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create the versions table if it doesn't exist
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::VERSIONS_TABLE, [])
            .map_err(|e| anyhow!("Failed to create {} table: {}", VERSIONS_TABLE_NAME, e))?;
        Ok(())
    }

    /// Check whether the versions table exists
    pub fn is_initialized(&self) -> Result<bool> {
        let exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [VERSIONS_TABLE_NAME],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to inspect schema: {}", e))?;
        Ok(exists > 0)
    }

    /// Drop the versions table, forgetting every persisted version
    pub fn reset(&self) -> Result<()> {
        self.conn
            .execute("DROP TABLE IF EXISTS sitetables_versions", [])
            .map_err(|e| anyhow!("Failed to drop {} table: {}", VERSIONS_TABLE_NAME, e))?;
        Ok(())
    }
}
