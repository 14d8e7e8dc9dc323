//! SQLite-backed version store
//!
//! Persists one version number per (scope, key). Writes never lower a stored
//! version, so racing upgrades of the same table converge on the highest one.

use crate::database::core::{SchemaDefinitions, SchemaManager};
use crate::engine::{VersionScope, VersionStore};
use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

/// Repository for persisted table versions
pub struct SqliteVersionStore<'a> {
    conn: &'a Connection,
}

/// A row of the versions table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub scope: String,
    pub key: String,
    pub version: u32,
    pub updated_at: u64,
}

impl<'a> SqliteVersionStore<'a> {
    /// Create the store, making sure the bookkeeping table exists
    pub fn new(conn: &'a Connection) -> Result<Self> {
        SchemaManager::new(conn).initialize()?;
        Ok(Self { conn })
    }

    /// List every persisted version, ordered by scope and key
    pub fn list(&self) -> Result<Vec<VersionRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT scope, key, version, updated_at FROM sitetables_versions ORDER BY scope, key",
            )
            .map_err(|e| anyhow!("Failed to prepare version listing: {}", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(VersionRecord {
                    scope: row.get(0)?,
                    key: row.get(1)?,
                    version: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })
            .map_err(|e| anyhow!("Failed to list versions: {}", e))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| anyhow!("Failed to read version row: {}", e))?);
        }
        Ok(records)
    }
}

impl VersionStore for SqliteVersionStore<'_> {
    fn get_version(&self, scope: VersionScope, key: &str) -> Result<Option<u32>> {
        let result: Result<u32, _> = self.conn.query_row(
            "SELECT version FROM sitetables_versions WHERE scope = ?1 AND key = ?2",
            params![scope.to_string(), key],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(Some(version)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get version '{}' ({}): {}", key, scope, e)),
        }
    }

    fn set_version(&self, scope: VersionScope, key: &str, version: u32) -> Result<()> {
        self.conn
            .execute(
                SchemaDefinitions::UPSERT_VERSION,
                params![scope.to_string(), key, version],
            )
            .map_err(|e| anyhow!("Failed to set version '{}' ({}): {}", key, scope, e))?;
        Ok(())
    }

    fn delete_version(&self, scope: VersionScope, key: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM sitetables_versions WHERE scope = ?1 AND key = ?2",
                params![scope.to_string(), key],
            )
            .map_err(|e| anyhow!("Failed to delete version '{}' ({}): {}", key, scope, e))?;
        Ok(())
    }
}
