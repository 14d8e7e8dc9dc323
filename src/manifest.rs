//! Table manifests
//!
//! A manifest declares tables and their upgrade steps in TOML, so an
//! installation can be managed without writing a `Table` implementation:
//!
//! ```toml
//! [[tables]]
//! name = "logs"
//! version = 3
//! scope = "tenant"
//! schema = "id INTEGER PRIMARY KEY, message TEXT NOT NULL, level TEXT, created_at INTEGER"
//!
//! [[tables.upgrades]]
//! version = 2
//! add_column = { column = "level", definition = "TEXT" }
//!
//! [[tables.upgrades]]
//! version = 3
//! add_index = { index = "level", columns = "level" }
//! ```

use crate::error::SchemaError;
use crate::table::{ScriptedTable, Table, TableDescriptor, TableScope, UpgradeStep};
use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Top-level manifest document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableManifest {
    #[serde(default)]
    pub tables: Vec<TableEntry>,
}

/// One `[[tables]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub version: u32,
    /// `global` or `tenant`
    pub scope: String,
    pub schema: String,
    #[serde(default)]
    pub version_key: Option<String>,
    #[serde(default)]
    pub upgrades: Vec<UpgradeEntry>,
}

/// One `[[tables.upgrades]]` entry; exactly one action must be set
#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeEntry {
    pub version: u32,
    #[serde(default)]
    pub add_column: Option<ColumnEntry>,
    #[serde(default)]
    pub add_index: Option<IndexEntry>,
    #[serde(default)]
    pub sql: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnEntry {
    pub column: String,
    pub definition: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub index: String,
    pub columns: String,
}

impl UpgradeEntry {
    fn to_step(&self, table: &str) -> Result<UpgradeStep, SchemaError> {
        let mut steps = Vec::new();
        if let Some(c) = &self.add_column {
            steps.push(UpgradeStep::AddColumn {
                column: c.column.clone(),
                definition: c.definition.clone(),
            });
        }
        if let Some(i) = &self.add_index {
            steps.push(UpgradeStep::AddIndex {
                index: i.index.clone(),
                columns: i.columns.clone(),
            });
        }
        if let Some(sql) = &self.sql {
            steps.push(UpgradeStep::Sql(sql.clone()));
        }

        match steps.len() {
            1 => Ok(steps.remove(0)),
            n => Err(SchemaError::Config(format!(
                "upgrade entry v{} of '{}' must set exactly one of add_column, add_index, sql (found {})",
                self.version, table, n
            ))),
        }
    }
}

impl TableEntry {
    fn to_table(&self) -> Result<ScriptedTable, SchemaError> {
        let scope: TableScope = self.scope.parse().map_err(SchemaError::Config)?;
        let mut descriptor = TableDescriptor::new(&self.name, self.version, scope, &self.schema)?;
        if let Some(key) = &self.version_key {
            descriptor = descriptor.with_version_key(key)?;
        }

        let mut table = ScriptedTable::new(descriptor);
        for upgrade in &self.upgrades {
            let step = upgrade.to_step(&self.name)?;
            table = table.with_step(upgrade.version, step)?;
        }
        Ok(table)
    }
}

impl TableManifest {
    /// Load a manifest file (format picked from the extension, TOML by default)
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(anyhow!("Manifest file '{}' does not exist", path));
        }
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()
            .map_err(|e| anyhow!("Failed to read manifest '{}': {}", path, e))?;
        settings
            .try_deserialize::<TableManifest>()
            .map_err(|e| anyhow!("Failed to parse manifest '{}': {}", path, e))
    }

    /// Parse a manifest from TOML text
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| anyhow!("Failed to read manifest: {}", e))?;
        settings
            .try_deserialize::<TableManifest>()
            .map_err(|e| anyhow!("Failed to parse manifest: {}", e))
    }

    /// Build the declared tables, validating every descriptor and step
    pub fn tables(&self) -> Result<Vec<ScriptedTable>, SchemaError> {
        let mut seen = HashSet::new();
        let mut tables = Vec::with_capacity(self.tables.len());
        for entry in &self.tables {
            let table = entry.to_table()?;
            let name = table.descriptor().name().to_string();
            if !seen.insert(name.clone()) {
                return Err(SchemaError::Config(format!(
                    "table '{}' declared more than once",
                    name
                )));
            }
            tables.push(table);
        }
        Ok(tables)
    }
}
