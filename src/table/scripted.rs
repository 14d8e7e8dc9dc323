//! Declarative tables
//!
//! A `ScriptedTable` carries its upgrade path as data: a list of steps keyed
//! by the version that introduces them. Upgrading from version `v` runs the
//! steps of every version in `(v, desired]`, in order.

use crate::engine::ExecutionEngine;
use crate::error::{Result, SchemaError};
use crate::table::{Table, TableDescriptor};
use crate::tenant::ResolvedTable;
use anyhow::anyhow;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Placeholder replaced by the qualified table name in raw SQL steps
pub const TABLE_PLACEHOLDER: &str = "{table}";

/// One structural change applied during an upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeStep {
    /// `ALTER TABLE .. ADD COLUMN`, skipped if the column already exists
    AddColumn { column: String, definition: String },
    /// `CREATE INDEX IF NOT EXISTS {table}_{index} ON {table} (columns)`
    AddIndex { index: String, columns: String },
    /// Raw SQL; must be safe to run twice
    Sql(String),
}

impl UpgradeStep {
    fn apply(&self, engine: &dyn ExecutionEngine, table: &ResolvedTable) -> anyhow::Result<()> {
        let name = table.qualified_name();
        match self {
            UpgradeStep::AddColumn { column, definition } => {
                if engine.column_exists(name, column)? {
                    debug!("column {}.{} already present", name, column);
                    return Ok(());
                }
                engine.execute_ddl(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    name, column, definition
                ))?;
            }
            UpgradeStep::AddIndex { index, columns } => {
                engine.execute_ddl(&format!(
                    "CREATE INDEX IF NOT EXISTS {}_{} ON {} ({})",
                    name, index, name, columns
                ))?;
            }
            UpgradeStep::Sql(sql) => {
                engine.execute_ddl(&sql.replace(TABLE_PLACEHOLDER, name))?;
            }
        }
        Ok(())
    }
}

/// A table whose upgrade path is a list of [`UpgradeStep`]s
#[derive(Debug, Clone)]
pub struct ScriptedTable {
    descriptor: TableDescriptor,
    steps: BTreeMap<u32, Vec<UpgradeStep>>,
}

impl ScriptedTable {
    pub fn new(descriptor: TableDescriptor) -> Self {
        Self {
            descriptor,
            steps: BTreeMap::new(),
        }
    }

    /// Register `step` as part of upgrading to `version`
    ///
    /// `version` must lie in `1..=desired_version`.
    pub fn with_step(mut self, version: u32, step: UpgradeStep) -> Result<Self> {
        let desired = self.descriptor.desired_version();
        if version == 0 || version > desired {
            return Err(SchemaError::Config(format!(
                "upgrade step for '{}' targets v{} outside 1..={}",
                self.descriptor.name(),
                version,
                desired
            )));
        }
        self.steps.entry(version).or_default().push(step);
        Ok(self)
    }

    /// Steps registered for `version`
    pub fn steps_for(&self, version: u32) -> &[UpgradeStep] {
        self.steps.get(&version).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Table for ScriptedTable {
    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    fn upgrade(
        &self,
        engine: &dyn ExecutionEngine,
        table: &ResolvedTable,
        from_version: u32,
    ) -> anyhow::Result<()> {
        let desired = self.descriptor.desired_version();
        if from_version >= desired {
            return Ok(());
        }

        for (version, steps) in self.steps.range(from_version + 1..=desired) {
            info!(
                "applying {} step(s) for {} v{}",
                steps.len(),
                table.qualified_name(),
                version
            );
            for step in steps {
                step.apply(engine, table).map_err(|e| {
                    anyhow!(
                        "step for v{} on {} failed: {}",
                        version,
                        table.qualified_name(),
                        e
                    )
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseConn;
    use crate::table::TableScope;
    use crate::tenant::{TableNaming, TenantId};

    fn logs_table() -> ScriptedTable {
        let desc = TableDescriptor::new(
            "logs",
            3,
            TableScope::TenantLocal,
            "id INTEGER PRIMARY KEY, message TEXT NOT NULL, level TEXT, created_at INTEGER",
        )
        .unwrap();
        ScriptedTable::new(desc)
            .with_step(
                2,
                UpgradeStep::AddColumn {
                    column: "level".to_string(),
                    definition: "TEXT".to_string(),
                },
            )
            .unwrap()
            .with_step(
                3,
                UpgradeStep::AddColumn {
                    column: "created_at".to_string(),
                    definition: "INTEGER".to_string(),
                },
            )
            .unwrap()
            .with_step(
                3,
                UpgradeStep::AddIndex {
                    index: "level".to_string(),
                    columns: "level".to_string(),
                },
            )
            .unwrap()
    }

    fn resolved(table: &ScriptedTable) -> ResolvedTable {
        ResolvedTable::resolve(
            &TableNaming::default(),
            table.descriptor(),
            TenantId(5),
            String::new(),
        )
    }

    #[test]
    fn test_step_version_bounds() {
        let desc = TableDescriptor::new("logs", 2, TableScope::TenantLocal, "").unwrap();
        let step = UpgradeStep::Sql("SELECT 1".to_string());

        assert!(ScriptedTable::new(desc.clone())
            .with_step(0, step.clone())
            .is_err());
        assert!(ScriptedTable::new(desc.clone())
            .with_step(3, step.clone())
            .is_err());
        let table = ScriptedTable::new(desc).with_step(2, step).unwrap();
        assert_eq!(table.steps_for(2).len(), 1);
        assert!(table.steps_for(1).is_empty());
    }

    #[test]
    fn test_upgrade_from_v1() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let table = logs_table();
        let resolved = resolved(&table);
        db.execute_ddl("CREATE TABLE wp_5_logs (id INTEGER PRIMARY KEY, message TEXT NOT NULL)")
            .unwrap();

        table.upgrade(&db, &resolved, 1).unwrap();

        assert!(db.column_exists("wp_5_logs", "level").unwrap());
        assert!(db.column_exists("wp_5_logs", "created_at").unwrap());
        assert!(db.index_exists("wp_5_logs", "wp_5_logs_level").unwrap());
    }

    #[test]
    fn test_upgrade_is_repeatable() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let table = logs_table();
        let resolved = resolved(&table);
        db.execute_ddl("CREATE TABLE wp_5_logs (id INTEGER PRIMARY KEY, message TEXT NOT NULL)")
            .unwrap();

        table.upgrade(&db, &resolved, 1).unwrap();
        table.upgrade(&db, &resolved, 1).unwrap();
        table.upgrade(&db, &resolved, 2).unwrap();
    }

    #[test]
    fn test_upgrade_skips_older_steps() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let table = logs_table();
        let resolved = resolved(&table);
        // v2 already applied, v3 missing
        db.execute_ddl("CREATE TABLE wp_5_logs (id INTEGER PRIMARY KEY, message TEXT, level TEXT)")
            .unwrap();

        table.upgrade(&db, &resolved, 2).unwrap();
        assert!(db.column_exists("wp_5_logs", "created_at").unwrap());
    }

    #[test]
    fn test_raw_sql_placeholder() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let desc = TableDescriptor::new("notes", 2, TableScope::Global, "id INTEGER").unwrap();
        let table = ScriptedTable::new(desc)
            .with_step(
                2,
                UpgradeStep::Sql("CREATE TABLE IF NOT EXISTS {table}_archive (id INTEGER)".into()),
            )
            .unwrap();
        let resolved = resolved(&table);

        table.upgrade(&db, &resolved, 1).unwrap();
        assert!(db.table_exists("wp_notes_archive").unwrap());
    }

    #[test]
    fn test_failing_step_reports_version() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let desc = TableDescriptor::new("notes", 2, TableScope::Global, "id INTEGER").unwrap();
        let table = ScriptedTable::new(desc)
            .with_step(2, UpgradeStep::Sql("ALTER TABLE {table} BOGUS".into()))
            .unwrap();
        let resolved = resolved(&table);

        let err = table.upgrade(&db, &resolved, 1).unwrap_err();
        assert!(err.to_string().contains("step for v2 on wp_notes failed"));
    }
}
