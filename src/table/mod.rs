//! Table definitions
//!
//! A concrete table supplies its [`TableDescriptor`] and an upgrade procedure
//! through the [`Table`] trait. [`ScriptedTable`] is a ready-made
//! implementation driven by declarative upgrade steps.

mod descriptor;
mod scripted;

pub use descriptor::{sanitize_key, TableDescriptor, TableScope};
pub use scripted::{ScriptedTable, UpgradeStep};

use crate::engine::ExecutionEngine;
use crate::tenant::ResolvedTable;

/// Capabilities of one concrete table
pub trait Table {
    /// Static definition of the table
    fn descriptor(&self) -> &TableDescriptor;

    /// Column/index/constraint text passed verbatim into CREATE
    fn schema_definition(&self) -> &str {
        self.descriptor().schema_definition()
    }

    /// Bring an existing table from `from_version` up to the desired version
    ///
    /// `from_version` may be several versions behind, or 0 when the table
    /// exists but no version was ever persisted. The same call can run more
    /// than once before the new version is persisted, so every step must be
    /// safe to repeat.
    fn upgrade(
        &self,
        engine: &dyn ExecutionEngine,
        table: &ResolvedTable,
        from_version: u32,
    ) -> anyhow::Result<()>;
}
