//! Collaborator interfaces
//!
//! The lifecycle controller never owns a connection or a store. It borrows an
//! [`ExecutionEngine`] and a [`VersionStore`] for the duration of each call.
//! SQLite implementations live in [`crate::database`].

use crate::tenant::TenantId;
use anyhow::Result;
use std::fmt;

/// SQL execution engine holding the physical tables
pub trait ExecutionEngine {
    /// Whether `table` exists as a physical table
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Run a CREATE/ALTER/DROP statement, returning the number of changes the
    /// engine reports (zero is a valid outcome)
    fn execute_ddl(&self, statement: &str) -> Result<usize>;

    /// Connection-level charset/collation clause appended to CREATE statements
    ///
    /// Engines without such a notion return an empty string.
    fn charset_collation(&self) -> Result<String> {
        Ok(String::new())
    }

    /// Whether `column` exists on `table`
    fn column_exists(&self, table: &str, column: &str) -> Result<bool>;

    /// Whether an index named `index` exists on `table`
    fn index_exists(&self, table: &str, index: &str) -> Result<bool>;

    /// Number of rows in `table`
    fn count_rows(&self, table: &str) -> Result<u64>;
}

/// Scope a persisted version is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionScope {
    /// Shared by the whole installation (global tables)
    Installation,
    /// Private to one tenant (tenant-local tables)
    Tenant(TenantId),
}

impl fmt::Display for VersionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installation => write!(f, "installation"),
            Self::Tenant(id) => write!(f, "tenant:{}", id),
        }
    }
}

/// Key/value store holding persisted schema versions
pub trait VersionStore {
    /// Stored version under `key`, `None` if never written
    fn get_version(&self, scope: VersionScope, key: &str) -> Result<Option<u32>>;

    /// Store `version` under `key`
    fn set_version(&self, scope: VersionScope, key: &str, version: u32) -> Result<()>;

    /// Forget the version stored under `key`
    fn delete_version(&self, scope: VersionScope, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_display() {
        assert_eq!(VersionScope::Installation.to_string(), "installation");
        assert_eq!(VersionScope::Tenant(TenantId(5)).to_string(), "tenant:5");
    }
}
