//! Tenant-aware table naming
//!
//! Table names are a pure function of the active tenant and the descriptor:
//!
//! ```text
//! scope        tenant      qualified name
//! Global       any         {base_prefix}{name}
//! TenantLocal  primary     {base_prefix}{name}
//! TenantLocal  N           {base_prefix}{N}_{name}
//! ```
//!
//! Resolution returns a fresh [`ResolvedTable`] value instead of registering
//! the name on a shared handle, so tables never see each other's state.

use crate::table::{sanitize_key, TableDescriptor, TableScope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default installation table prefix
pub const DEFAULT_BASE_PREFIX: &str = "wp_";

/// Identifier of a tenant ("site") within one installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u64);

impl TenantId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = String;

    /// Accepts `5` as well as `site5`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("site").unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(TenantId)
            .map_err(|_| format!("Invalid tenant id '{}'", s))
    }
}

impl From<u64> for TenantId {
    fn from(id: u64) -> Self {
        TenantId(id)
    }
}

/// Installation-wide naming rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNaming {
    base_prefix: String,
    primary_tenant: TenantId,
}

impl Default for TableNaming {
    fn default() -> Self {
        Self {
            base_prefix: DEFAULT_BASE_PREFIX.to_string(),
            primary_tenant: TenantId(1),
        }
    }
}

impl TableNaming {
    pub fn new(base_prefix: &str, primary_tenant: TenantId) -> Self {
        Self {
            base_prefix: sanitize_key(base_prefix),
            primary_tenant,
        }
    }

    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    pub fn primary_tenant(&self) -> TenantId {
        self.primary_tenant
    }

    pub fn is_primary(&self, tenant: TenantId) -> bool {
        tenant == self.primary_tenant
    }

    /// Prefix used for tenant-local tables of `tenant`
    pub fn tenant_prefix(&self, tenant: TenantId) -> String {
        if self.is_primary(tenant) {
            self.base_prefix.clone()
        } else {
            format!("{}{}_", self.base_prefix, tenant)
        }
    }

    /// Fully-qualified table name for `descriptor` while `tenant` is active
    pub fn qualified_name(&self, descriptor: &TableDescriptor, tenant: TenantId) -> String {
        match descriptor.scope() {
            TableScope::Global => format!("{}{}", self.base_prefix, descriptor.name()),
            TableScope::TenantLocal => {
                format!("{}{}", self.tenant_prefix(tenant), descriptor.name())
            }
        }
    }
}

/// A table name bound to the active tenant and connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTable {
    qualified_name: String,
    tenant: TenantId,
    scope: TableScope,
    charset_collation: String,
}

impl ResolvedTable {
    /// Resolve `descriptor` for `tenant`
    ///
    /// `charset_collation` is the connection's current default clause and is
    /// taken fresh on every resolution.
    pub fn resolve(
        naming: &TableNaming,
        descriptor: &TableDescriptor,
        tenant: TenantId,
        charset_collation: String,
    ) -> Self {
        Self {
            qualified_name: naming.qualified_name(descriptor, tenant),
            tenant,
            scope: descriptor.scope(),
            charset_collation,
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Tenant that was active when this name was resolved
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn scope(&self) -> TableScope {
        self.scope
    }

    pub fn charset_collation(&self) -> &str {
        &self.charset_collation
    }

    /// CREATE statement for this table with the given column definition
    pub fn create_statement(&self, schema_definition: &str) -> String {
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.qualified_name,
            schema_definition.trim()
        );
        if !self.charset_collation.trim().is_empty() {
            sql.push(' ');
            sql.push_str(self.charset_collation.trim());
        }
        sql
    }
}

impl fmt::Display for ResolvedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs() -> TableDescriptor {
        TableDescriptor::new("logs", 3, TableScope::TenantLocal, "id INTEGER").unwrap()
    }

    fn registry() -> TableDescriptor {
        TableDescriptor::new("registry", 1, TableScope::Global, "id INTEGER").unwrap()
    }

    #[test]
    fn test_tenant_local_names() {
        let naming = TableNaming::default();

        assert_eq!(naming.qualified_name(&logs(), TenantId(1)), "wp_logs");
        assert_eq!(naming.qualified_name(&logs(), TenantId(5)), "wp_5_logs");
    }

    #[test]
    fn test_global_names_ignore_tenant() {
        let naming = TableNaming::default();

        assert_eq!(naming.qualified_name(&registry(), TenantId(1)), "wp_registry");
        assert_eq!(naming.qualified_name(&registry(), TenantId(9)), "wp_registry");
    }

    #[test]
    fn test_custom_primary_tenant() {
        let naming = TableNaming::new("App_", TenantId(7));

        assert_eq!(naming.base_prefix(), "app_");
        assert_eq!(naming.qualified_name(&logs(), TenantId(7)), "app_logs");
        assert_eq!(naming.qualified_name(&logs(), TenantId(1)), "app_1_logs");
    }

    #[test]
    fn test_resolution_round_trip_between_tenants() {
        let naming = TableNaming::default();
        let desc = logs();

        let a = ResolvedTable::resolve(&naming, &desc, TenantId(2), String::new());
        let b = ResolvedTable::resolve(&naming, &desc, TenantId(3), String::new());
        let a_again = ResolvedTable::resolve(&naming, &desc, TenantId(2), String::new());

        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_create_statement() {
        let naming = TableNaming::default();
        let plain = ResolvedTable::resolve(&naming, &logs(), TenantId(5), String::new());
        assert_eq!(
            plain.create_statement(" id INTEGER "),
            "CREATE TABLE IF NOT EXISTS wp_5_logs (id INTEGER)"
        );

        let mysql = ResolvedTable::resolve(
            &naming,
            &logs(),
            TenantId(5),
            "DEFAULT CHARACTER SET utf8mb4".to_string(),
        );
        assert_eq!(
            mysql.create_statement("id INTEGER"),
            "CREATE TABLE IF NOT EXISTS wp_5_logs (id INTEGER) DEFAULT CHARACTER SET utf8mb4"
        );
    }

    #[test]
    fn test_tenant_id_parsing() {
        assert_eq!("5".parse::<TenantId>(), Ok(TenantId(5)));
        assert_eq!("site5".parse::<TenantId>(), Ok(TenantId(5)));
        assert!("five".parse::<TenantId>().is_err());
    }
}
