//! Static table definitions
//!
//! A [`TableDescriptor`] is built once by the concrete table and never changes
//! afterwards. Validation happens here so that an invalid definition fails
//! before any database interaction.

use crate::error::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix appended to the table name to derive the default version key
const VERSION_KEY_SUFFIX: &str = "_table_version";

/// Where a table lives in a multi-tenant installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableScope {
    /// One instance shared by every tenant
    #[serde(rename = "global", alias = "shared")]
    Global,
    /// One instance per tenant
    #[serde(rename = "tenant", alias = "tenant-local")]
    TenantLocal,
}

impl TableScope {
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl fmt::Display for TableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::TenantLocal => write!(f, "tenant"),
        }
    }
}

impl FromStr for TableScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" | "shared" => Ok(Self::Global),
            "tenant" | "tenant-local" | "local" => Ok(Self::TenantLocal),
            _ => Err(format!(
                "Unknown table scope '{}'. Valid scopes: global, tenant",
                s
            )),
        }
    }
}

/// Reduce a string to a safe identifier: lowercase ASCII letters, digits and `_`
///
/// ```
/// use sitetables::table::sanitize_key;
///
/// assert_eq!(sanitize_key("Audit-Log"), "auditlog");
/// assert_eq!(sanitize_key("user_meta2"), "user_meta2");
/// ```
pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Immutable definition of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    name: String,
    desired_version: u32,
    scope: TableScope,
    schema_definition: String,
    version_key: String,
}

impl TableDescriptor {
    /// Create a descriptor, sanitizing the name and validating the version
    ///
    /// Fails with [`SchemaError::Config`] if the sanitized name is empty or
    /// the desired version is zero.
    pub fn new(
        name: &str,
        desired_version: u32,
        scope: TableScope,
        schema_definition: impl Into<String>,
    ) -> Result<Self> {
        let name = sanitize_key(name);
        if name.is_empty() {
            return Err(SchemaError::Config(
                "table name is empty after sanitizing".to_string(),
            ));
        }
        if desired_version == 0 {
            return Err(SchemaError::Config(format!(
                "table '{}' must have a desired version above 0",
                name
            )));
        }

        let version_key = format!("{}{}", name, VERSION_KEY_SUFFIX);
        Ok(Self {
            name,
            desired_version,
            scope,
            schema_definition: schema_definition.into(),
            version_key,
        })
    }

    /// Override the key the persisted version is stored under
    pub fn with_version_key(mut self, key: &str) -> Result<Self> {
        let key = sanitize_key(key);
        if key.is_empty() {
            return Err(SchemaError::Config(format!(
                "version key for table '{}' is empty after sanitizing",
                self.name
            )));
        }
        self.version_key = key;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desired_version(&self) -> u32 {
        self.desired_version
    }

    pub fn scope(&self) -> TableScope {
        self.scope
    }

    pub fn schema_definition(&self) -> &str {
        &self.schema_definition
    }

    pub fn version_key(&self) -> &str {
        &self.version_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Logs"), "logs");
        assert_eq!(sanitize_key("my-table name!"), "mytablename");
        assert_eq!(sanitize_key("édition_2"), "dition_2");
        assert_eq!(sanitize_key("--"), "");
    }

    #[test]
    fn test_new_descriptor() {
        let desc =
            TableDescriptor::new("Logs", 3, TableScope::TenantLocal, "id INTEGER").unwrap();

        assert_eq!(desc.name(), "logs");
        assert_eq!(desc.desired_version(), 3);
        assert_eq!(desc.scope(), TableScope::TenantLocal);
        assert_eq!(desc.schema_definition(), "id INTEGER");
        assert_eq!(desc.version_key(), "logs_table_version");
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = TableDescriptor::new("!!!", 1, TableScope::Global, "").unwrap_err();
        assert!(matches!(err, SchemaError::Config(_)));
    }

    #[test]
    fn test_zero_version_rejected() {
        let err = TableDescriptor::new("registry", 0, TableScope::Global, "").unwrap_err();
        assert!(matches!(err, SchemaError::Config(_)));
    }

    #[test]
    fn test_custom_version_key() {
        let desc = TableDescriptor::new("registry", 1, TableScope::Global, "")
            .unwrap()
            .with_version_key("Registry_DB_Version")
            .unwrap();
        assert_eq!(desc.version_key(), "registry_db_version");

        let err = TableDescriptor::new("registry", 1, TableScope::Global, "")
            .unwrap()
            .with_version_key("  ")
            .unwrap_err();
        assert!(matches!(err, SchemaError::Config(_)));
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("global".parse::<TableScope>(), Ok(TableScope::Global));
        assert_eq!("Tenant".parse::<TableScope>(), Ok(TableScope::TenantLocal));
        assert!("site".parse::<TableScope>().is_err());
        assert_eq!(TableScope::TenantLocal.to_string(), "tenant");
    }
}
