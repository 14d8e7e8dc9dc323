//! Error types for table lifecycle operations
//!
//! Every failure leaves the persisted version untouched, so calling the same
//! operation again (e.g. on the next admin page load) is the retry mechanism.

use thiserror::Error;

/// Errors surfaced by descriptors, the lifecycle controller and host hooks
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The table descriptor is invalid. Raised before any database access.
    #[error("Invalid table definition: {0}")]
    Config(String),

    /// The version store could not be read or written
    #[error("Version store unavailable for '{key}': {source}")]
    StoreUnavailable {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A CREATE was issued but the table is still absent afterwards
    #[error("Table '{table}' does not exist after CREATE")]
    CreateFailed { table: String },

    /// A concrete table's upgrade procedure failed
    #[error("Upgrade of '{table}' from v{from} failed: {source}")]
    Upgrade {
        table: String,
        from: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The execution engine rejected a statement or an existence check
    #[error("Execution engine error on '{table}': {source}")]
    Engine {
        table: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SchemaError {
    pub(crate) fn store(key: &str, source: anyhow::Error) -> Self {
        SchemaError::StoreUnavailable {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn engine(table: &str, source: anyhow::Error) -> Self {
        SchemaError::Engine {
            table: table.to_string(),
            source,
        }
    }
}

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_upgrade_error_keeps_source() {
        let err = SchemaError::Upgrade {
            table: "wp_logs".to_string(),
            from: 1,
            source: anyhow!("column clash"),
        };

        assert_eq!(
            err.to_string(),
            "Upgrade of 'wp_logs' from v1 failed: column clash"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source, Some("column clash".to_string()));
    }

    #[test]
    fn test_store_error_message() {
        let err = SchemaError::store("logs_table_version", anyhow!("disk I/O error"));
        assert!(matches!(err, SchemaError::StoreUnavailable { .. }));
        assert!(err.to_string().contains("logs_table_version"));
    }
}
