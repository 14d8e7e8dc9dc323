//! Per-table lifecycle controller
//!
//! The controller binds one [`Table`] to the active tenant, tracks the
//! persisted schema version, and decides between CREATE and upgrade:
//!
//! ```text
//! UNKNOWN --initialize--> CHECKED(v) --maybe_upgrade, v < desired--> UPGRADING --> CHECKED(desired)
//!    ^                                                                                 |
//!    +-------------------- tenant switch (tenant-local tables only) -------------------+
//! ```
//!
//! No lock is taken. Two requests may run the same create/upgrade at once, so
//! DDL has to be idempotent (`CREATE TABLE IF NOT EXISTS`, guarded ALTERs),
//! and every failure leaves the persisted version where it was so the next
//! call retries.

use crate::engine::{ExecutionEngine, VersionScope, VersionStore};
use crate::error::{Result, SchemaError};
use crate::table::{Table, TableScope};
use crate::tenant::{ResolvedTable, TableNaming, TenantId};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Suffix of the installation-wide key recording a deferred global upgrade
pub const DEFERRED_KEY_SUFFIX: &str = "_deferred";

/// When global tables may be created or upgraded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlobalUpgradePolicy {
    /// In any tenant context
    Always,
    /// Only while the primary tenant is active
    #[default]
    PrimaryOnly,
    /// Never from this process; global tables are managed elsewhere
    Never,
}

impl GlobalUpgradePolicy {
    pub fn allows(&self, naming: &TableNaming, tenant: TenantId) -> bool {
        match self {
            Self::Always => true,
            Self::PrimaryOnly => naming.is_primary(tenant),
            Self::Never => false,
        }
    }
}

impl fmt::Display for GlobalUpgradePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::PrimaryOnly => write!(f, "primary-only"),
            Self::Never => write!(f, "never"),
        }
    }
}

impl FromStr for GlobalUpgradePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "primary-only" | "primary_only" | "primary" => Ok(Self::PrimaryOnly),
            "never" => Ok(Self::Never),
            _ => Err(format!(
                "Unknown global upgrade policy '{}'. Valid policies: always, primary-only, never",
                s
            )),
        }
    }
}

/// Deployment policy applied by [`LifecycleController::maybe_upgrade`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradePolicy {
    pub global_upgrades: GlobalUpgradePolicy,
    /// Write `<version_key>_deferred` when a global upgrade is deferred
    pub record_deferrals: bool,
}

/// Lifecycle state of one table in the active tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Unknown,
    Checked(u32),
    Upgrading,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Checked(v) => write!(f, "checked(v{})", v),
            Self::Upgrading => write!(f, "upgrading"),
        }
    }
}

/// Result of a successful [`LifecycleController::maybe_upgrade`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpgradeOutcome {
    /// Persisted version already at or above the desired version
    UpToDate,
    /// Global table outside an allowed context; nothing was done
    Deferred,
    /// Table was absent and has been created
    Created { changes: usize },
    /// Existing table was upgraded
    Upgraded { from: u32, to: u32 },
}

impl fmt::Display for UpgradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "up to date"),
            Self::Deferred => write!(f, "deferred"),
            Self::Created { .. } => write!(f, "created"),
            Self::Upgraded { from, to } => write!(f, "upgraded v{} -> v{}", from, to),
        }
    }
}

/// Snapshot of a controller, for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct TableStatus {
    pub table: String,
    pub qualified_name: String,
    pub scope: TableScope,
    pub tenant: String,
    pub persisted_version: u32,
    pub desired_version: u32,
    pub state: String,
}

/// Create-or-upgrade decision engine for one table
pub struct LifecycleController<T: Table> {
    table: T,
    naming: TableNaming,
    policy: UpgradePolicy,
    resolved: Option<ResolvedTable>,
    persisted_version: u32,
    state: TableState,
}

impl<T: Table> LifecycleController<T> {
    pub fn new(table: T, naming: TableNaming, policy: UpgradePolicy) -> Self {
        Self {
            table,
            naming,
            policy,
            resolved: None,
            persisted_version: 0,
            state: TableState::Unknown,
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    /// Last persisted version; 0 means the table was never created
    pub fn persisted_version(&self) -> u32 {
        self.persisted_version
    }

    pub fn desired_version(&self) -> u32 {
        self.table.descriptor().desired_version()
    }

    /// Table name bound to the active tenant, if resolved
    pub fn resolved(&self) -> Option<&ResolvedTable> {
        self.resolved.as_ref()
    }

    pub fn active_tenant(&self) -> Option<TenantId> {
        self.resolved.as_ref().map(ResolvedTable::tenant)
    }

    /// Whether the persisted version is behind; never queries the engine
    pub fn needs_upgrade(&self) -> bool {
        self.persisted_version < self.desired_version()
    }

    /// Resolve the table for `tenant` and load its persisted version
    ///
    /// An absent version is treated as 0. A store failure is returned as is;
    /// the controller stays `Unknown` and the caller decides whether to retry.
    pub fn initialize(
        &mut self,
        tenant: TenantId,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()> {
        self.state = TableState::Unknown;
        self.resolve(tenant, engine)?;
        self.load_version(store)?;
        Ok(())
    }

    /// Re-resolve for a newly active tenant
    ///
    /// Tenant-local tables reload their version from the new tenant's scope.
    /// Global tables keep both their name and their installation-wide
    /// version. Switching to the already active tenant is a no-op.
    pub fn on_tenant_switch(
        &mut self,
        tenant: TenantId,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()> {
        if self.active_tenant() == Some(tenant) && self.state != TableState::Unknown {
            return Ok(());
        }
        if self.resolved.is_none() || self.state == TableState::Unknown {
            return self.initialize(tenant, engine, store);
        }

        match self.table.descriptor().scope() {
            TableScope::Global => {
                self.resolve(tenant, engine)?;
            }
            TableScope::TenantLocal => {
                self.state = TableState::Unknown;
                self.resolve(tenant, engine)?;
                self.load_version(store)?;
            }
        }
        Ok(())
    }

    /// Create or upgrade the table if the persisted version is behind
    ///
    /// Returns without touching the engine when the table is current.
    /// Global tables outside an allowed context are deferred, not failed.
    pub fn maybe_upgrade(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<UpgradeOutcome> {
        self.ensure_checked(store)?;

        if !self.needs_upgrade() {
            debug!(
                "{} is current at v{}",
                self.table.descriptor().name(),
                self.persisted_version
            );
            return Ok(UpgradeOutcome::UpToDate);
        }

        let resolved = self.require_resolved()?.clone();
        if resolved.scope().is_global()
            && !self
                .policy
                .global_upgrades
                .allows(&self.naming, resolved.tenant())
        {
            info!(
                "deferring upgrade of global table {} (tenant {}, policy {})",
                resolved,
                resolved.tenant(),
                self.policy.global_upgrades
            );
            if self.policy.record_deferrals {
                let key = self.deferred_key();
                store
                    .set_version(VersionScope::Installation, &key, self.desired_version())
                    .map_err(|e| SchemaError::store(&key, e))?;
            }
            return Ok(UpgradeOutcome::Deferred);
        }

        self.run_upgrade(&resolved, engine, store)
    }

    /// Create or upgrade regardless of the global upgrade policy
    ///
    /// Meant for explicit administrative installs. A current table is left
    /// alone.
    pub fn install(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<UpgradeOutcome> {
        self.ensure_checked(store)?;
        if !self.needs_upgrade() {
            return Ok(UpgradeOutcome::UpToDate);
        }
        let resolved = self.require_resolved()?.clone();
        self.run_upgrade(&resolved, engine, store)
    }

    /// Drop the table and forget its persisted version
    pub fn uninstall(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()> {
        let resolved = self.require_resolved()?.clone();
        let name = resolved.qualified_name();

        engine
            .execute_ddl(&format!("DROP TABLE IF EXISTS {}", name))
            .map_err(|e| SchemaError::engine(name, e))?;

        let key = self.table.descriptor().version_key();
        store
            .delete_version(self.version_scope(&resolved), key)
            .map_err(|e| SchemaError::store(key, e))?;
        if resolved.scope().is_global() {
            let deferred = self.deferred_key();
            store
                .delete_version(VersionScope::Installation, &deferred)
                .map_err(|e| SchemaError::store(&deferred, e))?;
        }

        info!("uninstalled {}", name);
        self.persisted_version = 0;
        self.state = TableState::Checked(0);
        Ok(())
    }

    /// Whether the resolved table physically exists
    pub fn exists(&self, engine: &dyn ExecutionEngine) -> Result<bool> {
        let name = self.require_resolved()?.qualified_name();
        engine
            .table_exists(name)
            .map_err(|e| SchemaError::engine(name, e))
    }

    /// Number of rows in the resolved table
    pub fn count(&self, engine: &dyn ExecutionEngine) -> Result<u64> {
        let name = self.require_resolved()?.qualified_name();
        engine
            .count_rows(name)
            .map_err(|e| SchemaError::engine(name, e))
    }

    /// Remove every row, keeping the table and its version
    pub fn delete_all(&self, engine: &dyn ExecutionEngine) -> Result<usize> {
        let name = self.require_resolved()?.qualified_name();
        engine
            .execute_ddl(&format!("DELETE FROM {}", name))
            .map_err(|e| SchemaError::engine(name, e))
    }

    pub fn column_exists(&self, engine: &dyn ExecutionEngine, column: &str) -> Result<bool> {
        let name = self.require_resolved()?.qualified_name();
        engine
            .column_exists(name, column)
            .map_err(|e| SchemaError::engine(name, e))
    }

    /// Whether the physical index `index` exists on the resolved table
    pub fn index_exists(&self, engine: &dyn ExecutionEngine, index: &str) -> Result<bool> {
        let name = self.require_resolved()?.qualified_name();
        engine
            .index_exists(name, index)
            .map_err(|e| SchemaError::engine(name, e))
    }

    pub fn status(&self) -> TableStatus {
        let descriptor = self.table.descriptor();
        TableStatus {
            table: descriptor.name().to_string(),
            qualified_name: self
                .resolved
                .as_ref()
                .map(|r| r.qualified_name().to_string())
                .unwrap_or_default(),
            scope: descriptor.scope(),
            tenant: self
                .active_tenant()
                .map(|t| t.to_string())
                .unwrap_or_default(),
            persisted_version: self.persisted_version,
            desired_version: descriptor.desired_version(),
            state: self.state.to_string(),
        }
    }

    fn run_upgrade(
        &mut self,
        resolved: &ResolvedTable,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<UpgradeOutcome> {
        let from = self.persisted_version;
        let name = resolved.qualified_name();

        self.state = TableState::Upgrading;
        let result = self.apply(resolved, engine, store);
        match result {
            Ok(outcome) => {
                self.persisted_version = self.desired_version();
                self.state = TableState::Checked(self.persisted_version);
                info!("{} is now at v{} ({})", name, self.persisted_version, outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.state = TableState::Checked(from);
                Err(e)
            }
        }
    }

    fn apply(
        &self,
        resolved: &ResolvedTable,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<UpgradeOutcome> {
        let name = resolved.qualified_name();
        let from = self.persisted_version;
        let desired = self.desired_version();

        let existed = engine
            .table_exists(name)
            .map_err(|e| SchemaError::engine(name, e))?;

        let outcome = if existed {
            info!("upgrading {} from v{} to v{}", name, from, desired);
            self.table
                .upgrade(engine, resolved, from)
                .map_err(|source| SchemaError::Upgrade {
                    table: name.to_string(),
                    from,
                    source,
                })?;
            UpgradeOutcome::Upgraded { from, to: desired }
        } else {
            info!("creating {} at v{}", name, desired);
            let sql = resolved.create_statement(self.table.schema_definition());
            let changes = engine
                .execute_ddl(&sql)
                .map_err(|e| SchemaError::engine(name, e))?;
            UpgradeOutcome::Created { changes }
        };

        let exists_now = engine
            .table_exists(name)
            .map_err(|e| SchemaError::engine(name, e))?;
        if !exists_now {
            if existed {
                warn!("{} disappeared during upgrade from v{}", name, from);
                return Err(SchemaError::Upgrade {
                    table: name.to_string(),
                    from,
                    source: anyhow!("table missing after upgrade"),
                });
            }
            return Err(SchemaError::CreateFailed {
                table: name.to_string(),
            });
        }

        let key = self.table.descriptor().version_key();
        store
            .set_version(self.version_scope(resolved), key, desired)
            .map_err(|e| SchemaError::store(key, e))?;

        if resolved.scope().is_global() {
            let deferred = self.deferred_key();
            store
                .delete_version(VersionScope::Installation, &deferred)
                .map_err(|e| SchemaError::store(&deferred, e))?;
        }

        Ok(outcome)
    }

    /// On failure the controller is left unresolved, so no later call can
    /// reach the previous tenant's table.
    fn resolve(&mut self, tenant: TenantId, engine: &dyn ExecutionEngine) -> Result<()> {
        let descriptor = self.table.descriptor();
        let charset = match engine.charset_collation() {
            Ok(charset) => charset,
            Err(e) => {
                let err = SchemaError::engine(descriptor.name(), e);
                self.resolved = None;
                self.state = TableState::Unknown;
                return Err(err);
            }
        };
        let resolved = ResolvedTable::resolve(&self.naming, descriptor, tenant, charset);
        debug!("resolved {} for tenant {}", resolved, tenant);
        self.resolved = Some(resolved);
        Ok(())
    }

    fn load_version(&mut self, store: &dyn VersionStore) -> Result<()> {
        let resolved = self.require_resolved()?;
        let scope = self.version_scope(resolved);
        let key = self.table.descriptor().version_key();
        let version = store
            .get_version(scope, key)
            .map_err(|e| SchemaError::store(key, e))?
            .unwrap_or(0);

        self.persisted_version = version;
        self.state = TableState::Checked(version);
        Ok(())
    }

    fn ensure_checked(&mut self, store: &dyn VersionStore) -> Result<()> {
        if self.state == TableState::Unknown {
            self.load_version(store)?;
        }
        Ok(())
    }

    fn require_resolved(&self) -> Result<&ResolvedTable> {
        self.resolved.as_ref().ok_or_else(|| {
            SchemaError::Config(format!(
                "table '{}' used before initialize",
                self.table.descriptor().name()
            ))
        })
    }

    fn version_scope(&self, resolved: &ResolvedTable) -> VersionScope {
        match resolved.scope() {
            TableScope::Global => VersionScope::Installation,
            TableScope::TenantLocal => VersionScope::Tenant(resolved.tenant()),
        }
    }

    fn deferred_key(&self) -> String {
        format!(
            "{}{}",
            self.table.descriptor().version_key(),
            DEFERRED_KEY_SUFFIX
        )
    }
}
