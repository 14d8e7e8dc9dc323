//! Inbound host triggers
//!
//! The host application calls these when it activates, switches tenant, or
//! initializes its admin area. `HostHooks` fans each trigger out to every
//! registered table. Tables are handled independently: one failing table
//! never stops the others from being checked.

use crate::controller::{LifecycleController, TableStatus, UpgradeOutcome};
use crate::engine::{ExecutionEngine, VersionStore};
use crate::error::{Result, SchemaError};
use crate::table::Table;
use crate::tenant::TenantId;
use tracing::{debug, warn};

/// Object-safe view of a [`LifecycleController`]
pub trait ManagedTable {
    fn name(&self) -> &str;

    fn initialize(
        &mut self,
        tenant: TenantId,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()>;

    fn on_tenant_switch(
        &mut self,
        tenant: TenantId,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()>;

    fn maybe_upgrade(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<UpgradeOutcome>;

    fn uninstall(&mut self, engine: &dyn ExecutionEngine, store: &dyn VersionStore)
        -> Result<()>;

    fn status(&self) -> TableStatus;
}

impl<T: Table> ManagedTable for LifecycleController<T> {
    fn name(&self) -> &str {
        self.table().descriptor().name()
    }

    fn initialize(
        &mut self,
        tenant: TenantId,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()> {
        LifecycleController::initialize(self, tenant, engine, store)
    }

    fn on_tenant_switch(
        &mut self,
        tenant: TenantId,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()> {
        LifecycleController::on_tenant_switch(self, tenant, engine, store)
    }

    fn maybe_upgrade(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<UpgradeOutcome> {
        LifecycleController::maybe_upgrade(self, engine, store)
    }

    fn uninstall(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn VersionStore,
    ) -> Result<()> {
        LifecycleController::uninstall(self, engine, store)
    }

    fn status(&self) -> TableStatus {
        LifecycleController::status(self)
    }
}

/// Outcome of one trigger for one table
#[derive(Debug)]
pub struct TableRun {
    pub table: String,
    pub result: Result<UpgradeOutcome>,
}

/// Registry of controllers driven by host lifecycle events
///
/// The engine and store are borrowed from the host for the registry's
/// lifetime; the registry never opens or closes them.
pub struct HostHooks<'a> {
    engine: &'a dyn ExecutionEngine,
    store: &'a dyn VersionStore,
    active_tenant: TenantId,
    tables: Vec<Box<dyn ManagedTable + 'a>>,
}

impl<'a> HostHooks<'a> {
    pub fn new(
        engine: &'a dyn ExecutionEngine,
        store: &'a dyn VersionStore,
        active_tenant: TenantId,
    ) -> Self {
        Self {
            engine,
            store,
            active_tenant,
            tables: Vec::new(),
        }
    }

    pub fn active_tenant(&self) -> TenantId {
        self.active_tenant
    }

    /// Initialize `controller` for the active tenant and start routing
    /// triggers to it
    ///
    /// Nothing is registered if initialization fails.
    pub fn register<T: Table + 'a>(&mut self, mut controller: LifecycleController<T>) -> Result<()> {
        controller.initialize(self.active_tenant, self.engine, self.store)?;
        debug!(
            "registered table {}",
            controller.table().descriptor().name()
        );
        self.tables.push(Box::new(controller));
        Ok(())
    }

    /// Plugin/application activation
    pub fn on_activate(&mut self) -> Vec<TableRun> {
        self.upgrade_all()
    }

    /// Administrative initialization (e.g. an admin page load)
    pub fn on_admin_init(&mut self) -> Vec<TableRun> {
        self.upgrade_all()
    }

    /// Re-resolve every table for `tenant`
    ///
    /// All tables are switched even if some fail; the first error is
    /// returned. A table whose reload failed stays unchecked and reloads on
    /// its next upgrade attempt. A table that could not be resolved refuses
    /// to upgrade until a later switch to the same tenant succeeds, so the
    /// call is forwarded even when `tenant` is already active.
    pub fn on_tenant_switch(&mut self, tenant: TenantId) -> Result<()> {
        self.active_tenant = tenant;

        let mut first_error: Option<SchemaError> = None;
        for table in self.tables.iter_mut() {
            if let Err(e) = table.on_tenant_switch(tenant, self.engine, self.store) {
                warn!("{} failed to switch to tenant {}: {}", table.name(), tenant, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drop one registered table and forget its version
    pub fn uninstall(&mut self, name: &str) -> Result<()> {
        let table = self
            .tables
            .iter_mut()
            .find(|t| t.name() == name)
            .ok_or_else(|| SchemaError::Config(format!("no registered table '{}'", name)))?;
        table.uninstall(self.engine, self.store)
    }

    pub fn statuses(&self) -> Vec<TableStatus> {
        self.tables.iter().map(|t| t.status()).collect()
    }

    fn upgrade_all(&mut self) -> Vec<TableRun> {
        let mut runs = Vec::with_capacity(self.tables.len());
        for table in self.tables.iter_mut() {
            let result = table.maybe_upgrade(self.engine, self.store);
            if let Err(e) = &result {
                warn!("{}: {}", table.name(), e);
            }
            runs.push(TableRun {
                table: table.name().to_string(),
                result,
            });
        }
        runs
    }
}
