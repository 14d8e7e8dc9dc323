use clap::Args;
use serde::Serialize;
use sitetables::{
    HostHooks, LifecycleController, OutputFormat, SiteTablesConfig, SqliteVersionStore,
    TableRun, TenantId,
};
use tabled::Tabled;

use super::{open_workspace, print_rows};

/// Arguments for the Upgrade and Activate commands
#[derive(Args)]
pub struct UpgradeArgs {
    /// Tenant(s) to upgrade in order, defaults to the primary tenant
    #[clap(short, long = "tenant", value_name = "TENANT")]
    pub tenants: Vec<TenantId>,
}

#[derive(Debug, Serialize, Tabled)]
struct RunRow {
    tenant: TenantId,
    table: String,
    result: String,
    ok: bool,
}

impl RunRow {
    fn new(tenant: TenantId, run: TableRun) -> Self {
        let (result, ok) = match run.result {
            Ok(outcome) => (outcome.to_string(), true),
            Err(e) => (e.to_string(), false),
        };
        RunRow {
            tenant,
            table: run.table,
            result,
            ok,
        }
    }
}

/// Which host trigger to simulate
#[derive(Clone, Copy)]
pub enum Trigger {
    Activate,
    AdminInit,
}

pub fn run(
    config: &SiteTablesConfig,
    manifest: Option<&str>,
    args: UpgradeArgs,
    trigger: Trigger,
    output_format: OutputFormat,
) {
    let (db, tables) = match open_workspace(config, manifest) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    let store = match SqliteVersionStore::new(&db.conn) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let mut tenants = args.tenants.into_iter();
    let first = tenants
        .next()
        .unwrap_or(TenantId(config.primary_tenant));

    let mut hooks = HostHooks::new(&db, &store, first);
    for table in tables {
        let controller = LifecycleController::new(table, config.naming(), config.upgrade_policy());
        if let Err(e) = hooks.register(controller) {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }

    let mut rows = Vec::new();
    let mut failed = false;
    for tenant in std::iter::once(first).chain(tenants) {
        if let Err(e) = hooks.on_tenant_switch(tenant) {
            eprintln!("ERROR: switching to tenant {}: {}", tenant, e);
            failed = true;
        }
        let runs = match trigger {
            Trigger::Activate => hooks.on_activate(),
            Trigger::AdminInit => hooks.on_admin_init(),
        };
        for run in runs {
            let row = RunRow::new(tenant, run);
            failed |= !row.ok;
            rows.push(row);
        }
    }

    print_rows(&rows, output_format);
    if failed {
        std::process::exit(1);
    }
}
