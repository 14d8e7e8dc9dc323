use clap::Args;
use sitetables::{
    HostHooks, LifecycleController, OutputFormat, SiteTablesConfig, SqliteVersionStore,
    TableStatus, TenantId,
};

use super::{open_workspace, print_rows};

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Tenant(s) to report on, defaults to the primary tenant
    #[clap(short, long = "tenant", value_name = "TENANT")]
    pub tenants: Vec<TenantId>,
}

pub fn run(
    config: &SiteTablesConfig,
    manifest: Option<&str>,
    args: StatusArgs,
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

    let tenants = if args.tenants.is_empty() {
        vec![TenantId(config.primary_tenant)]
    } else {
        args.tenants
    };

    let mut rows: Vec<TableStatus> = Vec::new();
    for tenant in tenants {
        let mut hooks = HostHooks::new(&db, &store, tenant);
        for table in tables.iter().cloned() {
            let controller =
                LifecycleController::new(table, config.naming(), config.upgrade_policy());
            if let Err(e) = hooks.register(controller) {
                eprintln!("ERROR: tenant {}: {}", tenant, e);
            }
        }
        rows.extend(hooks.statuses());
    }

    print_rows(&rows, output_format);
}
