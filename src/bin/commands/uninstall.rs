use clap::Args;
use sitetables::{
    HostHooks, LifecycleController, SiteTablesConfig, SqliteVersionStore, TenantId,
};
use std::io::Write;

use super::open_workspace;

/// Arguments for the Uninstall command
#[derive(Args)]
pub struct UninstallArgs {
    /// Name of the table to drop, as declared in the manifest
    #[clap(value_name = "TABLE")]
    pub table: String,

    /// Tenant whose copy to drop, defaults to the primary tenant
    #[clap(short, long)]
    pub tenant: Option<TenantId>,

    /// Skip confirmation prompt
    #[clap(long, short = 'y')]
    pub yes: bool,
}

pub fn run(config: &SiteTablesConfig, manifest: Option<&str>, args: UninstallArgs) {
    let UninstallArgs { table, tenant, yes } = args;
    let tenant = tenant.unwrap_or(TenantId(config.primary_tenant));

    if !yes {
        print!(
            "Drop table '{}' for tenant {} and forget its version? [y/N] ",
            table, tenant
        );
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err()
            || !matches!(answer.trim(), "y" | "Y" | "yes")
        {
            println!("Aborted");
            return;
        }
    }

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

    let mut hooks = HostHooks::new(&db, &store, tenant);
    for t in tables {
        let controller = LifecycleController::new(t, config.naming(), config.upgrade_policy());
        if let Err(e) = hooks.register(controller) {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }

    match hooks.uninstall(&table) {
        Ok(()) => println!("Uninstalled '{}' for tenant {}", table, tenant),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}
