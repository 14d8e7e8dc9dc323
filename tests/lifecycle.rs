//! End-to-end lifecycle scenarios against SQLite

use anyhow::Result;
use sitetables::*;

const LOGS_SCHEMA: &str =
    "id INTEGER PRIMARY KEY, message TEXT NOT NULL, level TEXT, created_at INTEGER";

fn logs_table() -> ScriptedTable {
    let desc = TableDescriptor::new("logs", 3, TableScope::TenantLocal, LOGS_SCHEMA).unwrap();
    ScriptedTable::new(desc)
        .with_step(
            2,
            UpgradeStep::AddColumn {
                column: "level".to_string(),
                definition: "TEXT".to_string(),
            },
        )
        .unwrap()
        .with_step(
            3,
            UpgradeStep::AddColumn {
                column: "created_at".to_string(),
                definition: "INTEGER".to_string(),
            },
        )
        .unwrap()
}

fn registry_table() -> ScriptedTable {
    let desc = TableDescriptor::new(
        "registry",
        1,
        TableScope::Global,
        "id INTEGER PRIMARY KEY, site INTEGER NOT NULL",
    )
    .unwrap();
    ScriptedTable::new(desc)
}

fn controller(table: ScriptedTable) -> LifecycleController<ScriptedTable> {
    LifecycleController::new(table, TableNaming::default(), UpgradePolicy::default())
}

/// Engine that accepts CREATE statements without creating anything
struct NoCreateEngine<'a>(&'a DatabaseConn);

impl ExecutionEngine for NoCreateEngine<'_> {
    fn table_exists(&self, table: &str) -> Result<bool> {
        self.0.table_exists(table)
    }

    fn execute_ddl(&self, statement: &str) -> Result<usize> {
        if statement.starts_with("CREATE TABLE") {
            return Ok(0);
        }
        self.0.execute_ddl(statement)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        self.0.column_exists(table, column)
    }

    fn index_exists(&self, table: &str, index: &str) -> Result<bool> {
        self.0.index_exists(table, index)
    }

    fn count_rows(&self, table: &str) -> Result<u64> {
        self.0.count_rows(table)
    }
}

#[test]
fn tenant_table_behind_is_upgraded_in_place() {
    let db = DatabaseConn::open_in_memory().unwrap();
    let store = SqliteVersionStore::new(&db.conn).unwrap();
    let site5 = TenantId(5);

    db.execute_ddl("CREATE TABLE wp_5_logs (id INTEGER PRIMARY KEY, message TEXT NOT NULL)")
        .unwrap();
    db.execute("INSERT INTO wp_5_logs (message) VALUES ('kept')")
        .unwrap();
    store
        .set_version(VersionScope::Tenant(site5), "logs_table_version", 1)
        .unwrap();

    let mut ctl = controller(logs_table());
    ctl.initialize(site5, &db, &store).unwrap();
    let outcome = ctl.maybe_upgrade(&db, &store).unwrap();

    assert_eq!(outcome, UpgradeOutcome::Upgraded { from: 1, to: 3 });
    assert!(db.column_exists("wp_5_logs", "created_at").unwrap());
    assert_eq!(ctl.count(&db).unwrap(), 1);
    assert_eq!(
        store
            .get_version(VersionScope::Tenant(site5), "logs_table_version")
            .unwrap(),
        Some(3)
    );
}

#[test]
fn missing_global_table_is_created_once_for_installation() {
    let db = DatabaseConn::open_in_memory().unwrap();
    let store = SqliteVersionStore::new(&db.conn).unwrap();

    let mut ctl = controller(registry_table());
    ctl.initialize(TenantId(1), &db, &store).unwrap();
    let outcome = ctl.maybe_upgrade(&db, &store).unwrap();

    assert!(matches!(outcome, UpgradeOutcome::Created { .. }));
    assert!(db.table_exists("wp_registry").unwrap());
    assert_eq!(
        store
            .get_version(VersionScope::Installation, "registry_table_version")
            .unwrap(),
        Some(1)
    );

    // every tenant sees the same installation-wide version
    for tenant in [2, 3, 9] {
        let mut other = controller(registry_table());
        other.initialize(TenantId(tenant), &db, &store).unwrap();
        assert_eq!(other.persisted_version(), 1);
        assert_eq!(
            other.maybe_upgrade(&db, &store).unwrap(),
            UpgradeOutcome::UpToDate
        );
    }
}

#[test]
fn create_that_does_not_stick_is_reported() {
    let db = DatabaseConn::open_in_memory().unwrap();
    let store = SqliteVersionStore::new(&db.conn).unwrap();
    let engine = NoCreateEngine(&db);

    let mut ctl = controller(registry_table());
    ctl.initialize(TenantId(1), &engine, &store).unwrap();
    let err = ctl.maybe_upgrade(&engine, &store).unwrap_err();

    assert!(matches!(err, SchemaError::CreateFailed { .. }));
    assert_eq!(
        store
            .get_version(VersionScope::Installation, "registry_table_version")
            .unwrap(),
        None
    );

    // the real engine succeeds on the next attempt
    assert!(matches!(
        ctl.maybe_upgrade(&db, &store).unwrap(),
        UpgradeOutcome::Created { .. }
    ));
}

#[test]
fn tenants_get_separate_tables_and_versions() {
    let db = DatabaseConn::open_in_memory().unwrap();
    let store = SqliteVersionStore::new(&db.conn).unwrap();

    let mut hooks = HostHooks::new(&db, &store, TenantId(1));
    hooks.register(controller(logs_table())).unwrap();
    hooks.register(controller(registry_table())).unwrap();

    for run in hooks.on_activate() {
        assert!(run.result.is_ok(), "{}: {:?}", run.table, run.result);
    }
    hooks.on_tenant_switch(TenantId(2)).unwrap();
    hooks.on_admin_init();
    hooks.on_tenant_switch(TenantId(1)).unwrap();

    assert!(db.table_exists("wp_logs").unwrap());
    assert!(db.table_exists("wp_2_logs").unwrap());
    assert!(db.table_exists("wp_registry").unwrap());
    assert!(!db.table_exists("wp_2_registry").unwrap());

    let records = store.list().unwrap();
    let scopes: Vec<(&str, &str, u32)> = records
        .iter()
        .map(|r| (r.scope.as_str(), r.key.as_str(), r.version))
        .collect();
    assert_eq!(
        scopes,
        vec![
            ("installation", "registry_table_version", 1),
            ("tenant:1", "logs_table_version", 3),
            ("tenant:2", "logs_table_version", 3),
        ]
    );

    let statuses = hooks.statuses();
    assert_eq!(statuses[0].qualified_name, "wp_logs");
    assert_eq!(statuses[0].persisted_version, 3);
}

#[test]
fn racing_requests_converge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.sqlite3");
    let path = path.to_str().unwrap();

    let db_a = DatabaseConn::open_path(path).unwrap();
    let db_b = DatabaseConn::open_path(path).unwrap();
    let store_a = SqliteVersionStore::new(&db_a.conn).unwrap();
    let store_b = SqliteVersionStore::new(&db_b.conn).unwrap();

    // both requests read version 0 before either persists
    let mut a = controller(logs_table());
    let mut b = controller(logs_table());
    a.initialize(TenantId(4), &db_a, &store_a).unwrap();
    b.initialize(TenantId(4), &db_b, &store_b).unwrap();

    assert!(matches!(
        a.maybe_upgrade(&db_a, &store_a).unwrap(),
        UpgradeOutcome::Created { .. }
    ));
    assert_eq!(
        b.maybe_upgrade(&db_b, &store_b).unwrap(),
        UpgradeOutcome::Upgraded { from: 0, to: 3 }
    );

    assert_eq!(
        store_a
            .get_version(VersionScope::Tenant(TenantId(4)), "logs_table_version")
            .unwrap(),
        Some(3)
    );
}

#[test]
fn uninstall_then_reinstall() {
    let db = DatabaseConn::open_in_memory().unwrap();
    let store = SqliteVersionStore::new(&db.conn).unwrap();

    let mut ctl = controller(logs_table());
    ctl.initialize(TenantId(3), &db, &store).unwrap();
    ctl.install(&db, &store).unwrap();
    db.execute("INSERT INTO wp_3_logs (message) VALUES ('a'), ('b')")
        .unwrap();
    assert_eq!(ctl.count(&db).unwrap(), 2);
    assert_eq!(ctl.delete_all(&db).unwrap(), 2);
    assert_eq!(ctl.count(&db).unwrap(), 0);

    ctl.uninstall(&db, &store).unwrap();
    assert!(!ctl.exists(&db).unwrap());
    assert!(ctl.needs_upgrade());

    assert!(matches!(
        ctl.maybe_upgrade(&db, &store).unwrap(),
        UpgradeOutcome::Created { .. }
    ));
    assert!(ctl.column_exists(&db, "created_at").unwrap());
}

#[test]
fn manifest_tables_drive_hooks() {
    let manifest = TableManifest::from_toml_str(
        r#"
[[tables]]
name = "events"
version = 2
scope = "tenant"
schema = "id INTEGER PRIMARY KEY, kind TEXT"

[[tables.upgrades]]
version = 2
add_index = { index = "kind", columns = "kind" }
"#,
    )
    .unwrap();

    let db = DatabaseConn::open_in_memory().unwrap();
    let store = SqliteVersionStore::new(&db.conn).unwrap();
    db.execute_ddl("CREATE TABLE wp_6_events (id INTEGER PRIMARY KEY, kind TEXT)")
        .unwrap();

    let mut hooks = HostHooks::new(&db, &store, TenantId(6));
    for table in manifest.tables().unwrap() {
        hooks.register(controller(table)).unwrap();
    }
    let runs = hooks.on_admin_init();

    assert!(matches!(
        runs[0].result,
        Ok(UpgradeOutcome::Upgraded { from: 0, to: 2 })
    ));
    assert!(db.index_exists("wp_6_events", "wp_6_events_kind").unwrap());
}
