use crate::controller::{GlobalUpgradePolicy, UpgradePolicy};
use crate::tenant::{TableNaming, TenantId, DEFAULT_BASE_PREFIX};
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteTablesConfig {
    /// Path to the directory holding the SQLite database
    pub data_dir: String,

    /// Installation-wide table prefix (default: `wp_`)
    pub base_prefix: String,

    /// Tenant whose tables use the bare base prefix (default: 1)
    pub primary_tenant: u64,

    /// When global tables may be created or upgraded
    pub global_upgrades: GlobalUpgradePolicy,

    /// Record deferred global upgrades in the version store
    pub record_deferrals: bool,

    /// Optional path to a table manifest
    pub manifest: Option<String>,
}

const EMPTY_CONFIG: &str = r#"### sitetables configuration file

### directory holding the sitetables SQLite database
# data_dir = "~/.sitetables"

### installation table prefix and primary tenant id
# base_prefix = "wp_"
# primary_tenant = 1

### global table upgrades: always, primary-only, never
# global_upgrades = "primary-only"
# record_deferrals = false

### table manifest
# manifest = "~/.sitetables/tables.toml"
"#;

impl Default for SiteTablesConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.sitetables", home_dir),
            base_prefix: DEFAULT_BASE_PREFIX.to_string(),
            primary_tenant: 1,
            global_upgrades: GlobalUpgradePolicy::default(),
            record_deferrals: false,
            manifest: None,
        }
    }
}

impl SiteTablesConfig {
    /// Load configuration from a TOML file layered under `SITETABLES_*`
    /// environment variables
    ///
    /// Without a path, `$HOME/.sitetables/sitetables.toml` is used. A missing
    /// file is created from a commented template.
    pub fn new(path: &Option<String>) -> Result<SiteTablesConfig> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                let dir = Self::default_dir()?;
                std::fs::create_dir_all(dir.as_str())
                    .map_err(|e| anyhow!("Unable to create sitetables directory: {}", e))?;
                let p = format!("{}/sitetables.toml", dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `SITETABLES_BASE_PREFIX=app_ sitetables status`
        builder = builder.add_source(config::Environment::with_prefix("SITETABLES"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    /// Build a configuration from flat key/value settings, applying defaults
    pub fn from_map(config: &HashMap<String, String>) -> Result<SiteTablesConfig> {
        let defaults = SiteTablesConfig::default();

        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => defaults.data_dir,
        };

        let base_prefix = config
            .get("base_prefix")
            .cloned()
            .unwrap_or(defaults.base_prefix);

        let primary_tenant = match config.get("primary_tenant") {
            Some(s) => s
                .parse::<TenantId>()
                .map_err(|e| anyhow!("Invalid primary_tenant: {}", e))?
                .get(),
            None => defaults.primary_tenant,
        };

        let global_upgrades = match config.get("global_upgrades") {
            Some(s) => s
                .parse::<GlobalUpgradePolicy>()
                .map_err(|e| anyhow!("Invalid global_upgrades: {}", e))?,
            None => defaults.global_upgrades,
        };

        let record_deferrals = match config.get("record_deferrals") {
            Some(s) => s
                .parse::<bool>()
                .map_err(|e| anyhow!("Invalid record_deferrals: {}", e))?,
            None => defaults.record_deferrals,
        };

        let manifest = config.get("manifest").map(|p| expand_home(p));

        Ok(SiteTablesConfig {
            data_dir,
            base_prefix,
            primary_tenant,
            global_upgrades,
            record_deferrals,
            manifest,
        })
    }

    fn default_dir() -> Result<String> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        let home_str = home
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?;
        Ok(format!("{}/.sitetables", home_str))
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/sitetables.sqlite3", data_dir)
    }

    /// Naming rules derived from the configured prefix and primary tenant
    pub fn naming(&self) -> TableNaming {
        TableNaming::new(&self.base_prefix, TenantId(self.primary_tenant))
    }

    pub fn upgrade_policy(&self) -> UpgradePolicy {
        UpgradePolicy {
            global_upgrades: self.global_upgrades,
            record_deferrals: self.record_deferrals,
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let lines = [
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!("Base Prefix:        {}", self.naming().base_prefix()),
            format!("Primary Tenant:     {}", self.primary_tenant),
            format!("Global Upgrades:    {}", self.global_upgrades),
            format!("Record Deferrals:   {}", self.record_deferrals),
            format!(
                "Manifest:           {}",
                self.manifest.as_deref().unwrap_or("(none)")
            ),
        ];
        lines.join("\n")
    }
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> String {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}
