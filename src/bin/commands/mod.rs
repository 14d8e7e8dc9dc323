pub mod config;
pub mod status;
pub mod uninstall;
pub mod upgrade;

use anyhow::{anyhow, Result};
use serde::Serialize;
use sitetables::database::ensure_data_dir;
use sitetables::output::to_json_lines;
use sitetables::{DatabaseConn, OutputFormat, ScriptedTable, SiteTablesConfig, TableManifest};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Open the configured database and build the tables declared in the manifest
pub(crate) fn open_workspace(
    config: &SiteTablesConfig,
    manifest: Option<&str>,
) -> Result<(DatabaseConn, Vec<ScriptedTable>)> {
    let manifest_path = manifest
        .or(config.manifest.as_deref())
        .ok_or_else(|| anyhow!("No table manifest given; pass --manifest or set `manifest` in the config file"))?;

    let tables = TableManifest::load(manifest_path)?
        .tables()
        .map_err(|e| anyhow!("{}", e))?;

    ensure_data_dir(&config.data_dir)?;
    let db = DatabaseConn::open_path(&config.sqlite_path())?;
    Ok((db, tables))
}

/// Print rows in the requested output format
pub(crate) fn print_rows<T: Serialize + Tabled>(rows: &[T], output_format: OutputFormat) {
    if let Some(lines) = to_json_lines(rows, output_format) {
        match lines {
            Ok(lines) => lines.iter().for_each(|l| println!("{}", l)),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        }
        return;
    }

    match output_format {
        OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
        OutputFormat::Psv => {
            let headers: Vec<String> = T::headers().into_iter().map(|h| h.to_string()).collect();
            println!("{}", headers.join("|"));
            for row in rows {
                let fields: Vec<String> = row.fields().into_iter().map(|f| f.to_string()).collect();
                println!("{}", fields.join("|"));
            }
        }
        _ => println!("{}", Table::new(rows).with(Style::rounded())),
    }
}
