use clap::{Parser, Subcommand};
use sitetables::{OutputFormat, SiteTablesConfig};
use tracing::Level;

mod commands;

use commands::status::StatusArgs;
use commands::uninstall::UninstallArgs;
use commands::upgrade::{Trigger, UpgradeArgs};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.sitetables/sitetables.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// table manifest path, overrides `manifest` from the configuration
    #[clap(short, long, global = true)]
    manifest: Option<String>,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show persisted and desired versions of every manifest table
    Status(StatusArgs),

    /// Run the activation trigger: create or upgrade every table
    Activate(UpgradeArgs),

    /// Run tenant switch + admin-init for each tenant in turn
    Upgrade(UpgradeArgs),

    /// Drop a table and forget its persisted version
    Uninstall(UninstallArgs),

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level INFO or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match SiteTablesConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    let manifest = cli.manifest.as_deref();

    match cli.command {
        Commands::Status(args) => commands::status::run(&config, manifest, args, cli.format),
        Commands::Activate(args) => {
            commands::upgrade::run(&config, manifest, args, Trigger::Activate, cli.format)
        }
        Commands::Upgrade(args) => {
            commands::upgrade::run(&config, manifest, args, Trigger::AdminInit, cli.format)
        }
        Commands::Uninstall(args) => commands::uninstall::run(&config, manifest, args),
        Commands::Config => commands::config::run(&config, cli.format),
    }
}
