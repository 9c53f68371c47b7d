//! Command-line front end for the Quire note store.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use clap::Parser;
use quire_core::config::PreferencesFile;
use quire_core::services::DatabaseService;
use quire_core::sync::{StaticConnectivity, SyncActor, SyncManager};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_config_path, resolve_db_path};
use crate::commands::App;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(
            "quire=info".parse().map_err(|error| {
                CliError::Config(format!("invalid log directive: {error}"))
            })?,
        ))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;
    let config_path = resolve_config_path(cli.config)?;

    // Preferences edits never need the database or the actor.
    if let Commands::Config { command } = cli.command {
        return commands::config::run_config(command, &config_path);
    }

    let db = DatabaseService::open_path(&db_path)?;
    let actor = SyncActor::spawn(db.clone());
    let manager = SyncManager::new(
        actor.handle(),
        Arc::new(PreferencesFile::new(config_path.clone())),
        Arc::new(StaticConnectivity(cli.network.into())),
    )?
    .with_fallback(|error| tracing::debug!("Sync request short-circuited: {error}"));

    let app = App {
        db,
        manager,
        config_path,
    };
    let result = commands::dispatch(&app, cli.command).await;

    drop(app);
    actor.shutdown().await;
    result
}
