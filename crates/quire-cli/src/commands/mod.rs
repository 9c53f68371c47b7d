pub mod add;
pub mod bin;
pub mod common;
pub mod config;
pub mod delete;
pub mod edit;
pub mod list;
pub mod remote;
pub mod sync;

use std::path::PathBuf;

use quire_core::services::DatabaseService;
use quire_core::sync::SyncManager;

use crate::cli::Commands;
use crate::error::CliError;

/// Services shared by every note command
pub struct App {
    pub db: DatabaseService,
    pub manager: SyncManager,
    pub config_path: PathBuf,
}

pub async fn dispatch(app: &App, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Add {
            title,
            notebook,
            local_only,
            content,
        } => add::run_add(app, title, notebook.as_deref(), local_only, &content).await,
        Commands::List { limit, bin, json } => list::run_list(app, limit, bin, json).await,
        Commands::Edit { id } => edit::run_edit(app, &id).await,
        Commands::Bin { id } => bin::run_bin(app, &id).await,
        Commands::Restore { id } => bin::run_restore(app, &id).await,
        Commands::Delete { id } => delete::run_delete(app, &id).await,
        Commands::Sync { watch, json } => {
            if watch {
                sync::run_sync_watch(app).await
            } else {
                sync::run_sync(app, json).await
            }
        }
        Commands::Auth => remote::run_auth(app).await,
        Commands::Check => remote::run_check(app).await,
        Commands::Config { command } => config::run_config(command, &app.config_path),
    }
}
