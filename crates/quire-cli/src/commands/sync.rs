use std::time::Duration;

use quire_core::config::SyncPreferences;
use quire_core::sync::SyncReport;

use crate::commands::App;
use crate::error::CliError;

pub async fn run_sync(app: &App, as_json: bool) -> Result<(), CliError> {
    let report = app.manager.sync().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_sync_report(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_sync_watch(app: &App) -> Result<(), CliError> {
    let preferences = SyncPreferences::load_from_path(&app.config_path)?;
    if !preferences.background_sync {
        return Err(CliError::Config(
            "background sync is off; enable it with `quire config mode <MODE> --background true`"
                .into(),
        ));
    }

    let interval = Duration::from_secs(preferences.sync_interval_minutes.saturating_mul(60));
    println!(
        "Syncing every {} minute(s); press Ctrl-C to stop",
        preferences.sync_interval_minutes
    );
    let task = app.manager.spawn_background_sync(interval);

    tokio::signal::ctrl_c().await?;
    task.abort();
    // Dropping the task releases its actor handle before shutdown
    let _ = task.await;
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    if report.is_empty() {
        return vec!["Already up to date".to_string()];
    }

    [
        ("pulled", report.pulled),
        ("pushed", report.pushed),
        ("updated locally", report.updated_locally),
        ("moved to bin", report.moved_to_bin),
        ("created remotely", report.created_remotely),
        ("removed local-only", report.removed_local_only),
        ("binned remotely", report.removed_binned),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .map(|(label, count)| format!("{label}: {count}"))
    .collect()
}
