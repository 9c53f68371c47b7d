use std::env;
use std::path::{Path, PathBuf};

use quire_core::config::{CloudService, SyncPreferences};
use quire_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::error::CliError;

const PASSWORD_ENV: &str = "QUIRE_NEXTCLOUD_PASSWORD";

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    let mut preferences = SyncPreferences::load_from_path(config_path)?;

    match command {
        ConfigCommands::Show => {
            println!("{}", render_redacted(&preferences)?);
            return Ok(());
        }
        ConfigCommands::Nextcloud {
            url,
            username,
            password,
        } => {
            let password = password
                .or_else(|| env::var(PASSWORD_ENV).ok())
                .filter(|password| !password.is_empty())
                .ok_or_else(|| {
                    CliError::Config(format!("pass --password or set {PASSWORD_ENV}"))
                })?;
            apply_nextcloud(&mut preferences, &url, &username, password)?;
        }
        ConfigCommands::Directory { path } => {
            std::fs::create_dir_all(&path)?;
            apply_directory(&mut preferences, path);
        }
        ConfigCommands::Disable => preferences.cloud_service = CloudService::Disabled,
        ConfigCommands::Mode {
            mode,
            background,
            interval,
        } => {
            preferences.sync_mode = mode.into();
            if let Some(background) = background {
                preferences.background_sync = background;
            }
            if let Some(interval) = interval {
                if interval == 0 {
                    return Err(CliError::Config(
                        "sync interval must be at least one minute".into(),
                    ));
                }
                preferences.sync_interval_minutes = interval;
            }
        }
    }

    preferences.save_to_path(config_path)?;
    println!("Saved preferences to {}", config_path.display());
    Ok(())
}

pub fn apply_nextcloud(
    preferences: &mut SyncPreferences,
    url: &str,
    username: &str,
    password: String,
) -> Result<(), CliError> {
    let url = normalize_text_option(Some(url.to_string()))
        .filter(|url| is_http_url(url))
        .ok_or_else(|| CliError::Config("Nextcloud URL must start with http:// or https://".into()))?;
    let username = normalize_text_option(Some(username.to_string()))
        .ok_or_else(|| CliError::Config("Nextcloud username cannot be empty".into()))?;

    preferences.cloud_service = CloudService::Nextcloud;
    preferences.nextcloud.instance_url = Some(url);
    preferences.nextcloud.username = Some(username);
    preferences.nextcloud.password = Some(password);
    preferences.normalize();
    Ok(())
}

pub fn apply_directory(preferences: &mut SyncPreferences, path: PathBuf) {
    let root = path.canonicalize().unwrap_or(path);
    preferences.cloud_service = CloudService::FileStorage;
    preferences.file_storage.directory = Some(root);
}

pub fn render_redacted(preferences: &SyncPreferences) -> Result<String, CliError> {
    let mut redacted = preferences.clone();
    if redacted.nextcloud.password.is_some() {
        redacted.nextcloud.password = Some("********".to_string());
    }
    Ok(serde_json::to_string_pretty(&redacted)?)
}
