//! Sync preferences.
//!
//! The sync engine only ever reads preferences. They are persisted as a JSON
//! document owned by the client (see [`PreferencesFile`]) and snapshotted
//! before each operation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::ProviderKind;
use crate::util::normalize_text_option;
use crate::Result;

const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 15;

/// Which remote the user selected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudService {
    #[default]
    Disabled,
    Nextcloud,
    FileStorage,
}

/// Network requirement for syncing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Only sync on unmetered connections
    #[default]
    WifiOnly,
    /// Sync on any connection
    Always,
}

/// Nextcloud account settings
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextcloudSettings {
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for NextcloudSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("NextcloudSettings")
            .field("instance_url", &self.instance_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// File-storage provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileStorageSettings {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// User preferences consulted by the sync manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncPreferences {
    #[serde(default)]
    pub cloud_service: CloudService,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub background_sync: bool,
    #[serde(default = "default_sync_interval_minutes")]
    pub sync_interval_minutes: u64,
    #[serde(default)]
    pub nextcloud: NextcloudSettings,
    #[serde(default)]
    pub file_storage: FileStorageSettings,
}

const fn default_sync_interval_minutes() -> u64 {
    DEFAULT_SYNC_INTERVAL_MINUTES
}

impl Default for SyncPreferences {
    fn default() -> Self {
        Self {
            cloud_service: CloudService::default(),
            sync_mode: SyncMode::default(),
            background_sync: false,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            nextcloud: NextcloudSettings::default(),
            file_storage: FileStorageSettings::default(),
        }
    }
}

impl SyncPreferences {
    /// Load preferences from a JSON file; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut preferences = serde_json::from_str::<Self>(&raw)?;
        preferences.normalize();
        Ok(preferences)
    }

    /// Save preferences as pretty JSON, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut normalized = self.clone();
        normalized.normalize();
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Trim text values and drop empty ones
    pub fn normalize(&mut self) {
        self.nextcloud.instance_url = normalize_text_option(self.nextcloud.instance_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.nextcloud.username = normalize_text_option(self.nextcloud.username.take());
        // Passwords may legitimately contain surrounding spaces
        self.nextcloud.password = self
            .nextcloud
            .password
            .take()
            .filter(|password| !password.is_empty());
        self.file_storage.directory = self
            .file_storage
            .directory
            .take()
            .filter(|directory| !directory.as_os_str().is_empty());
        if self.sync_interval_minutes == 0 {
            self.sync_interval_minutes = DEFAULT_SYNC_INTERVAL_MINUTES;
        }
    }

    /// Whether a cloud service is selected
    pub const fn is_sync_enabled(&self) -> bool {
        !matches!(self.cloud_service, CloudService::Disabled)
    }

    /// Provider matching the selected cloud service
    pub const fn provider_kind(&self) -> Option<ProviderKind> {
        match self.cloud_service {
            CloudService::Disabled => None,
            CloudService::Nextcloud => Some(ProviderKind::Nextcloud),
            CloudService::FileStorage => Some(ProviderKind::FileStorage),
        }
    }
}

/// Read-only access to the current preferences
pub trait PreferencesSource: Send + Sync {
    /// Snapshot of the preferences at call time
    fn preferences(&self) -> SyncPreferences;
}

impl PreferencesSource for SyncPreferences {
    fn preferences(&self) -> SyncPreferences {
        self.clone()
    }
}

/// Preferences re-read from a JSON file on every snapshot
#[derive(Debug, Clone)]
pub struct PreferencesFile {
    path: PathBuf,
}

impl PreferencesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferencesSource for PreferencesFile {
    fn preferences(&self) -> SyncPreferences {
        SyncPreferences::load_from_path(&self.path).unwrap_or_else(|error| {
            tracing::warn!(
                "Failed to read preferences at {}: {}; sync stays disabled",
                self.path.display(),
                error
            );
            SyncPreferences::default()
        })
    }
}
