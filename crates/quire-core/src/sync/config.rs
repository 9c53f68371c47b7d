//! Immutable per-operation provider configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::{CloudService, SyncPreferences};
use crate::models::ProviderKind;
use crate::util::is_http_url;

/// Connection details for the Nextcloud notes service
#[derive(Clone, PartialEq, Eq)]
pub struct CloudConfig {
    /// Instance base URL without trailing slash
    pub remote_address: String,
    pub username: String,
    /// Headers added to every request (`Authorization`, ...)
    pub auth_headers: BTreeMap<String, String>,
}

impl CloudConfig {
    /// Build a config using HTTP basic authentication
    pub fn with_basic_auth(
        remote_address: impl Into<String>,
        username: impl Into<String>,
        password: &str,
    ) -> Self {
        let username = username.into();
        let credentials = STANDARD.encode(format!("{username}:{password}"));
        let mut auth_headers = BTreeMap::new();
        auth_headers.insert("Authorization".to_string(), format!("Basic {credentials}"));

        Self {
            remote_address: remote_address.into().trim_end_matches('/').to_string(),
            username,
            auth_headers,
        }
    }
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CloudConfig")
            .field("remote_address", &self.remote_address)
            .field("username", &self.username)
            .field("auth_headers", &"[REDACTED]")
            .finish()
    }
}

/// Root directory of the file-storage provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub root: PathBuf,
}

/// Configuration handed to a provider for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Cloud(CloudConfig),
    Directory(DirectoryConfig),
}

impl ProviderConfig {
    /// Provider this configuration belongs to
    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::Cloud(_) => ProviderKind::Nextcloud,
            Self::Directory(_) => ProviderKind::FileStorage,
        }
    }

    /// Build the config for the selected cloud service.
    ///
    /// Returns `None` when sync is disabled or the settings are incomplete.
    pub fn from_preferences(preferences: &SyncPreferences) -> Option<Self> {
        match preferences.cloud_service {
            CloudService::Disabled => None,
            CloudService::Nextcloud => {
                let settings = &preferences.nextcloud;
                let url = settings.instance_url.as_deref()?.trim();
                let username = settings.username.as_deref()?.trim();
                let password = settings.password.as_deref()?;
                if !is_http_url(url) || username.is_empty() || password.is_empty() {
                    return None;
                }
                Some(Self::Cloud(CloudConfig::with_basic_auth(
                    url, username, password,
                )))
            }
            CloudService::FileStorage => {
                let root = preferences.file_storage.directory.clone()?;
                if root.as_os_str().is_empty() {
                    return None;
                }
                Some(Self::Directory(DirectoryConfig { root }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileStorageSettings, NextcloudSettings};

    fn nextcloud_preferences(url: &str) -> SyncPreferences {
        SyncPreferences {
            cloud_service: CloudService::Nextcloud,
            nextcloud: NextcloudSettings {
                instance_url: Some(url.to_string()),
                username: Some("alice".to_string()),
                password: Some("secret".to_string()),
            },
            ..SyncPreferences::default()
        }
    }

    #[test]
    fn basic_auth_header_is_base64_of_credentials() {
        let config = CloudConfig::with_basic_auth("https://cloud.example.com/", "alice", "secret");
        assert_eq!(config.remote_address, "https://cloud.example.com");
        assert_eq!(
            config.auth_headers.get("Authorization").map(String::as_str),
            Some("Basic YWxpY2U6c2VjcmV0")
        );
    }

    #[test]
    fn debug_redacts_headers() {
        let config = CloudConfig::with_basic_auth("https://cloud.example.com", "alice", "secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("YWxpY2U6c2VjcmV0"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn from_preferences_builds_cloud_config() {
        let config =
            ProviderConfig::from_preferences(&nextcloud_preferences("https://cloud.example.com"))
                .unwrap();
        assert_eq!(config.provider(), ProviderKind::Nextcloud);
    }

    #[test]
    fn from_preferences_rejects_incomplete_settings() {
        assert!(ProviderConfig::from_preferences(&SyncPreferences::default()).is_none());
        assert!(
            ProviderConfig::from_preferences(&nextcloud_preferences("cloud.example.com"))
                .is_none()
        );

        let missing_directory = SyncPreferences {
            cloud_service: CloudService::FileStorage,
            ..SyncPreferences::default()
        };
        assert!(ProviderConfig::from_preferences(&missing_directory).is_none());

        let with_directory = SyncPreferences {
            cloud_service: CloudService::FileStorage,
            file_storage: FileStorageSettings {
                directory: Some(PathBuf::from("/tmp/notes")),
            },
            ..SyncPreferences::default()
        };
        assert_eq!(
            ProviderConfig::from_preferences(&with_directory).map(|config| config.provider()),
            Some(ProviderKind::FileStorage)
        );
    }
}
