//! Provider contract shared by every sync backend.
//!
//! The set of backends is closed: [`SyncProvider`] and [`RemoteNote`] are
//! enums with one variant per backend, and every operation dispatches on the
//! (provider, config) pair. Passing a config that belongs to another provider
//! is a programmer error reported as [`SyncError::InvalidConfig`].

use crate::models::{IdMapping, Note, NoteId, ProviderKind};

use super::config::ProviderConfig;
use super::error::{SyncError, SyncResult};
use super::file_storage::{FileNote, FileStorageProvider};
use super::nextcloud::{NextcloudNote, NextcloudProvider};

/// Outcome of comparing a remote note with its local counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The remote changed after the local copy was last reconciled
    IsNewer,
    /// The local note changed after the remote copy was written
    IsOutdated,
    /// Both sides are in sync
    IsSame,
}

/// Conflict-detection policy used by both providers.
///
/// Local edits newer than the remote modification time win; otherwise any
/// token change (or a later remote modification time) means the remote is
/// newer. Pushes stamp the remote with the local modification time and pulls
/// copy the remote modification time back, so a converged pair is `IsSame`.
pub(crate) fn compare_revision(
    remote_token: &str,
    remote_modified: i64,
    note: &Note,
    mapping: &IdMapping,
) -> Comparison {
    let token_changed = mapping.extras.as_deref() != Some(remote_token);

    if note.modified_date > remote_modified {
        Comparison::IsOutdated
    } else if token_changed || remote_modified > note.modified_date {
        Comparison::IsNewer
    } else {
        Comparison::IsSame
    }
}

/// A provider-specific projection of a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteNote {
    Nextcloud(NextcloudNote),
    File(FileNote),
}

impl RemoteNote {
    /// Provider-side identifier
    pub fn id(&self) -> String {
        match self {
            Self::Nextcloud(note) => note.id.to_string(),
            Self::File(note) => note.id.clone(),
        }
    }

    /// Change-detection token stored in the mapping's extras
    pub fn token(&self) -> String {
        match self {
            Self::Nextcloud(note) => note.etag.clone(),
            Self::File(note) => note.modified.to_string(),
        }
    }

    /// Remote modification time (Unix seconds)
    pub const fn modified(&self) -> i64 {
        match self {
            Self::Nextcloud(note) => note.modified,
            Self::File(note) => note.modified,
        }
    }

    /// Notebook name the remote note is filed under
    pub fn notebook_name(&self) -> Option<&str> {
        let name = match self {
            Self::Nextcloud(note) => Some(note.category.as_str()),
            Self::File(note) => note.notebook.as_deref(),
        };
        name.map(str::trim).filter(|name| !name.is_empty())
    }

    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::Nextcloud(_) => ProviderKind::Nextcloud,
            Self::File(_) => ProviderKind::FileStorage,
        }
    }

    /// Decide which side holds the latest version
    pub fn compare(&self, note: &Note, mapping: &IdMapping) -> Comparison {
        compare_revision(&self.token(), self.modified(), note, mapping)
    }

    /// Project onto a local note, keeping local-only state from `old`.
    ///
    /// The notebook is left as in `old`; callers resolve [`Self::notebook_name`].
    pub fn to_local_note(&self, old: Option<&Note>) -> Note {
        match self {
            Self::Nextcloud(note) => note.to_local_note(old),
            Self::File(note) => note.to_local_note(old),
        }
    }

    /// Mapping linking this remote note to a local note
    pub fn to_mapping(&self, local_note_id: NoteId) -> IdMapping {
        IdMapping::new(
            local_note_id,
            self.id(),
            self.provider(),
            Some(self.token()),
        )
    }
}

/// A synchronization backend
#[derive(Debug, Clone)]
pub enum SyncProvider {
    Nextcloud(NextcloudProvider),
    FileStorage(FileStorageProvider),
}

fn mismatched_config(provider: ProviderKind, config: &ProviderConfig) -> SyncError {
    SyncError::InvalidConfig(format!(
        "{} configuration passed to the {provider} provider",
        config.provider()
    ))
}

impl SyncProvider {
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Nextcloud(_) => ProviderKind::Nextcloud,
            Self::FileStorage(_) => ProviderKind::FileStorage,
        }
    }

    /// Whether the backend has a server-side bin
    pub const fn supports_bin(&self) -> bool {
        match self {
            Self::Nextcloud(provider) => provider.supports_bin(),
            Self::FileStorage(provider) => provider.supports_bin(),
        }
    }

    /// Fetch every remote note
    pub async fn get_all(&self, config: &ProviderConfig) -> SyncResult<Vec<RemoteNote>> {
        match (self, config) {
            (Self::Nextcloud(provider), ProviderConfig::Cloud(config)) => Ok(provider
                .get_all(config)
                .await?
                .into_iter()
                .map(RemoteNote::Nextcloud)
                .collect()),
            (Self::FileStorage(provider), ProviderConfig::Directory(config)) => Ok(provider
                .get_all(config)?
                .into_iter()
                .map(RemoteNote::File)
                .collect()),
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Create a remote copy of a local note
    pub async fn create_note(
        &self,
        note: &Note,
        notebook: Option<&str>,
        config: &ProviderConfig,
    ) -> SyncResult<RemoteNote> {
        match (self, config, self.to_remote_note(note, notebook, None)) {
            (
                Self::Nextcloud(provider),
                ProviderConfig::Cloud(config),
                RemoteNote::Nextcloud(remote),
            ) => provider
                .create_note(&remote, config)
                .await
                .map(RemoteNote::Nextcloud),
            (
                Self::FileStorage(provider),
                ProviderConfig::Directory(config),
                RemoteNote::File(remote),
            ) => provider.create_note(&remote, config).map(RemoteNote::File),
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Push the local state of a mapped note
    pub async fn update_note(
        &self,
        note: &Note,
        notebook: Option<&str>,
        config: &ProviderConfig,
        mapping: &IdMapping,
    ) -> SyncResult<RemoteNote> {
        match (self, config, self.to_remote_note(note, notebook, None)) {
            (
                Self::Nextcloud(provider),
                ProviderConfig::Cloud(config),
                RemoteNote::Nextcloud(remote),
            ) => provider
                .update_note(&remote, config, mapping)
                .await
                .map(RemoteNote::Nextcloud),
            (
                Self::FileStorage(provider),
                ProviderConfig::Directory(config),
                RemoteNote::File(remote),
            ) => provider
                .update_note(&remote, config, mapping)
                .map(RemoteNote::File),
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Permanently remove the remote copy of a note
    pub async fn delete_note(
        &self,
        note: &Note,
        config: &ProviderConfig,
        mapping: &IdMapping,
    ) -> SyncResult<()> {
        match (self, config) {
            (Self::Nextcloud(provider), ProviderConfig::Cloud(config)) => {
                provider.delete_note(note, config, mapping).await
            }
            (Self::FileStorage(provider), ProviderConfig::Directory(config)) => {
                provider.delete_note(note, config, mapping)
            }
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Move the remote copy to the provider's bin
    pub async fn move_to_bin(
        &self,
        note: &Note,
        config: &ProviderConfig,
        mapping: &IdMapping,
    ) -> SyncResult<()> {
        match (self, config) {
            (Self::Nextcloud(provider), ProviderConfig::Cloud(config)) => {
                provider.move_to_bin(note, config, mapping)
            }
            (Self::FileStorage(provider), ProviderConfig::Directory(config)) => {
                provider.move_to_bin(note, config, mapping)
            }
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Take the remote copy back out of the provider's bin
    pub async fn restore_note(
        &self,
        note: &Note,
        config: &ProviderConfig,
        mapping: &IdMapping,
    ) -> SyncResult<RemoteNote> {
        match (self, config) {
            (Self::Nextcloud(provider), ProviderConfig::Cloud(config)) => provider
                .restore_note(note, config, mapping)
                .map(RemoteNote::Nextcloud),
            (Self::FileStorage(provider), ProviderConfig::Directory(config)) => provider
                .restore_note(note, config, mapping)
                .map(RemoteNote::File),
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Verify the credentials in `config`
    pub async fn authenticate(&self, config: &ProviderConfig) -> SyncResult<()> {
        match (self, config) {
            (Self::Nextcloud(provider), ProviderConfig::Cloud(config)) => {
                provider.authenticate(config).await
            }
            (Self::FileStorage(provider), ProviderConfig::Directory(config)) => {
                provider.authenticate(config)
            }
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Fail with `ServerNotSupported` unless the backend speaks a supported protocol
    pub async fn is_server_compatible(&self, config: &ProviderConfig) -> SyncResult<()> {
        match (self, config) {
            (Self::Nextcloud(provider), ProviderConfig::Cloud(config)) => {
                provider.is_server_compatible(config).await
            }
            (Self::FileStorage(provider), ProviderConfig::Directory(config)) => {
                provider.is_server_compatible(config)
            }
            _ => Err(mismatched_config(self.kind(), config)),
        }
    }

    /// Project a local note onto this provider's remote shape.
    ///
    /// `old` supplies provider-side state (id, token) the local note lacks.
    pub fn to_remote_note(
        &self,
        note: &Note,
        notebook: Option<&str>,
        old: Option<&RemoteNote>,
    ) -> RemoteNote {
        match self {
            Self::Nextcloud(_) => {
                let old = match old {
                    Some(RemoteNote::Nextcloud(old)) => Some(old),
                    _ => None,
                };
                RemoteNote::Nextcloud(NextcloudNote::from_local(note, notebook, old))
            }
            Self::FileStorage(_) => {
                let old = match old {
                    Some(RemoteNote::File(old)) => Some(old),
                    _ => None,
                };
                RemoteNote::File(FileNote::from_local(note, notebook, old))
            }
        }
    }
}
