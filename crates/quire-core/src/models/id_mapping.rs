//! Local/remote identity correlation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::note::NoteId;

/// Remote backend a mapping belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// REST notes service (Nextcloud Notes API)
    Nextcloud,
    /// Device-local directory of note files
    FileStorage,
}

impl ProviderKind {
    /// Stable storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nextcloud => "nextcloud",
            Self::FileStorage => "file_storage",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nextcloud" => Ok(Self::Nextcloud),
            "file_storage" => Ok(Self::FileStorage),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Correlates one local note with one remote note under one provider.
///
/// A row with neither `provider` nor `remote_note_id` is "unassigned": the
/// note was synced at some point (or is about to be) but is currently not
/// linked to any remote copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    /// Row identifier (0 until inserted)
    pub mapping_id: i64,
    pub local_note_id: Option<NoteId>,
    pub remote_note_id: Option<String>,
    pub provider: Option<ProviderKind>,
    /// Provider-specific change token (`ETag`, file mtime, ...)
    pub extras: Option<String>,
}

impl IdMapping {
    /// New, not yet inserted mapping linking a local note to a remote note
    #[must_use]
    pub fn new(
        local_note_id: NoteId,
        remote_note_id: impl Into<String>,
        provider: ProviderKind,
        extras: Option<String>,
    ) -> Self {
        Self {
            mapping_id: 0,
            local_note_id: Some(local_note_id),
            remote_note_id: Some(remote_note_id.into()),
            provider: Some(provider),
            extras,
        }
    }

    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.provider.is_some() && self.remote_note_id.is_some()
    }
}
