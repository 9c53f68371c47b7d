use std::io;

use quire_core::sync::SyncError;
use quire_core::NoteId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quire_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Invalid note id: {0}")]
    InvalidNoteId(String),
    #[error("Note not found: {0}")]
    NoteNotFound(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error(
        "Note {0} still has a remote copy ({1}); move it to the bin or delete it again once sync works"
    )]
    RemoteCopyRemains(NoteId, SyncError),
    #[error("Configuration error: {0}")]
    Config(String),
}
