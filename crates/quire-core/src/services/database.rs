//! Shared database service wrapper used by the sync engine and clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, MappingRepository, NoteRepository, SqliteMappingRepository, SqliteNoteRepository,
};
use crate::models::{IdMapping, Note, NoteId, Notebook, NotebookId, ProviderKind};
use crate::Result;

/// Thread-safe service for note and mapping storage.
///
/// Clones share one connection; each call holds the lock only for the
/// duration of its own statements.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened note database at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Location of the database file, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Insert a note, returning its assigned id.
    pub async fn insert_note(&self, note: &Note) -> Result<NoteId> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).insert_note(note)
    }

    /// Overwrite notes by id.
    pub async fn update_notes(&self, notes: &[Note]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).update_notes(notes)
    }

    /// Soft-delete notes.
    pub async fn move_notes_to_bin(&self, ids: &[NoteId]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).move_notes_to_bin(ids)
    }

    /// Restore binned notes.
    pub async fn restore_notes(&self, ids: &[NoteId]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).restore_notes(ids)
    }

    /// Permanently delete notes.
    pub async fn delete_notes(&self, ids: &[NoteId]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).delete_notes(ids)
    }

    /// All notes, newest first.
    pub async fn get_all_notes(&self) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).get_all()
    }

    /// Fetch a note by id.
    pub async fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).get_by_id(id)
    }

    /// Fetch a notebook by id.
    pub async fn get_notebook(&self, id: NotebookId) -> Result<Option<Notebook>> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).get_notebook(id)
    }

    /// Resolve a notebook name to an id, creating the notebook when missing.
    pub async fn get_or_create_notebook(&self, name: &str) -> Result<NotebookId> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).get_or_create_notebook(name)
    }

    /// All notebooks.
    pub async fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).list_notebooks()
    }

    /// Insert mappings.
    pub async fn insert_mappings(&self, mappings: &[IdMapping]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).insert(mappings)
    }

    /// Update mappings by row id.
    pub async fn update_mappings(&self, mappings: &[IdMapping]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).update(mappings)
    }

    /// Delete mappings by row id.
    pub async fn delete_mappings(&self, mappings: &[IdMapping]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).delete(mappings)
    }

    /// Mapping of a local note under a provider.
    pub async fn get_mapping_by_local_id(
        &self,
        local_id: NoteId,
        provider: ProviderKind,
    ) -> Result<Option<IdMapping>> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).get_by_local_id(local_id, provider)
    }

    /// Mapping of a remote note under a provider.
    pub async fn get_mapping_by_remote_id(
        &self,
        remote_id: &str,
        provider: ProviderKind,
    ) -> Result<Option<IdMapping>> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).get_by_remote_id(remote_id, provider)
    }

    /// Every mapping assigned to a provider.
    pub async fn get_mappings_for_provider(
        &self,
        provider: ProviderKind,
    ) -> Result<Vec<IdMapping>> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).get_all_for_provider(provider)
    }

    /// Every mapping row of a local note, assigned or not.
    pub async fn get_mappings_for_note(&self, local_id: NoteId) -> Result<Vec<IdMapping>> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).get_all_for_note(local_id)
    }

    /// Idempotently link a local note to a remote note.
    pub async fn assign_provider_to_note(&self, mapping: &IdMapping) -> Result<()> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).assign_provider_to_note(mapping)
    }

    /// Detach `provider` and its remote id from the notes' mappings.
    pub async fn unassign_provider_from_notes(
        &self,
        provider: ProviderKind,
        local_ids: &[NoteId],
    ) -> Result<()> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection())
            .unassign_provider_from_notes(provider, local_ids)
    }

    /// Garbage-collect mappings of notes that are no longer live.
    pub async fn delete_mappings_if_local_id_not_in(&self, live_ids: &[NoteId]) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection()).delete_if_local_id_not_in(live_ids)
    }

    /// Unassign mappings whose remote note vanished from the provider.
    pub async fn unassign_provider_from_remotely_deleted_notes(
        &self,
        provider: ProviderKind,
        live_remote_ids: &[String],
    ) -> Result<Vec<NoteId>> {
        let db = self.db.lock().await;
        SqliteMappingRepository::new(db.connection())
            .unassign_provider_from_remotely_deleted_notes(provider, live_remote_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_insert_and_fetch_roundtrip() {
        let service = DatabaseService::open_in_memory().unwrap();

        let id = service.insert_note(&Note::new("hello", "core")).await.unwrap();
        let notes = service.get_all_notes().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, id);
        assert_eq!(notes[0].content, "core");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("quire.db");

        let service = DatabaseService::open_path(&path).unwrap();
        assert_eq!(service.path(), Some(&path));
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clones_share_the_same_database() {
        let service = DatabaseService::open_in_memory().unwrap();
        let clone = service.clone();

        let id = clone.insert_note(&Note::new("shared", "")).await.unwrap();
        let mapping = IdMapping::new(id, "R1", ProviderKind::FileStorage, None);
        clone.assign_provider_to_note(&mapping).await.unwrap();

        assert!(service
            .get_mapping_by_remote_id("R1", ProviderKind::FileStorage)
            .await
            .unwrap()
            .is_some());
    }
}
