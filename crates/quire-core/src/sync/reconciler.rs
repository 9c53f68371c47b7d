//! Two-way reconciliation of local notes with one provider.
//!
//! A run is not transactional: each phase applies its mutations before the
//! next one starts, and a provider failure aborts the remaining phases. Every
//! decision is re-derived from the current tokens, so re-running after a
//! partial failure converges.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{IdMapping, Note, NoteId, NotebookId};
use crate::services::DatabaseService;

use super::config::ProviderConfig;
use super::error::{SyncError, SyncResult};
use super::provider::{Comparison, RemoteNote, SyncProvider};

/// Per-phase counts of a completed sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Remote-only notes inserted locally
    pub pulled: usize,
    /// Local notes whose newer state was pushed to the provider
    pub pushed: usize,
    /// Local notes overwritten by a newer remote version
    pub updated_locally: usize,
    /// Local notes binned because their remote copy disappeared
    pub moved_to_bin: usize,
    /// Never-synced local notes created on the provider
    pub created_remotely: usize,
    /// Remote copies removed because the local note became local-only
    pub removed_local_only: usize,
    /// Remote copies binned or removed because the local note was binned
    pub removed_binned: usize,
}

impl SyncReport {
    /// Whether the run changed nothing on either side
    pub const fn is_empty(&self) -> bool {
        self.pulled == 0
            && self.pushed == 0
            && self.updated_locally == 0
            && self.moved_to_bin == 0
            && self.created_remotely == 0
            && self.removed_local_only == 0
            && self.removed_binned == 0
    }
}

/// Name of the notebook a note is filed under
pub(crate) async fn notebook_name(
    db: &DatabaseService,
    note: &Note,
) -> SyncResult<Option<String>> {
    let Some(notebook_id) = note.notebook_id else {
        return Ok(None);
    };
    Ok(db.get_notebook(notebook_id).await?.map(|notebook| notebook.name))
}

/// One sync run against one provider
pub(crate) struct Reconciler<'a> {
    db: &'a DatabaseService,
    provider: &'a SyncProvider,
    config: &'a ProviderConfig,
}

impl<'a> Reconciler<'a> {
    pub(crate) const fn new(
        db: &'a DatabaseService,
        provider: &'a SyncProvider,
        config: &'a ProviderConfig,
    ) -> Self {
        Self {
            db,
            provider,
            config,
        }
    }

    pub(crate) async fn run(&self) -> SyncResult<SyncReport> {
        let kind = self.provider.kind();
        let mut report = SyncReport::default();
        tracing::info!("Starting sync with {}", kind);

        let all_notes = dedupe_by(self.db.get_all_notes().await?, |note| note.id);
        // Before GC, which would forget the mappings of notes that stopped syncing
        report.removed_local_only = self
            .remove_remote_copies(
                all_notes
                    .iter()
                    .filter(|note| note.is_local_only)
                    .collect::<Vec<_>>(),
            )
            .await?;
        report.removed_binned = self
            .remove_remote_copies(
                all_notes
                    .iter()
                    .filter(|note| note.is_deleted && !note.is_local_only)
                    .collect::<Vec<_>>(),
            )
            .await?;

        let live_notes = all_notes
            .into_iter()
            .filter(Note::is_syncable)
            .collect::<Vec<_>>();
        let live_ids = live_notes.iter().map(|note| note.id).collect::<Vec<_>>();
        let collected = self.db.delete_mappings_if_local_id_not_in(&live_ids).await?;
        if collected > 0 {
            tracing::debug!("Removed {} stale mappings", collected);
        }

        let remote_notes = dedupe_by(self.provider.get_all(self.config).await?, RemoteNote::id);
        let mappings = self.db.get_mappings_for_provider(kind).await?;
        let by_remote_id = mappings
            .iter()
            .filter_map(|mapping| Some((mapping.remote_note_id.clone()?, mapping)))
            .collect::<HashMap<_, _>>();
        let local_by_id = live_notes
            .iter()
            .map(|note| (note.id, note))
            .collect::<HashMap<_, _>>();
        let mut pending_local = live_notes
            .iter()
            .map(|note| note.id)
            .filter(|id| !mappings.iter().any(|mapping| mapping.local_note_id == Some(*id)))
            .collect::<Vec<_>>();

        let mut live_remote_ids = Vec::with_capacity(remote_notes.len());
        let mut overwrites = Vec::new();
        let mut refreshed_mappings = Vec::new();

        for remote in &remote_notes {
            let remote_id = remote.id();
            live_remote_ids.push(remote_id.clone());

            let Some(mapping) = by_remote_id.get(&remote_id) else {
                self.pull(remote).await?;
                report.pulled += 1;
                continue;
            };
            let Some(local) = mapping
                .local_note_id
                .and_then(|id| local_by_id.get(&id).copied())
            else {
                continue;
            };

            match remote.compare(local, mapping) {
                Comparison::IsNewer => {
                    let mut updated = remote.to_local_note(Some(local));
                    updated.notebook_id = self.resolve_notebook(remote).await?;
                    overwrites.push(updated);
                    refreshed_mappings.push(IdMapping {
                        extras: Some(remote.token()),
                        ..(*mapping).clone()
                    });
                }
                Comparison::IsOutdated => {
                    let notebook = notebook_name(self.db, local).await?;
                    let pushed = self
                        .provider
                        .update_note(local, notebook.as_deref(), self.config, mapping)
                        .await?;
                    // Pushing may move the note (file renames), keep the new id live
                    let pushed_id = pushed.id();
                    if pushed_id != remote_id {
                        live_remote_ids.push(pushed_id.clone());
                    }
                    self.db
                        .update_mappings(&[IdMapping {
                            remote_note_id: Some(pushed_id),
                            extras: Some(pushed.token()),
                            ..(*mapping).clone()
                        }])
                        .await?;
                    report.pushed += 1;
                }
                Comparison::IsSame => {}
            }
        }

        if !overwrites.is_empty() {
            self.db.update_notes(&overwrites).await?;
            self.db.update_mappings(&refreshed_mappings).await?;
            report.updated_locally = overwrites.len();
        }

        let removed_remotely = self
            .db
            .unassign_provider_from_remotely_deleted_notes(kind, &live_remote_ids)
            .await?;
        let binned = removed_remotely
            .into_iter()
            .filter(|id| local_by_id.contains_key(id))
            .collect::<Vec<_>>();
        if !binned.is_empty() {
            self.db.move_notes_to_bin(&binned).await?;
            report.moved_to_bin = binned.len();
        }

        pending_local.retain(|id| !binned.contains(id));
        for id in pending_local {
            let Some(local) = local_by_id.get(&id) else {
                continue;
            };
            let notebook = notebook_name(self.db, local).await?;
            let created = self
                .provider
                .create_note(local, notebook.as_deref(), self.config)
                .await?;
            self.db
                .assign_provider_to_note(&created.to_mapping(local.id))
                .await?;
            report.created_remotely += 1;
        }

        tracing::info!(
            "Sync with {} finished: {} pulled, {} pushed, {} updated locally, {} binned, {} created remotely, {} unlinked, {} binned remotely",
            kind,
            report.pulled,
            report.pushed,
            report.updated_locally,
            report.moved_to_bin,
            report.created_remotely,
            report.removed_local_only,
            report.removed_binned
        );
        Ok(report)
    }

    /// Take the remote copy of mapped notes that no longer sync off the provider.
    ///
    /// Local-only notes are deleted remotely. Binned notes go to the remote bin,
    /// or are deleted where the provider has none.
    async fn remove_remote_copies<'n>(
        &self,
        notes: impl IntoIterator<Item = &'n Note>,
    ) -> SyncResult<usize> {
        let kind = self.provider.kind();
        let mut unlinked = Vec::new();
        for note in notes {
            let Some(mapping) = self.db.get_mapping_by_local_id(note.id, kind).await? else {
                continue;
            };
            if note.is_local_only {
                self.provider.delete_note(note, self.config, &mapping).await?;
            } else {
                match self.provider.move_to_bin(note, self.config, &mapping).await {
                    Err(SyncError::OperationNotSupported) => {
                        self.provider.delete_note(note, self.config, &mapping).await?;
                    }
                    result => result?,
                }
            }
            unlinked.push(note.id);
        }

        if !unlinked.is_empty() {
            self.db.unassign_provider_from_notes(kind, &unlinked).await?;
        }
        Ok(unlinked.len())
    }

    /// Insert a remote-only note and link it
    async fn pull(&self, remote: &RemoteNote) -> SyncResult<NoteId> {
        let mut note = remote.to_local_note(None);
        note.notebook_id = self.resolve_notebook(remote).await?;
        let id = self.db.insert_note(&note).await?;
        self.db.insert_mappings(&[remote.to_mapping(id)]).await?;
        tracing::debug!("Pulled remote note {} as {}", remote.id(), id);
        Ok(id)
    }

    async fn resolve_notebook(&self, remote: &RemoteNote) -> SyncResult<Option<NotebookId>> {
        match remote.notebook_name() {
            Some(name) => Ok(Some(self.db.get_or_create_notebook(name).await?)),
            None => Ok(None),
        }
    }
}

/// Keep the first item for each key
fn dedupe_by<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderKind;
    use crate::sync::config::{CloudConfig, DirectoryConfig};
    use crate::sync::file_storage::FileStorageProvider;
    use crate::sync::nextcloud::NextcloudProvider;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, UNIX_EPOCH};

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: std::path::PathBuf,
        db: DatabaseService,
        provider: SyncProvider,
        config: ProviderConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().to_path_buf();
            Self {
                config: ProviderConfig::Directory(DirectoryConfig { root: root.clone() }),
                _tmp: tmp,
                root,
                db: DatabaseService::open_in_memory().unwrap(),
                provider: SyncProvider::FileStorage(FileStorageProvider::new()),
            }
        }

        async fn sync(&self) -> SyncResult<SyncReport> {
            Reconciler::new(&self.db, &self.provider, &self.config).run().await
        }

        async fn insert(&self, title: &str, body: &str, modified: i64) -> NoteId {
            let note = Note {
                modified_date: modified,
                creation_date: modified,
                ..Note::new(title, body)
            };
            self.db.insert_note(&note).await.unwrap()
        }

        async fn note(&self, id: NoteId) -> Note {
            self.db.get_note(id).await.unwrap().unwrap()
        }

        async fn mapping(&self, id: NoteId) -> Option<IdMapping> {
            self.db
                .get_mapping_by_local_id(id, ProviderKind::FileStorage)
                .await
                .unwrap()
        }
    }

    fn write_external(path: &Path, contents: &str, modified: u64) {
        fs::write(path, contents).unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(modified))
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unmapped_local_note_is_created_remotely() {
        let fx = Fixture::new();
        let id = fx.insert("x", "hello", 100).await;

        let report = fx.sync().await.unwrap();
        assert_eq!(report.created_remotely, 1);

        let mapping = fx.mapping(id).await.unwrap();
        assert_eq!(mapping.remote_note_id.as_deref(), Some("x.md"));
        assert_eq!(mapping.provider, Some(ProviderKind::FileStorage));
        assert_eq!(mapping.extras.as_deref(), Some("100"));
        assert!(fx.root.join("x.md").is_file());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_sync_without_changes_is_a_no_op() {
        let fx = Fixture::new();
        fx.insert("a", "one", 100).await;
        fx.insert("b", "two", 120).await;
        fs::create_dir(fx.root.join("Work")).unwrap();
        write_external(&fx.root.join("Work").join("c.md"), "three", 130);

        let first = fx.sync().await.unwrap();
        assert_eq!(first.created_remotely, 2);
        assert_eq!(first.pulled, 1);

        let second = fx.sync().await.unwrap();
        assert!(second.is_empty(), "unexpected changes: {second:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_remote_overwrites_local_without_pushing() {
        let fx = Fixture::new();
        let id = fx.insert("x", "old body", 100).await;
        fx.sync().await.unwrap();

        let path = fx.root.join("x.md");
        write_external(&path, "edited elsewhere", 200);

        let report = fx.sync().await.unwrap();
        assert_eq!(report.updated_locally, 1);
        assert_eq!(report.pushed, 0);

        let note = fx.note(id).await;
        assert_eq!(note.content, "edited elsewhere");
        assert_eq!(note.modified_date, 200);
        assert_eq!(fx.mapping(id).await.unwrap().extras.as_deref(), Some("200"));
        // The file was not rewritten by a push
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited elsewhere");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_local_note_is_pushed() {
        let fx = Fixture::new();
        let id = fx.insert("x", "v1", 100).await;
        fx.sync().await.unwrap();

        let mut note = fx.note(id).await;
        note.title = "renamed".to_string();
        note.content = "v2".to_string();
        note.modified_date = 300;
        fx.db.update_notes(&[note]).await.unwrap();

        let report = fx.sync().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.moved_to_bin, 0);

        let mapping = fx.mapping(id).await.unwrap();
        assert_eq!(mapping.remote_note_id.as_deref(), Some("renamed.md"));
        assert_eq!(mapping.extras.as_deref(), Some("300"));
        assert!(!fx.root.join("x.md").exists());
        assert!(fs::read_to_string(fx.root.join("renamed.md"))
            .unwrap()
            .starts_with("v2"));
        assert!(!fx.note(id).await.is_deleted);

        assert!(fx.sync().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remotely_deleted_note_moves_to_bin_once() {
        let fx = Fixture::new();
        let id = fx.insert("b", "body", 100).await;
        fx.sync().await.unwrap();

        fs::remove_file(fx.root.join("b.md")).unwrap();
        let report = fx.sync().await.unwrap();
        assert_eq!(report.moved_to_bin, 1);

        let note = fx.note(id).await;
        assert!(note.is_deleted);
        let rows = fx.db.get_mappings_for_note(id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_note_id, None);
        assert_eq!(rows[0].provider, None);

        let again = fx.sync().await.unwrap();
        assert_eq!(again.moved_to_bin, 0);
        assert_eq!(again.created_remotely, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_only_note_gets_one_mapping_once_syncable() {
        let fx = Fixture::new();
        let id = fx
            .db
            .insert_note(&Note {
                is_local_only: true,
                ..Note::new("private", "body")
            })
            .await
            .unwrap();

        fx.sync().await.unwrap();
        assert!(fx.mapping(id).await.is_none());
        assert!(fs::read_dir(&fx.root).unwrap().next().is_none());

        let mut note = fx.note(id).await;
        note.is_local_only = false;
        fx.db.update_notes(&[note]).await.unwrap();

        fx.sync().await.unwrap();
        fx.sync().await.unwrap();
        let rows = fx.db.get_mappings_for_note(id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_assigned());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn note_turned_local_only_is_removed_remotely() {
        let fx = Fixture::new();
        let id = fx.insert("shared", "body", 100).await;
        fx.sync().await.unwrap();
        assert!(fx.root.join("shared.md").is_file());

        let mut note = fx.note(id).await;
        note.is_local_only = true;
        fx.db.update_notes(&[note]).await.unwrap();

        let report = fx.sync().await.unwrap();
        assert_eq!(report.removed_local_only, 1);
        assert_eq!(report.pulled, 0);
        assert!(!fx.root.join("shared.md").exists());
        assert!(fx.mapping(id).await.is_none());
        assert_eq!(fx.db.get_all_notes().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn note_binned_offline_is_removed_remotely_not_pulled_back() {
        let fx = Fixture::new();
        let id = fx.insert("keep", "body", 100).await;
        fx.sync().await.unwrap();
        assert!(fx.root.join("keep.md").is_file());

        // Bin committed locally while the forward to the provider failed
        fx.db.move_notes_to_bin(&[id]).await.unwrap();

        let report = fx.sync().await.unwrap();
        assert_eq!(report.removed_binned, 1);
        assert_eq!(report.pulled, 0);
        assert!(!fx.root.join("keep.md").exists());
        assert!(fx.mapping(id).await.is_none());

        let notes = fx.db.get_all_notes().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].is_deleted);

        assert!(fx.sync().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn note_restored_before_next_sync_keeps_its_remote_copy() {
        let fx = Fixture::new();
        let id = fx.insert("back", "body", 100).await;
        fx.sync().await.unwrap();

        fx.db.move_notes_to_bin(&[id]).await.unwrap();
        fx.db.restore_notes(&[id]).await.unwrap();

        let report = fx.sync().await.unwrap();
        assert_eq!(report.removed_binned, 0);
        assert!(fx.root.join("back.md").is_file());
        assert!(fx.mapping(id).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pulled_notes_land_in_their_notebook() {
        let fx = Fixture::new();
        fs::create_dir(fx.root.join("Recipes")).unwrap();
        write_external(&fx.root.join("Recipes").join("Soup.md"), "water", 50);

        let report = fx.sync().await.unwrap();
        assert_eq!(report.pulled, 1);

        let notes = fx.db.get_all_notes().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Soup");
        assert_eq!(notes[0].modified_date, 50);
        let notebook = fx
            .db
            .get_notebook(notes[0].notebook_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notebook.name, "Recipes");

        let mapping = fx.mapping(notes[0].id).await.unwrap();
        assert_eq!(mapping.remote_note_id.as_deref(), Some("Recipes/Soup.md"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn binned_notes_are_not_pushed() {
        let fx = Fixture::new();
        let id = fx.insert("gone", "body", 100).await;
        fx.db.move_notes_to_bin(&[id]).await.unwrap();

        let report = fx.sync().await.unwrap();
        assert!(report.is_empty());
        assert!(fx.mapping(id).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_provider_surfaces_no_connectivity() {
        let db = DatabaseService::open_in_memory().unwrap();
        let id = db.insert_note(&Note::new("x", "body")).await.unwrap();
        let provider = SyncProvider::Nextcloud(NextcloudProvider::new().unwrap());
        let config = ProviderConfig::Cloud(CloudConfig::with_basic_auth(
            "http://127.0.0.1:1",
            "alice",
            "secret",
        ));

        let result = Reconciler::new(&db, &provider, &config).run().await;
        assert_eq!(result, Err(SyncError::NoConnectivity));
        // Nothing was rolled back or half-applied locally
        let note = db.get_note(id).await.unwrap().unwrap();
        assert!(!note.is_deleted);
        assert!(db.get_mappings_for_note(id).await.unwrap().is_empty());
    }

    #[test]
    fn dedupe_keeps_first_seen() {
        let items = vec![(1, "a"), (2, "b"), (1, "c")];
        assert_eq!(dedupe_by(items, |item| item.0), vec![(1, "a"), (2, "b")]);
    }
}
