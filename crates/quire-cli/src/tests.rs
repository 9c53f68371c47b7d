use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use quire_core::config::{CloudService, FileStorageSettings, SyncPreferences};
use quire_core::services::DatabaseService;
use quire_core::sync::{
    NetworkStatus, StaticConnectivity, SyncActor, SyncError, SyncManager, SyncReport,
};
use quire_core::{Note, NoteId, ProviderKind};

use crate::commands::add::run_add;
use crate::commands::bin::{run_bin, run_restore};
use crate::commands::common::{
    format_relative_time, normalize_content, note_preview, parse_note_id, preferred_editor,
    sync_outcome_message,
};
use crate::commands::config::{apply_directory, apply_nextcloud, render_redacted};
use crate::commands::delete::run_delete;
use crate::commands::sync::format_sync_report;
use crate::commands::App;
use crate::error::CliError;

fn directory_manager(actor: &SyncActor, root: &Path, status: NetworkStatus) -> SyncManager {
    let preferences = SyncPreferences {
        cloud_service: CloudService::FileStorage,
        file_storage: FileStorageSettings {
            directory: Some(root.to_path_buf()),
        },
        ..SyncPreferences::default()
    };
    SyncManager::new(
        actor.handle(),
        Arc::new(preferences),
        Arc::new(StaticConnectivity(status)),
    )
    .unwrap()
}

fn directory_app(root: &Path, config_path: &Path) -> (App, SyncActor) {
    let db = DatabaseService::open_in_memory().unwrap();
    let actor = SyncActor::spawn(db.clone());
    let app = App {
        db,
        manager: directory_manager(&actor, root, NetworkStatus::Unmetered),
        config_path: config_path.to_path_buf(),
    };
    (app, actor)
}

/// Same store and directory, seen through a manager without network
fn offline_view(app: &App, actor: &SyncActor, root: &Path) -> App {
    App {
        db: app.db.clone(),
        manager: directory_manager(actor, root, NetworkStatus::Offline),
        config_path: app.config_path.clone(),
    }
}

fn note_files(root: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

async fn only_note(app: &App) -> Note {
    let notes = app.db.get_all_notes().await.unwrap();
    assert_eq!(notes.len(), 1);
    notes.into_iter().next().unwrap()
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn preferred_editor_is_never_empty() {
    assert!(!preferred_editor().trim().is_empty());
}

#[test]
fn relative_time_uses_seconds() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 5, now), "just now");
    assert_eq!(format_relative_time(now - 120, now), "2m ago");
    assert_eq!(format_relative_time(now - 3 * 3600, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400, now), "2d ago");
    assert_eq!(format_relative_time(now - 14 * 86_400, now), "2w ago");
    assert_eq!(format_relative_time(now - 400 * 86_400, now), "1y ago");
    // Clock skew never yields a negative age
    assert_eq!(format_relative_time(now + 60, now), "just now");
}

#[test]
fn preview_prefers_title_and_truncates() {
    let titled = Note::new("Groceries", "milk\neggs");
    assert_eq!(note_preview(&titled, 40), "Groceries");

    let untitled = Note::new("", "\n  a   very long first line of text here\nsecond");
    assert_eq!(note_preview(&untitled, 12), "a very lo...");
}

#[test]
fn parse_note_id_rejects_garbage_and_unsaved() {
    assert_eq!(parse_note_id(" 42 ").unwrap(), NoteId::new(42));
    assert!(matches!(parse_note_id("abc"), Err(CliError::InvalidNoteId(_))));
    assert!(matches!(parse_note_id("0"), Err(CliError::InvalidNoteId(_))));
}

#[test]
fn sync_outcome_is_quiet_when_disabled_or_successful() {
    assert_eq!(sync_outcome_message("edit", &Ok(())), None);
    assert_eq!(
        sync_outcome_message("edit", &Err(SyncError::SyncingNotEnabled)),
        None
    );
    assert_eq!(
        sync_outcome_message("edit", &Err(SyncError::NoConnectivity)).as_deref(),
        Some("Offline: edit will be sent with the next sync")
    );
    assert_eq!(
        sync_outcome_message("bin", &Err(SyncError::Unauthorized)).as_deref(),
        Some("Sync of bin failed, the next sync retries it: Authentication failed")
    );
}

#[test]
fn sync_report_lists_only_nonzero_counts() {
    assert_eq!(
        format_sync_report(&SyncReport::default()),
        vec!["Already up to date".to_string()]
    );

    let report = SyncReport {
        pulled: 2,
        created_remotely: 1,
        ..SyncReport::default()
    };
    assert_eq!(
        format_sync_report(&report),
        vec!["pulled: 2".to_string(), "created remotely: 1".to_string()]
    );
}

#[test]
fn nextcloud_config_requires_http_url_and_username() {
    let mut preferences = SyncPreferences::default();
    assert!(matches!(
        apply_nextcloud(&mut preferences, "cloud.example.com", "alice", "pw".into()),
        Err(CliError::Config(_))
    ));
    assert!(matches!(
        apply_nextcloud(&mut preferences, "https://cloud.example.com", "  ", "pw".into()),
        Err(CliError::Config(_))
    ));
    assert_eq!(preferences.cloud_service, CloudService::Disabled);

    apply_nextcloud(
        &mut preferences,
        " https://cloud.example.com/ ",
        " alice ",
        "pw".into(),
    )
    .unwrap();
    assert_eq!(preferences.provider_kind(), Some(ProviderKind::Nextcloud));
    assert_eq!(
        preferences.nextcloud.instance_url.as_deref(),
        Some("https://cloud.example.com")
    );
    assert_eq!(preferences.nextcloud.username.as_deref(), Some("alice"));
}

#[test]
fn show_redacts_password() {
    let mut preferences = SyncPreferences::default();
    apply_nextcloud(
        &mut preferences,
        "https://cloud.example.com",
        "alice",
        "hunter2".into(),
    )
    .unwrap();

    let rendered = render_redacted(&preferences).unwrap();
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("********"));
}

#[test]
fn directory_config_selects_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let mut preferences = SyncPreferences::default();
    apply_directory(&mut preferences, dir.path().to_path_buf());

    assert_eq!(preferences.provider_kind(), Some(ProviderKind::FileStorage));
    assert!(preferences.file_storage.directory.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn add_writes_note_file_and_mapping() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));

    run_add(&app, Some("Plan".into()), None, false, &["ship it".into()])
        .await
        .unwrap();

    let note = only_note(&app).await;
    let mappings = app.db.get_mappings_for_note(note.id).await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(note_files(root.path()), vec!["Plan.md".to_string()]);

    drop(app);
    actor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn local_only_note_never_reaches_the_directory() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));

    run_add(&app, Some("Secret".into()), None, true, &["diary".into()])
        .await
        .unwrap();

    assert!(note_files(root.path()).is_empty());
    let note = only_note(&app).await;
    assert!(note.is_local_only);

    drop(app);
    actor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bin_and_restore_round_trip_through_the_directory() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));

    run_add(&app, Some("Plan".into()), None, false, &["ship it".into()])
        .await
        .unwrap();
    let id = only_note(&app).await.id.to_string();

    run_bin(&app, &id).await.unwrap();
    assert!(only_note(&app).await.is_deleted);
    assert!(note_files(root.path()).is_empty());

    run_restore(&app, &id).await.unwrap();
    assert!(!only_note(&app).await.is_deleted);
    assert_eq!(note_files(root.path()), vec!["Plan.md".to_string()]);

    drop(app);
    actor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_remote_copy_then_local_row() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));

    run_add(&app, Some("Plan".into()), None, false, &["ship it".into()])
        .await
        .unwrap();
    let note = only_note(&app).await;

    run_delete(&app, &note.id.to_string()).await.unwrap();

    assert!(app.db.get_all_notes().await.unwrap().is_empty());
    assert!(app.db.get_mappings_for_note(note.id).await.unwrap().is_empty());
    assert!(note_files(root.path()).is_empty());

    drop(app);
    actor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_bin_reaches_the_directory_on_next_sync() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));

    run_add(&app, Some("Plan".into()), None, false, &["ship it".into()])
        .await
        .unwrap();
    let id = only_note(&app).await.id.to_string();

    let offline = offline_view(&app, &actor, root.path());
    run_bin(&offline, &id).await.unwrap();
    assert!(only_note(&app).await.is_deleted);
    assert_eq!(note_files(root.path()), vec!["Plan.md".to_string()]);

    let report = app.manager.sync().await.unwrap();
    assert_eq!(report.removed_binned, 1);
    assert_eq!(report.pulled, 0);
    assert!(note_files(root.path()).is_empty());
    assert!(only_note(&app).await.is_deleted);

    drop((app, offline));
    actor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_is_refused_while_remote_copy_is_unreachable() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));

    run_add(&app, Some("Plan".into()), None, false, &["ship it".into()])
        .await
        .unwrap();
    let note = only_note(&app).await;

    let offline = offline_view(&app, &actor, root.path());
    let result = run_delete(&offline, &note.id.to_string()).await;
    assert!(matches!(
        result,
        Err(CliError::RemoteCopyRemains(id, SyncError::NoConnectivity)) if id == note.id
    ));
    assert_eq!(only_note(&app).await.id, note.id);
    assert!(!app.db.get_mappings_for_note(note.id).await.unwrap().is_empty());

    // A later sync must not resurrect anything either
    assert!(app.manager.sync().await.unwrap().is_empty());
    assert_eq!(note_files(root.path()), vec!["Plan.md".to_string()]);

    drop((app, offline));
    actor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn never_synced_note_deletes_while_offline() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));
    let offline = offline_view(&app, &actor, root.path());

    run_add(&offline, Some("Draft".into()), None, false, &["later".into()])
        .await
        .unwrap();
    let note = only_note(&app).await;
    assert!(note_files(root.path()).is_empty());

    run_delete(&offline, &note.id.to_string()).await.unwrap();
    assert!(app.db.get_all_notes().await.unwrap().is_empty());

    drop((app, offline));
    actor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_note_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let (app, actor) = directory_app(root.path(), &config.path().join("preferences.json"));

    let result = run_delete(&app, "99").await;
    assert!(matches!(result, Err(CliError::NoteNotFound(id)) if id == "99"));

    drop(app);
    actor.shutdown().await;
}
