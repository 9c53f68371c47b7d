use std::env;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::Command;

use chrono::Utc;
use quire_core::services::DatabaseService;
use quire_core::sync::{SyncError, SyncResult};
use quire_core::{Note, NoteId};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: NoteId,
    pub title: String,
    pub preview: String,
    pub notebook: Option<String>,
    pub modified_date: i64,
    pub relative_time: String,
    pub is_local_only: bool,
    pub is_deleted: bool,
    pub tags: Vec<String>,
}

pub fn note_to_list_item(note: &Note, notebook: Option<&str>, now: i64) -> NoteListItem {
    let mut tags = note.tags.clone();
    tags.sort();

    NoteListItem {
        id: note.id,
        title: note.title.clone(),
        preview: note_preview(note, 80),
        notebook: notebook.map(str::to_string),
        modified_date: note.modified_date,
        relative_time: format_relative_time(note.modified_date, now),
        is_local_only: note.is_local_only,
        is_deleted: note.is_deleted,
        tags,
    }
}

pub fn format_note_line(note: &Note, now: i64) -> String {
    let id = note.id.to_string();
    let preview = note_preview(note, 40);
    let relative_time = format_relative_time(note.modified_date, now);
    let marker = if note.is_local_only { "  (local)" } else { "" };
    format!("{id:>6}  {preview:<40}  {relative_time}{marker}")
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.title_preview(usize::MAX);
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

const RELATIVE_UNITS: [(i64, &str); 6] = [
    (365 * 86_400, "y"),
    (30 * 86_400, "mo"),
    (7 * 86_400, "w"),
    (86_400, "d"),
    (3_600, "h"),
    (60, "m"),
];

/// Both timestamps are in seconds
pub fn format_relative_time(timestamp: i64, now: i64) -> String {
    let age = now.saturating_sub(timestamp);
    RELATIVE_UNITS
        .iter()
        .find(|(seconds, _)| age >= *seconds)
        .map_or_else(
            || "just now".to_string(),
            |(seconds, unit)| format!("{}{unit} ago", age / seconds),
        )
}

pub fn now_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Message to show for a forwarded mutation, `None` when there is nothing to say.
///
/// The next sync reconciles creates, edits, bins and restores from local
/// state, so a failed forward only delays them.
pub fn sync_outcome_message(action: &str, outcome: &SyncResult<()>) -> Option<String> {
    match outcome {
        Ok(()) | Err(SyncError::SyncingNotEnabled) => None,
        Err(SyncError::NoConnectivity) => Some(format!(
            "Offline: {action} will be sent with the next sync"
        )),
        Err(error) => Some(format!(
            "Sync of {action} failed, the next sync retries it: {error}"
        )),
    }
}

/// Local changes stay committed whatever the sync outcome
pub fn report_sync_outcome(action: &str, outcome: &SyncResult<()>) {
    if let Some(message) = sync_outcome_message(action, outcome) {
        eprintln!("{message}");
    }
}

pub fn parse_note_id(id: &str) -> Result<NoteId, CliError> {
    let trimmed = id.trim();
    match trimmed.parse::<NoteId>() {
        Ok(note_id) if note_id.is_saved() => Ok(note_id),
        _ => Err(CliError::InvalidNoteId(trimmed.to_string())),
    }
}

pub async fn load_note(db: &DatabaseService, id: &str) -> Result<Note, CliError> {
    let note_id = parse_note_id(id)?;
    db.get_note(note_id)
        .await?
        .ok_or_else(|| CliError::NoteNotFound(note_id.to_string()))
}

/// Content from the arguments, then piped stdin, then the editor
pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    let stdin = io::stdin();
    let piped = if stdin.is_terminal() {
        None
    } else {
        let mut buffer = String::new();
        stdin.lock().read_to_string(&mut buffer)?;
        normalize_content(&buffer)
    };

    match piped {
        Some(content) => Ok(content),
        None => edit_in_editor("")?.ok_or(CliError::EmptyContent),
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Open `initial` in `$VISUAL`/`$EDITOR` and return the saved text
pub fn edit_in_editor(initial: &str) -> Result<Option<String>, CliError> {
    let mut file = tempfile::Builder::new()
        .prefix("quire-note-")
        .suffix(".md")
        .tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    // EDITOR may carry arguments, e.g. "code --wait"
    let editor = preferred_editor();
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| CliError::EditorFailed("empty EDITOR command".into()))?;
    let status = Command::new(program).args(parts).arg(file.path()).status()?;
    if !status.success() {
        return Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )));
    }

    Ok(normalize_content(&fs::read_to_string(file.path())?))
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| (if cfg!(windows) { "notepad" } else { "vi" }).to_string())
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("QUIRE_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("quire").join("quire.db"))
        .ok_or_else(|| CliError::Config("could not resolve a data directory".into()))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) =
        cli_config_path.or_else(|| env::var_os("QUIRE_CONFIG").map(PathBuf::from))
    {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("quire").join("preferences.json"))
        .ok_or_else(|| CliError::Config("could not resolve a config directory".into()))
}
