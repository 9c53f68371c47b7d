//! Local-directory provider.
//!
//! Notes are plain `.md`/`.txt` files under a root directory; first-level
//! subdirectories are notebooks. Properties that have no place in a plain
//! file are kept in a JSON block at the end of the file:
//!
//! ```text
//! Note body
//!
//! <!-- quire-metadata
//! { "is_pinned": true, ... }
//! quire-metadata -->
//! ```
//!
//! The remote id is the path relative to the root and the change token is the
//! file modification time, which every write sets to the note's
//! `modified_date`.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::models::{Attachment, IdMapping, Note, NoteColor, Reminder};

use super::config::DirectoryConfig;
use super::error::{SyncError, SyncResult};

const METADATA_START: &str = "<!-- quire-metadata";
const METADATA_END: &str = "quire-metadata -->";
const MARKDOWN_EXTENSION: &str = "md";
const TEXT_EXTENSION: &str = "txt";
const MAX_FILE_STEM_CHARS: usize = 120;
const UNTITLED: &str = "Untitled";

/// Note properties persisted alongside the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMetadata {
    /// Exact title; the file name only carries a sanitized copy
    pub title: Option<String>,
    pub is_list: bool,
    pub is_pinned: bool,
    pub is_hidden: bool,
    pub is_archived: bool,
    pub is_markdown_enabled: bool,
    pub color: NoteColor,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub reminders: Vec<Reminder>,
    pub creation_date: Option<i64>,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            title: None,
            is_list: false,
            is_pinned: false,
            is_hidden: false,
            is_archived: false,
            is_markdown_enabled: true,
            color: NoteColor::Default,
            tags: Vec::new(),
            attachments: Vec::new(),
            reminders: Vec::new(),
            creation_date: None,
        }
    }
}

impl From<&Note> for FileMetadata {
    fn from(note: &Note) -> Self {
        Self {
            title: Some(note.title.clone()),
            is_list: note.is_list,
            is_pinned: note.is_pinned,
            is_hidden: note.is_hidden,
            is_archived: note.is_archived,
            is_markdown_enabled: note.is_markdown_enabled,
            color: note.color,
            tags: note.tags.clone(),
            attachments: note.attachments.clone(),
            reminders: note.reminders.clone(),
            creation_date: Some(note.creation_date),
        }
    }
}

/// A note file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNote {
    /// Path relative to the root, `/`-separated
    pub id: String,
    /// Title taken from the file name
    pub title: String,
    pub body: String,
    /// Name of the subdirectory holding the file
    pub notebook: Option<String>,
    /// `None` for files written by other tools
    pub metadata: Option<FileMetadata>,
    /// File modification time (Unix seconds)
    pub modified: i64,
}

impl FileNote {
    pub(crate) fn from_local(note: &Note, notebook: Option<&str>, old: Option<&Self>) -> Self {
        Self {
            id: old.map(|old| old.id.clone()).unwrap_or_default(),
            title: note.title.clone(),
            body: note.body_text(),
            notebook: notebook.map(str::to_string),
            metadata: Some(FileMetadata::from(note)),
            modified: note.modified_date,
        }
    }

    pub(crate) fn to_local_note(&self, old: Option<&Note>) -> Note {
        let mut note = old.cloned().unwrap_or_else(|| Note {
            creation_date: self.modified,
            ..Note::new(String::new(), String::new())
        });

        match &self.metadata {
            Some(metadata) => {
                note.title = metadata.title.clone().unwrap_or_else(|| self.title.clone());
                note.is_list = metadata.is_list;
                note.is_pinned = metadata.is_pinned;
                note.is_hidden = metadata.is_hidden;
                note.is_archived = metadata.is_archived;
                note.is_markdown_enabled = metadata.is_markdown_enabled;
                note.color = metadata.color;
                note.tags.clone_from(&metadata.tags);
                note.attachments.clone_from(&metadata.attachments);
                note.reminders.clone_from(&metadata.reminders);
                if let Some(creation_date) = metadata.creation_date {
                    note.creation_date = creation_date;
                }
            }
            None => {
                note.title.clone_from(&self.title);
                note.is_markdown_enabled = !self.id.ends_with(&format!(".{TEXT_EXTENSION}"));
            }
        }

        note.set_body_text(&self.body);
        note.modified_date = self.modified;
        note
    }

    fn render(&self) -> SyncResult<String> {
        let metadata = serde_json::to_string_pretty(&self.metadata.clone().unwrap_or_default())?;
        Ok(format!(
            "{}\n\n{METADATA_START}\n{metadata}\n{METADATA_END}\n",
            self.body.trim_end()
        ))
    }
}

/// Provider storing notes as files in a local directory
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStorageProvider;

impl FileStorageProvider {
    pub const fn new() -> Self {
        Self
    }

    pub const fn supports_bin(self) -> bool {
        false
    }

    fn root(config: &DirectoryConfig) -> SyncResult<&Path> {
        if config.root.is_dir() {
            Ok(&config.root)
        } else {
            Err(SyncError::InvalidConfig(format!(
                "{} is not a directory",
                config.root.display()
            )))
        }
    }

    pub fn get_all(self, config: &DirectoryConfig) -> SyncResult<Vec<FileNote>> {
        let root = Self::root(config)?;
        let mut notes = Vec::new();

        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if is_hidden(&path) {
                continue;
            }
            if path.is_dir() {
                for inner in fs::read_dir(&path)? {
                    let inner = inner?.path();
                    if is_note_file(&inner) {
                        notes.extend(read_note_lenient(root, &inner));
                    }
                }
            } else if is_note_file(&path) {
                notes.extend(read_note_lenient(root, &path));
            }
        }

        notes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(notes)
    }

    pub fn create_note(self, remote: &FileNote, config: &DirectoryConfig) -> SyncResult<FileNote> {
        let root = Self::root(config)?;
        let target = target_path(root, remote, None)?;
        write_note(&target, &remote.render()?, remote.modified)?;
        tracing::debug!("Created note file {}", target.display());
        read_note(root, &target)
    }

    /// Rewrite the mapped file, renaming it when the title or notebook changed
    pub fn update_note(
        self,
        remote: &FileNote,
        config: &DirectoryConfig,
        mapping: &IdMapping,
    ) -> SyncResult<FileNote> {
        let root = Self::root(config)?;
        let current = mapped_path(root, mapping)?;
        let current_exists = current.is_file();
        let target = target_path(root, remote, current_exists.then_some(current.as_path()))?;

        write_note(&target, &remote.render()?, remote.modified)?;
        if current_exists && current != target {
            fs::remove_file(&current)?;
            remove_empty_notebook_dir(root, &current);
            tracing::debug!(
                "Moved note file {} to {}",
                current.display(),
                target.display()
            );
        }
        read_note(root, &target)
    }

    pub fn delete_note(
        self,
        _note: &Note,
        config: &DirectoryConfig,
        mapping: &IdMapping,
    ) -> SyncResult<()> {
        let root = Self::root(config)?;
        let path = mapped_path(root, mapping)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                remove_empty_notebook_dir(root, &path);
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    pub fn move_to_bin(
        self,
        _note: &Note,
        _config: &DirectoryConfig,
        _mapping: &IdMapping,
    ) -> SyncResult<()> {
        Err(SyncError::OperationNotSupported)
    }

    pub fn restore_note(
        self,
        _note: &Note,
        _config: &DirectoryConfig,
        _mapping: &IdMapping,
    ) -> SyncResult<FileNote> {
        Err(SyncError::OperationNotSupported)
    }

    pub fn authenticate(self, config: &DirectoryConfig) -> SyncResult<()> {
        Self::root(config).map(|_| ())
    }

    pub fn is_server_compatible(self, config: &DirectoryConfig) -> SyncResult<()> {
        Self::root(config).map(|_| ())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_none_or(|name| name.starts_with('.'))
}

fn is_note_file(path: &Path) -> bool {
    !is_hidden(path)
        && path.is_file()
        && path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                extension.eq_ignore_ascii_case(MARKDOWN_EXTENSION)
                    || extension.eq_ignore_ascii_case(TEXT_EXTENSION)
            })
}

fn relative_id(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve a mapping's remote id, refusing anything that escapes the root
fn mapped_path(root: &Path, mapping: &IdMapping) -> SyncResult<PathBuf> {
    let remote_id = mapping
        .remote_note_id
        .as_deref()
        .ok_or_else(|| SyncError::Generic("mapping has no remote note id".to_string()))?;
    let relative = Path::new(remote_id);
    if remote_id.is_empty()
        || relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(SyncError::Generic(format!(
            "invalid note path '{remote_id}'"
        )));
    }
    Ok(root.join(relative))
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FILE_STEM_CHARS)
        .collect::<String>();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else {
        cleaned.to_string()
    }
}

/// First free path for the note, appending ` (n)` on collisions.
///
/// `current` is the note's own file, which never counts as a collision.
fn target_path(root: &Path, remote: &FileNote, current: Option<&Path>) -> SyncResult<PathBuf> {
    let dir = match remote
        .notebook
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        Some(name) => root.join(sanitize_file_name(name)),
        None => root.to_path_buf(),
    };
    fs::create_dir_all(&dir)?;

    let stem = sanitize_file_name(&remote.title);
    let markdown = remote
        .metadata
        .as_ref()
        .is_none_or(|metadata| metadata.is_markdown_enabled);
    let extension = if markdown {
        MARKDOWN_EXTENSION
    } else {
        TEXT_EXTENSION
    };

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.{extension}")
        } else {
            format!("{stem} ({attempt}).{extension}")
        };
        let candidate = dir.join(name);
        if current == Some(candidate.as_path()) || !candidate.exists() {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

fn write_note(path: &Path, contents: &str, modified: i64) -> SyncResult<()> {
    fs::write(path, contents)?;
    fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(to_system_time(modified))?;
    Ok(())
}

fn read_note(root: &Path, path: &Path) -> SyncResult<FileNote> {
    let raw = fs::read_to_string(path)?;
    let modified = from_system_time(fs::metadata(path)?.modified()?);
    let (body, metadata) = split_metadata(&raw);

    let notebook = path
        .parent()
        .filter(|parent| *parent != root)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned());
    let title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FileNote {
        id: relative_id(root, path),
        title,
        body,
        notebook,
        metadata,
        modified,
    })
}

/// Unreadable files (non UTF-8, permissions) are skipped rather than failing the listing
fn read_note_lenient(root: &Path, path: &Path) -> Option<FileNote> {
    read_note(root, path)
        .inspect_err(|error| {
            tracing::warn!("Skipping note file {}: {}", path.display(), error);
        })
        .ok()
}

fn split_metadata(raw: &str) -> (String, Option<FileMetadata>) {
    let Some(start) = raw.rfind(METADATA_START) else {
        return (raw.to_string(), None);
    };
    let block = &raw[start + METADATA_START.len()..];
    let Some(end) = block.find(METADATA_END) else {
        return (raw.to_string(), None);
    };

    match serde_json::from_str::<FileMetadata>(block[..end].trim()) {
        Ok(metadata) => (raw[..start].trim_end().to_string(), Some(metadata)),
        Err(error) => {
            tracing::warn!("Ignoring malformed note metadata: {}", error);
            (raw.to_string(), None)
        }
    }
}

fn remove_empty_notebook_dir(root: &Path, path: &Path) {
    if let Some(parent) = path.parent().filter(|parent| *parent != root) {
        if fs::remove_dir(parent).is_ok() {
            tracing::debug!("Removed empty notebook directory {}", parent.display());
        }
    }
}

fn to_system_time(seconds: i64) -> SystemTime {
    u64::try_from(seconds).map_or(UNIX_EPOCH, |seconds| {
        UNIX_EPOCH + Duration::from_secs(seconds)
    })
}

fn from_system_time(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |duration| {
        i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
    })
}
