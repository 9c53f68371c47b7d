//! Note model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::notebook::NotebookId;

/// A locally-unique note identifier assigned by the database.
///
/// `NoteId::UNSAVED` (0) marks a note that has not been persisted yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NoteId(i64);

impl NoteId {
    /// Id of a note that has not been inserted yet
    pub const UNSAVED: Self = Self(0);

    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Whether this id was assigned by the database
    #[must_use]
    pub const fn is_saved(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Note color label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteColor {
    #[default]
    Default,
    Green,
    Pink,
    Blue,
    Red,
    Orange,
    Yellow,
}

impl NoteColor {
    /// Stable storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Green => "green",
            Self::Pink => "pink",
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
        }
    }

    /// Parse a storage name, falling back to `Default` for unknown values
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "green" => Self::Green,
            "pink" => Self::Pink,
            "blue" => Self::Blue,
            "red" => Self::Red,
            "orange" => Self::Orange,
            "yellow" => Self::Yellow,
            _ => Self::Default,
        }
    }
}

/// A checkable entry of a task-list note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTask {
    pub id: u64,
    pub content: String,
    pub is_done: bool,
}

/// Reference to a file stored by the attachment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
}

/// A dated reminder attached to a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub name: String,
    /// Fire time (Unix seconds)
    pub date: i64,
}

/// A note in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Database identifier (`NoteId::UNSAVED` until inserted)
    pub id: NoteId,
    pub title: String,
    /// Free-text body; empty for task-list notes
    pub content: String,
    /// Whether the body is `task_list` rather than `content`
    pub is_list: bool,
    pub task_list: Vec<NoteTask>,
    pub is_archived: bool,
    /// In the bin (soft deleted)
    pub is_deleted: bool,
    pub is_pinned: bool,
    pub is_hidden: bool,
    pub is_markdown_enabled: bool,
    /// Excluded from synchronization
    pub is_local_only: bool,
    /// Creation timestamp (Unix seconds)
    pub creation_date: i64,
    /// Last modification timestamp (Unix seconds)
    pub modified_date: i64,
    /// Time the note was moved to the bin (Unix seconds)
    pub deletion_date: Option<i64>,
    pub color: NoteColor,
    pub notebook_id: Option<NotebookId>,
    /// Tag names
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub reminders: Vec<Reminder>,
}

impl Note {
    /// Create an unsaved text note stamped with the current time
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = crate::util::unix_timestamp_now();
        Self {
            id: NoteId::UNSAVED,
            title: title.into(),
            content: content.into(),
            is_list: false,
            task_list: Vec::new(),
            is_archived: false,
            is_deleted: false,
            is_pinned: false,
            is_hidden: false,
            is_markdown_enabled: true,
            is_local_only: false,
            creation_date: now,
            modified_date: now,
            deletion_date: None,
            color: NoteColor::Default,
            notebook_id: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            reminders: Vec::new(),
        }
    }

    /// Whether this note takes part in synchronization
    #[must_use]
    pub const fn is_syncable(&self) -> bool {
        !self.is_local_only && !self.is_deleted
    }

    /// Bump the modification timestamp to now
    pub fn touch(&mut self) {
        self.modified_date = crate::util::unix_timestamp_now();
    }

    /// Body rendered as plain text (task lists become checkbox lines)
    #[must_use]
    pub fn body_text(&self) -> String {
        if self.is_list {
            render_task_list(&self.task_list)
        } else {
            self.content.clone()
        }
    }

    /// Replace the body from plain text, keeping the list/text shape of the note
    pub fn set_body_text(&mut self, text: &str) {
        if self.is_list {
            self.task_list = parse_task_list(text);
            self.content.clear();
        } else {
            self.content = text.to_string();
        }
    }

    /// Get first non-empty line of the title or body, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            self.body_text()
        } else {
            self.title.clone()
        };
        source
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

fn task_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*] \[([ xX])\] ?(.*)$").expect("Invalid regex"))
}

/// Render tasks as markdown checkbox lines
#[must_use]
pub fn render_task_list(tasks: &[NoteTask]) -> String {
    tasks
        .iter()
        .map(|task| {
            let mark = if task.is_done { 'x' } else { ' ' };
            format!("- [{mark}] {}", task.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse markdown checkbox lines into tasks
///
/// Lines that are not checkboxes become unchecked tasks; blank lines are skipped.
#[must_use]
pub fn parse_task_list(text: &str) -> Vec<NoteTask> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .zip(0u64..)
        .map(|(line, id)| match task_line_regex().captures(line) {
            Some(cap) => NoteTask {
                id,
                content: cap[2].to_string(),
                is_done: !cap[1].trim().is_empty(),
            },
            None => NoteTask {
                id,
                content: line.trim().to_string(),
                is_done: false,
            },
        })
        .collect()
}
