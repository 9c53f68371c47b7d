//! Note repository implementation

use crate::error::{Error, Result};
use crate::models::{Note, NoteColor, NoteId, Notebook, NotebookId};
use crate::util::unix_timestamp_now;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

const NOTE_COLUMNS: &str = "id, title, content, is_list, task_list, is_archived, is_deleted, \
     is_pinned, is_hidden, is_markdown_enabled, is_local_only, creation_date, modified_date, \
     deletion_date, color, notebook_id, tags, attachments, reminders";

/// Trait for note storage operations
///
/// Every method taking a slice applies the whole batch atomically.
pub trait NoteRepository {
    /// Insert a note and return the id assigned to it (the note's own id is ignored)
    fn insert_note(&self, note: &Note) -> Result<NoteId>;

    /// Overwrite stored notes with the given values, matched by id
    fn update_notes(&self, notes: &[Note]) -> Result<()>;

    /// Soft delete notes, stamping their deletion date
    fn move_notes_to_bin(&self, ids: &[NoteId]) -> Result<()>;

    /// Take notes back out of the bin
    fn restore_notes(&self, ids: &[NoteId]) -> Result<()>;

    /// Permanently delete notes (their mappings cascade)
    fn delete_notes(&self, ids: &[NoteId]) -> Result<()>;

    /// All notes including binned and local-only ones, newest first
    fn get_all(&self) -> Result<Vec<Note>>;

    /// Get a note by id, whatever its state
    fn get_by_id(&self, id: NoteId) -> Result<Option<Note>>;

    /// Get a notebook by id
    fn get_notebook(&self, id: NotebookId) -> Result<Option<Notebook>>;

    /// Find a notebook by exact name or create it
    fn get_or_create_notebook(&self, name: &str) -> Result<NotebookId>;

    /// All notebooks ordered by name
    fn list_notebooks(&self) -> Result<Vec<Notebook>>;
}

/// `SQLite` implementation of `NoteRepository`
pub struct SqliteNoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteNoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a note from a database row selected with `NOTE_COLUMNS`
    fn parse_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
        Ok(Note {
            id: NoteId::new(row.get(0)?),
            title: row.get(1)?,
            content: row.get(2)?,
            is_list: row.get(3)?,
            task_list: json_column(row, 4)?,
            is_archived: row.get(5)?,
            is_deleted: row.get(6)?,
            is_pinned: row.get(7)?,
            is_hidden: row.get(8)?,
            is_markdown_enabled: row.get(9)?,
            is_local_only: row.get(10)?,
            creation_date: row.get(11)?,
            modified_date: row.get(12)?,
            deletion_date: row.get(13)?,
            color: NoteColor::from_name(&row.get::<_, String>(14)?),
            notebook_id: row.get::<_, Option<i64>>(15)?.map(NotebookId::new),
            tags: json_column(row, 16)?,
            attachments: json_column(row, 17)?,
            reminders: json_column(row, 18)?,
        })
    }

    fn set_deleted(&self, ids: &[NoteId], deleted: bool) -> Result<()> {
        let deletion_date = deleted.then(unix_timestamp_now);
        let tx = self.conn.unchecked_transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE notes SET is_deleted = ?, deletion_date = ? WHERE id = ?",
                params![deleted, deletion_date, id.get()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

/// Serialized JSON columns of a note, in `NOTE_COLUMNS` order
fn json_columns(note: &Note) -> Result<[String; 4]> {
    Ok([
        serde_json::to_string(&note.task_list)?,
        serde_json::to_string(&note.tags)?,
        serde_json::to_string(&note.attachments)?,
        serde_json::to_string(&note.reminders)?,
    ])
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> Result<NoteId> {
        let [task_list, tags, attachments, reminders] = json_columns(note)?;

        self.conn.execute(
            "INSERT INTO notes (title, content, is_list, task_list, is_archived, is_deleted,
                is_pinned, is_hidden, is_markdown_enabled, is_local_only, creation_date,
                modified_date, deletion_date, color, notebook_id, tags, attachments, reminders)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                note.title,
                note.content,
                note.is_list,
                task_list,
                note.is_archived,
                note.is_deleted,
                note.is_pinned,
                note.is_hidden,
                note.is_markdown_enabled,
                note.is_local_only,
                note.creation_date,
                note.modified_date,
                note.deletion_date,
                note.color.as_str(),
                note.notebook_id.map(NotebookId::get),
                tags,
                attachments,
                reminders,
            ],
        )?;

        Ok(NoteId::new(self.conn.last_insert_rowid()))
    }

    fn update_notes(&self, notes: &[Note]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for note in notes {
            let [task_list, tags, attachments, reminders] = json_columns(note)?;
            let rows = tx.execute(
                "UPDATE notes SET title = ?, content = ?, is_list = ?, task_list = ?,
                    is_archived = ?, is_deleted = ?, is_pinned = ?, is_hidden = ?,
                    is_markdown_enabled = ?, is_local_only = ?, creation_date = ?,
                    modified_date = ?, deletion_date = ?, color = ?, notebook_id = ?, tags = ?,
                    attachments = ?, reminders = ?
                 WHERE id = ?",
                params![
                    note.title,
                    note.content,
                    note.is_list,
                    task_list,
                    note.is_archived,
                    note.is_deleted,
                    note.is_pinned,
                    note.is_hidden,
                    note.is_markdown_enabled,
                    note.is_local_only,
                    note.creation_date,
                    note.modified_date,
                    note.deletion_date,
                    note.color.as_str(),
                    note.notebook_id.map(NotebookId::get),
                    tags,
                    attachments,
                    reminders,
                    note.id.get(),
                ],
            )?;

            if rows == 0 {
                return Err(Error::NotFound(note.id.to_string()));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn move_notes_to_bin(&self, ids: &[NoteId]) -> Result<()> {
        self.set_deleted(ids, true)
    }

    fn restore_notes(&self, ids: &[NoteId]) -> Result<()> {
        self.set_deleted(ids, false)
    }

    fn delete_notes(&self, ids: &[NoteId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        self.conn.execute(
            &format!("DELETE FROM notes WHERE id IN ({placeholders})"),
            params_from_iter(ids.iter().map(|id| id.get())),
        )?;
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY modified_date DESC, id DESC"
        ))?;

        let notes = stmt
            .query_map([], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn get_by_id(&self, id: NoteId) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
                params![id.get()],
                Self::parse_note,
            )
            .optional()?;
        Ok(note)
    }

    fn get_notebook(&self, id: NotebookId) -> Result<Option<Notebook>> {
        let notebook = self
            .conn
            .query_row(
                "SELECT id, name FROM notebooks WHERE id = ?",
                params![id.get()],
                |row| {
                    Ok(Notebook {
                        id: NotebookId::new(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(notebook)
    }

    fn get_or_create_notebook(&self, name: &str) -> Result<NotebookId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Notebook name cannot be empty".to_string(),
            ));
        }

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM notebooks WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(NotebookId::new(id));
        }

        self.conn
            .execute("INSERT INTO notebooks (name) VALUES (?)", params![name])?;
        Ok(NotebookId::new(self.conn.last_insert_rowid()))
    }

    fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM notebooks ORDER BY name ASC")?;

        let notebooks = stmt
            .query_map([], |row| {
                Ok(Notebook {
                    id: NotebookId::new(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notebooks)
    }
}
