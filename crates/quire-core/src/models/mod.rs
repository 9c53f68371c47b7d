//! Data models for Quire

mod id_mapping;
mod note;
mod notebook;

pub use id_mapping::{IdMapping, ProviderKind};
pub use note::{
    parse_task_list, render_task_list, Attachment, Note, NoteColor, NoteId, NoteTask, Reminder,
};
pub use notebook::{Notebook, NotebookId};
