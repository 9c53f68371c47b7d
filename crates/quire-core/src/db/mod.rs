//! Database layer for Quire

mod connection;
mod mapping_repository;
mod migrations;
mod repository;

pub use connection::Database;
pub use mapping_repository::{MappingRepository, SqliteMappingRepository};
pub use repository::{NoteRepository, SqliteNoteRepository};
