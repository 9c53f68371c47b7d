//! quire-core - Core library for Quire
//!
//! This crate contains the note model, the `SQLite` storage layer and the
//! synchronization engine that mirrors local notes to a remote provider.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{IdMapping, Note, NoteId, NotebookId, ProviderKind};
