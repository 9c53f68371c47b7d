//! Services shared across clients

mod database;

pub use database::DatabaseService;
