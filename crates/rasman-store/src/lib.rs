//! # rasman-store
//!
//! Local persistence for the console: a small SQLite file holding the
//! operator's settings.  The crate exposes a synchronous `Database` handle
//! wrapping a `rusqlite::Connection`, with migrations applied on open.

pub mod database;
pub mod migrations;
pub mod settings;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use settings::Settings;
