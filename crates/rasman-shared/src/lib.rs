//! # rasman-shared
//!
//! Entity models, display helpers and constants shared by the API client,
//! the settings store and the console.

pub mod constants;
pub mod error;
pub mod format;
pub mod models;

pub use error::ModelError;
pub use models::{Category, ChatRoom, Keyword, Session, SuspendedStatus, User, VersionInfo};
