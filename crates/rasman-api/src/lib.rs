//! HTTP client for the Retro AIM Server management API.
//!
//! Every call collapses failure: reads return `None` when the server could
//! not be reached or answered with an error, writes return `false`.  An
//! empty collection (`Some(vec![])`) always means the server answered and
//! had nothing, never that the call failed.

pub mod chat;
pub mod client;
mod decode;
pub mod directory;
pub mod error;
pub mod sessions;
pub mod system;
pub mod users;

#[cfg(any(test, feature = "fake-server"))]
pub mod fake;

pub use client::ApiClient;
pub use error::ApiError;
