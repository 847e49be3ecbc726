use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown account status: {0} (expected active, deleted, expired, suspended or suspended_age)")]
    UnknownStatus(String),
}
