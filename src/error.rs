//! Error types for the storage and registry boundaries.
//!
//! The extractor and calculator degrade gracefully on partial input and never
//! surface errors for malformed log content; hard failures are confined to
//! the cache and the plan registry.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown plan key: {0}")]
    UnknownPlan(String),
}

pub type Result<T> = std::result::Result<T, UsageError>;
