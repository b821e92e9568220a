//! Error kinds shared by the store, the breed lookup and the HTTP layer.

use thiserror::Error;

/// Errors returned by spy-cat operations.
///
/// Every variant is scoped to a single request; none is fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or rule-violating input. The caller must correct and retry.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness or state conflict reported by the store.
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

/// Returns true when `err` is an SQLite UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
