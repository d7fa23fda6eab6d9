//! Error type shared by the store and the collection manager.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Failures surfaced by library and store operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// No record with this id is held in memory.
    #[error("game {0} not found")]
    NotFound(u64),

    /// The record exists in memory but has no row in the backing store.
    #[error("game {0} not found in store")]
    NotInStore(u64),

    /// A record with the same title and platform already exists.
    #[error("'{title}' on {platform} is already in the library")]
    Duplicate {
        /// Title of the rejected game.
        title: String,
        /// Platform of the rejected game.
        platform: String,
    },

    /// The backing store file does not exist.
    #[error("store {} does not exist", .0.display())]
    StoreMissing(PathBuf),

    /// Another handle holds the advisory lock on the store.
    #[error("store {} is locked by another process", .0.display())]
    Locked(PathBuf),

    /// A caller-supplied field failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A stored row could not be turned back into a game.
    #[error("corrupt row at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number in the store file.
        line: u64,
        /// Parser message.
        reason: String,
    },

    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The temporary store could not be moved over the original.
    #[error("failed to replace store: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl LibraryError {
    /// Whether this error belongs to the I/O failure class (read/write problems
    /// other than a missing store).
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            LibraryError::Io(_) | LibraryError::Csv(_) | LibraryError::Persist(_)
        )
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        LibraryError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
