//! Error types for the bulletin board services.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving board operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The shared board password did not match.
    #[error("incorrect password")]
    Auth,

    /// A lock could not be acquired within its wait bound.
    #[error("{0} is busy, try again shortly")]
    Busy(&'static str),

    /// No row carries the requested post ID.
    #[error("post {0} not found")]
    NotFound(i64),

    /// Request parameters were rejected (e.g., page size outside the allowed set).
    #[error("validation error: {0}")]
    Validation(String),

    /// Upload data was not a `data:<mime>;base64,<payload>` URL.
    #[error("invalid upload data: {0}")]
    Format(String),

    /// The text-generation API failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The blob store rejected an upload.
    #[error("storage error: {0}")]
    Storage(String),

    /// Post or settings table error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored cell could not be interpreted.
    #[error("corrupt row {row}: {reason}")]
    CorruptRow {
        /// Row number in append order.
        row: i64,
        /// Description of what's wrong.
        reason: String,
    },
}

impl Error {
    /// Short machine-readable code for this error, used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Busy(_) => "busy",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Format(_) => "format",
            Self::Upstream(_) => "upstream",
            Self::Storage(_) => "storage",
            Self::Database(_) => "database",
            Self::CorruptRow { .. } => "corrupt_row",
        }
    }
}
