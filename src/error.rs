//! prefvault error types

use thiserror::Error;

/// prefvault error type
#[derive(Error, Debug)]
pub enum Error {
    /// Profile or entry absent where presence was required
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Relational store failure (connection, constraint, rollback)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Strict-mode update precondition failed
    #[error("Digest precondition failed: expected {expected}, found {actual}")]
    DigestPrecondition { expected: String, actual: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Result type alias for prefvault operations
pub type Result<T> = std::result::Result<T, Error>;
