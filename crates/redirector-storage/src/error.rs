//! Storage error types.

use redirector_core::ValidationError;
use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from rusqlite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (e.g., creating directories).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Rule rejected by write-time validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Hostname already belongs to a domain.
    #[error("Domain name already in use: {0}")]
    DuplicateDomainName(String),

    /// Display name already belongs to a domain.
    #[error("Display name already in use: {0}")]
    DuplicateDisplayName(String),

    /// A domain needs at least one hostname.
    #[error("A domain needs at least one domain name")]
    EmptyDomainNames,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// True for errors caused by existing data rather than bad input.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::Validation(ValidationError::Conflict(_))
                | StorageError::DuplicateDomainName(_)
                | StorageError::DuplicateDisplayName(_)
        )
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
