//! Common error types for Materia

use thiserror::Error;

/// Common result type for Materia operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the catalog service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Structured property payload that does not match its expected shape
    #[error("Invalid {field}: {reason}")]
    Format { field: String, reason: String },

    /// Caller lacks the role or ownership required for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not every submitted collaborator identifier matched a user
    #[error("Could not resolve collaborators: {}", missing.join(", "))]
    PartialResolution {
        requested: Vec<String>,
        missing: Vec<String>,
    },

    /// External dependency (media storage) failed
    #[error("Dependency failure: {0}")]
    Dependency(String),

    /// Operation conflicts with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a [`Error::Format`] on a named field
    pub fn format(field: &str, reason: impl Into<String>) -> Self {
        Error::Format {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
