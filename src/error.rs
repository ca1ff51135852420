//! Common error types for postlocal

use thiserror::Error;

/// Common result type for postlocal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories surfaced by the search pipeline and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
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

    /// Invalid user input (malformed postcode, coordinates, or raw
    /// authority entry); surfaced as a client error, never retried
    #[error("Invalid input: {0}")]
    Validation(String),

    /// External service failure; fatal on the postcode resolution path,
    /// degrades to empty enrichment fields for stops and crimes
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}
