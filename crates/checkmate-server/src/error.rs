//! Server error types.

use checkmate_core::WriteError;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Misuse of a registry or ledger.
    #[error("continuity error: {0}")]
    Core(#[from] checkmate_core::Error),

    /// Writing to the caller's stream failed.
    #[error("stream write failed: {0}")]
    Write(#[from] WriteError),

    /// The session token does not resolve to a user.
    #[error("unauthorized")]
    Unauthorized,

    /// The user is known but lacks the required role.
    #[error("forbidden")]
    Forbidden,

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The account store rejected or failed the operation.
    #[error("account store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;
