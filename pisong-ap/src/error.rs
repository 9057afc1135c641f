//! Error types for pisong-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for pisong-ap module
#[derive(Error, Debug)]
pub enum Error {
    /// Domain errors from pisong-common (invalid root, invalid input, config)
    #[error(transparent)]
    Synthesis(#[from] pisong_common::Error),

    /// Configuration resolution errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Audio encoding errors (WAV export)
    #[error("Audio encode error: {0}")]
    Encode(String),

    /// Blocking synthesis worker panicked or was aborted
    #[error("Synthesis worker error: {0}")]
    Worker(String),

    /// Synthesis was abandoned by its caller
    #[error("Synthesis cancelled")]
    Cancelled,

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// True when the caller sent something unusable (maps to HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::BadRequest(_)
                | Error::Synthesis(pisong_common::Error::InvalidRoot(_))
                | Error::Synthesis(pisong_common::Error::InvalidInput(_))
        )
    }
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::Encode(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Worker(e.to_string())
    }
}

/// Convenience Result type using pisong-ap Error
pub type Result<T> = std::result::Result<T, Error>;
