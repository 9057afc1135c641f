//! Common error types for PiSong

use thiserror::Error;

/// Common result type for PiSong operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the PiSong crates
#[derive(Error, Debug)]
pub enum Error {
    /// Root note of a scale is not a recognized note name
    #[error("Invalid root note: {0}")]
    InvalidRoot(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
