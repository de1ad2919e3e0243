//! Common error types for VideoKit

use thiserror::Error;

/// Common result type for VideoKit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the bridge and the host binary
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is present but not valid TOML for our schema
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
