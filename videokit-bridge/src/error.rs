//! Error types for videokit-bridge
//!
//! Only session-level failures surface as errors. Frame and audio problems
//! are recovered where they happen and show up in logs and statistics.

use thiserror::Error;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] videokit_common::Error),

    /// Decode engine could not open the media source
    #[error("Failed to open media: {0}")]
    Open(String),

    /// Decode engine rejected the negotiated audio or video format
    #[error("Format negotiation failed: {0}")]
    Format(String),

    /// Decode engine failed a playback command
    #[error("Engine error: {0}")]
    Engine(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using the bridge Error
pub type Result<T> = std::result::Result<T, Error>;
