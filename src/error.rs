//! Error types for callscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device acquisition failed: {message}")]
    DeviceAcquisition { message: String },

    #[error("Audio device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    Capture { message: String },

    #[error("Audio encoding failed: {message}")]
    Encoding { message: String },

    // Transcription errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // Persistence errors
    #[error("Transcript is empty; nothing to persist")]
    EmptyTranscript,

    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("Conversation analysis failed: {message}")]
    Analysis { message: String },

    // Session state errors
    #[error("Operation '{operation}' is not valid in state {state}")]
    InvalidState { operation: String, state: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, CallscribeError>;
