//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>s, <number>m, or <number>m<number>s (e.g., 30s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Why a capture session ended up in the error state.
///
/// Every kind is fatal to the current attempt and recoverable by
/// `reset()` followed by a new `start()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureErrorKind {
    #[error("Microphone access was denied")]
    PermissionDenied,

    #[error("No audio input device available")]
    DeviceNotFound,

    #[error("Audio device failure: {0}")]
    DeviceFailure(String),

    #[error("Recording failed: {0}")]
    Unknown(String),
}

impl CaptureErrorKind {
    /// Short machine-friendly name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::DeviceNotFound => "device_not_found",
            Self::DeviceFailure(_) => "device_failure",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
