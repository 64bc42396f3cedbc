//! Common error types for Huddle.

use thiserror::Error;

use crate::protocol::RelayErrorKind;

/// Result type alias using Huddle's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Huddle operations.
///
/// Media and relay failures are terminal for the attempted operation only;
/// `InvalidInput` and `NotReady` are local validation failures raised before
/// any asynchronous work starts.
#[derive(Debug, Error)]
pub enum Error {
    /// Camera or microphone access was refused.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No capture device matched the request.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A capture device exists but another application holds it.
    #[error("device busy: {0}")]
    DeviceBusy(String),

    /// Any other media acquisition failure.
    #[error("media error: {0}")]
    Media(String),

    /// The relay/signaling collaborator reported an error.
    #[error("relay error ({kind}): {message}")]
    Relay {
        kind: RelayErrorKind,
        message: String,
    },

    /// Rejected user input (e.g. an empty room token).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation attempted before initialization finished.
    #[error("not ready: {0}")]
    NotReady(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (config files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a relay error with the relay's own classification.
    pub fn relay(kind: RelayErrorKind, msg: impl std::fmt::Display) -> Self {
        Self::Relay {
            kind,
            message: msg.to_string(),
        }
    }

    /// Create an invalid input error from any displayable type.
    pub fn invalid_input(msg: impl std::fmt::Display) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create a not-ready error from any displayable type.
    pub fn not_ready(msg: impl std::fmt::Display) -> Self {
        Self::NotReady(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// True for failures rejected locally without any async attempt.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotReady(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
