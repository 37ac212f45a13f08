//! Error types for scanlink-core

use crate::session::SessionState;

/// Result type alias for scanlink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Length prefix announces more bytes than allowed
    #[error("Message too large: {size} bytes (max: {max} bytes)")]
    MessageTooLarge {
        size: usize,
        max: usize,
    },

    /// Event string is not part of the vocabulary
    #[error("Unknown progress event: {0:?}")]
    UnknownEvent(String),

    /// Message payload was expected to be UTF-8 text
    #[error("Message is not valid UTF-8")]
    NotUtf8,

    /// Scan command could not be decoded
    #[error("Malformed scan command: {0}")]
    MalformedCommand(#[from] serde_json::Error),

    /// A recognized scan option carries a value of the wrong type or range
    #[error("Invalid value for option '{key}': {reason}")]
    InvalidOption {
        key: String,
        reason: String,
    },

    /// Session state machine rejected a transition
    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidSessionState {
        from: SessionState,
        to: SessionState,
    },

    /// Scanner reported a mechanical or driver fault
    #[error("Device fault: {0}")]
    DeviceFault(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if the error ends the current session's connection
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MessageTooLarge { .. }
                | Self::InvalidSessionState { .. }
                | Self::Io(_)
        )
    }
}
