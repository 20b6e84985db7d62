// Error handling for playback sessions

use thiserror::Error;

/// Playback session error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// Missing or malformed input from the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the native media engine, carrying its message
    #[error("Native engine error: {0}")]
    NativeEngine(String),

    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The session's control thread is gone
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Thread/synchronization error
    #[error("Thread error: {0}")]
    ThreadError(String),
}

impl AudioError {
    pub fn no_player() -> Self {
        AudioError::InvalidState("no active player".to_string())
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::ThreadError(err.to_string())
    }
}
