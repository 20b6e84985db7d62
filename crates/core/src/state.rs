// Session state types: keys, finish policy, engine states

use crate::error::{AudioError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Caller-assigned session identifier
/// Every outbound event carries it so a multi-session dispatcher can route it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerKey(Arc<str>);

impl PlayerKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PlayerKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

/// Policy applied when playback reaches end-of-media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishMode {
    /// Seek to the start and keep playing
    Loop,
    /// Seek to the start and hold
    Pause,
    /// Stop and release the engine
    #[default]
    Stop,
}

impl FinishMode {
    /// Wire code, also used as the `finishedPlaying` reason
    pub fn code(self) -> i32 {
        match self {
            FinishMode::Loop => 0,
            FinishMode::Pause => 1,
            FinishMode::Stop => 2,
        }
    }
}

impl TryFrom<i32> for FinishMode {
    type Error = AudioError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(FinishMode::Loop),
            1 => Ok(FinishMode::Pause),
            2 => Ok(FinishMode::Stop),
            other => Err(AudioError::InvalidArgument(format!(
                "Invalid finish mode: {}",
                other
            ))),
        }
    }
}

/// Which duration `get_duration` reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationKind {
    /// Current playback position
    Current,
    /// Total media length
    Total,
}

impl TryFrom<i32> for DurationKind {
    type Error = AudioError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(DurationKind::Current),
            1 => Ok(DurationKind::Total),
            other => Err(AudioError::InvalidArgument(format!(
                "Invalid duration kind: {}",
                other
            ))),
        }
    }
}

/// Playback states reported by the native engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No media or stopped
    Idle,
    /// Loading data, not yet able to play
    Buffering,
    /// Able to play from the current position
    Ready,
    /// Reached end-of-media
    Ended,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub key: PlayerKey,
    /// Engine reported ready since the last prepare
    pub prepared: bool,
    /// Position ticker is running
    pub ticking: bool,
    /// A native handle is alive
    pub has_player: bool,
    pub finish_mode: FinishMode,
    pub poll_interval: Duration,
}
