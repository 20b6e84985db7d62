// Session configuration

use crate::error::{AudioError, Result};
use crate::state::FinishMode;
use crate::ticker::DEFAULT_POLL_INTERVAL;
use std::time::Duration;

/// Initial engine volume applied on first ready
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Control thread name prefix, suffixed with the session key
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "podium-session";

/// Defaults for every session created with this config
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Position report cadence while playing
    pub poll_interval: Duration,
    /// Volume applied on first ready when `prepare` gives none
    pub initial_volume: f32,
    pub finish_mode: FinishMode,
    pub thread_name_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_volume: DEFAULT_VOLUME,
            finish_mode: FinishMode::default(),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval = Duration::from_millis(interval_ms);
        self
    }

    pub fn with_initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = volume;
        self
    }

    pub fn with_finish_mode(mut self, finish_mode: FinishMode) -> Self {
        self.finish_mode = finish_mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(AudioError::InvalidArgument(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-call overrides for `prepare`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrepareOptions {
    pub volume: Option<f32>,
    pub poll_interval_ms: Option<u64>,
}

impl PrepareOptions {
    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = Some(interval_ms);
        self
    }

    pub(crate) fn poll_interval(&self) -> Result<Option<Duration>> {
        match self.poll_interval_ms {
            Some(0) => Err(AudioError::InvalidArgument(
                "poll interval must be positive".to_string(),
            )),
            Some(ms) => Ok(Some(Duration::from_millis(ms))),
            None => Ok(None),
        }
    }
}
