// Native media engine seam
//
// The engine (decode, buffering, speed control) is an external collaborator.
// A session owns exactly one `MediaEngine` at a time and learns about its
// progress through the `EngineListener` hooks handed over at creation.

use crate::error::Result;
use crate::state::EngineState;
use std::fmt;
use std::sync::Arc;

/// One native player instance bound to a single media source
///
/// Methods are only ever called from the owning session's control thread.
pub trait MediaEngine: Send {
    /// Begin buffering the bound source; readiness is reported asynchronously
    fn prepare(&mut self) -> Result<()>;

    /// Whether playback proceeds automatically once the engine is ready
    fn set_play_when_ready(&mut self, play_when_ready: bool) -> Result<()>;

    /// Start or resume playback
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Stop playback, keeping the instance reusable
    fn stop(&mut self) -> Result<()>;

    /// Free native resources; the instance is unusable afterwards
    fn release(&mut self) -> Result<()>;

    fn seek_to(&mut self, position_ms: u64) -> Result<()>;

    /// Volume as understood by the engine; validation is the engine's concern
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    /// Playback speed, 1.0 = normal
    fn set_playback_speed(&mut self, rate: f32) -> Result<()>;

    fn current_position_ms(&self) -> Result<u64>;

    fn duration_ms(&self) -> Result<u64>;
}

/// Creates engines for media sources
pub trait EngineFactory: Send + Sync {
    /// Build an engine bound to `source`; it reports through `listener`
    fn create(&self, source: &str, listener: EngineListener) -> Result<Box<dyn MediaEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&str, EngineListener) -> Result<Box<dyn MediaEngine>> + Send + Sync,
{
    fn create(&self, source: &str, listener: EngineListener) -> Result<Box<dyn MediaEngine>> {
        self(source, listener)
    }
}

type StateHook = Arc<dyn Fn(EngineState) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(String) + Send + Sync>;

/// Fixed table of engine event hooks
///
/// Hooks may be invoked from any thread, including synchronously from inside
/// an engine call; the session side only enqueues the event.
#[derive(Clone)]
pub struct EngineListener {
    on_state_changed: StateHook,
    on_error: ErrorHook,
}

impl EngineListener {
    pub fn new<S, E>(on_state_changed: S, on_error: E) -> Self
    where
        S: Fn(EngineState) + Send + Sync + 'static,
        E: Fn(String) + Send + Sync + 'static,
    {
        Self {
            on_state_changed: Arc::new(on_state_changed),
            on_error: Arc::new(on_error),
        }
    }

    /// Listener that ignores everything
    pub fn noop() -> Self {
        Self::new(|_| {}, |_| {})
    }

    pub fn state_changed(&self, state: EngineState) {
        (self.on_state_changed)(state)
    }

    pub fn error(&self, message: impl Into<String>) {
        (self.on_error)(message.into())
    }
}

impl fmt::Debug for EngineListener {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EngineListener").finish_non_exhaustive()
    }
}
