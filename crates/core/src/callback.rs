// Outbound session events and the sinks that receive them

use crate::state::{FinishMode, PlayerKey};
use parking_lot::Mutex;
use std::sync::Arc;

/// Session event types
/// Every event is tagged with the key of the session that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Periodic or out-of-band playback position report
    PositionUpdate { key: PlayerKey, position_ms: u64 },

    /// End-of-media reached and the finish policy applied
    FinishedPlaying { key: PlayerKey, reason: FinishMode },

    /// Engine error that arrived after the prepare request was resolved
    Error { key: PlayerKey, message: String },
}

impl SessionEvent {
    pub fn key(&self) -> &PlayerKey {
        match self {
            SessionEvent::PositionUpdate { key, .. }
            | SessionEvent::FinishedPlaying { key, .. }
            | SessionEvent::Error { key, .. } => key,
        }
    }
}

/// Event sink trait
/// Runs on the session's control thread; implementations should return quickly.
/// Calls into any session made from `on_event` fail with `InvalidState`; hand
/// the event to another thread to act on it
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

impl<F> EventSink for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

/// Fans events out to every registered sink
pub struct EventDispatcher {
    sinks: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        let dispatcher = Self::new();
        dispatcher.add_sink(sink);
        dispatcher
    }

    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.lock().push(sink);
    }

    pub fn clear_sinks(&self) {
        self.sinks.lock().clear();
    }

    pub fn dispatch(&self, event: SessionEvent) {
        // Snapshot so a sink may register another sink without deadlocking
        let sinks = self.sinks.lock().clone();
        for sink in sinks.iter() {
            sink.on_event(event.clone());
        }
    }
}

impl EventSink for EventDispatcher {
    fn on_event(&self, event: SessionEvent) {
        self.dispatch(event);
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
