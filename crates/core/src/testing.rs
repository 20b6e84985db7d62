// Scripted engine and recording sink for tests

use crate::callback::{EventSink, SessionEvent};
use crate::engine::{EngineFactory, EngineListener, MediaEngine};
use crate::error::{AudioError, Result};
use crate::state::{EngineState, FinishMode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Calls made against a fake engine, in order
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Prepare,
    SetPlayWhenReady(bool),
    Play,
    Pause,
    Stop,
    Release,
    SeekTo(u64),
    SetVolume(f32),
    SetPlaybackSpeed(f32),
}

#[derive(Debug, Default)]
pub struct FakeEngineState {
    pub source: String,
    pub calls: Vec<EngineCall>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub playing: bool,
    pub released: bool,
    /// Every call fails with this message while set
    pub fail_with: Option<String>,
    /// Only `current_position_ms` fails while set
    pub fail_position_query: bool,
}

/// Test-side view of one created engine
#[derive(Clone)]
pub struct FakeEngineHandle {
    pub state: Arc<Mutex<FakeEngineState>>,
    pub listener: EngineListener,
}

impl FakeEngineHandle {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn ready(&self) {
        self.listener.state_changed(EngineState::Ready);
    }

    pub fn end(&self) {
        let mut state = self.state.lock();
        state.position_ms = state.duration_ms;
        state.playing = false;
        drop(state);
        self.listener.state_changed(EngineState::Ended);
    }

    pub fn error(&self, message: &str) {
        self.listener.error(message);
    }

    pub fn set_position(&self, position_ms: u64) {
        self.state.lock().position_ms = position_ms;
    }

    pub fn fail_with(&self, message: Option<&str>) {
        self.state.lock().fail_with = message.map(str::to_string);
    }

    pub fn fail_position_query(&self, fail: bool) {
        self.state.lock().fail_position_query = fail;
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

pub struct FakeEngine {
    state: Arc<Mutex<FakeEngineState>>,
    listener: EngineListener,
    ready_on_prepare: bool,
}

impl FakeEngine {
    fn record(&self, call: EngineCall) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_with {
            return Err(AudioError::NativeEngine(message.clone()));
        }
        if state.released {
            return Err(AudioError::NativeEngine("engine released".to_string()));
        }
        match &call {
            EngineCall::Play => state.playing = true,
            EngineCall::Pause | EngineCall::Stop => state.playing = false,
            EngineCall::Release => state.released = true,
            EngineCall::SeekTo(position) => state.position_ms = *position,
            _ => {}
        }
        state.calls.push(call);
        Ok(())
    }
}

impl MediaEngine for FakeEngine {
    fn prepare(&mut self) -> Result<()> {
        self.record(EngineCall::Prepare)?;
        if self.ready_on_prepare {
            // Reported from inside the engine call, like a cached source would
            self.listener.state_changed(EngineState::Buffering);
            self.listener.state_changed(EngineState::Ready);
        }
        Ok(())
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) -> Result<()> {
        self.record(EngineCall::SetPlayWhenReady(play_when_ready))
    }

    fn play(&mut self) -> Result<()> {
        self.record(EngineCall::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.record(EngineCall::Pause)
    }

    fn stop(&mut self) -> Result<()> {
        self.record(EngineCall::Stop)
    }

    fn release(&mut self) -> Result<()> {
        self.record(EngineCall::Release)
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        self.record(EngineCall::SeekTo(position_ms))
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.record(EngineCall::SetVolume(volume))
    }

    fn set_playback_speed(&mut self, rate: f32) -> Result<()> {
        self.record(EngineCall::SetPlaybackSpeed(rate))
    }

    fn current_position_ms(&self) -> Result<u64> {
        let state = self.state.lock();
        match &state.fail_with {
            Some(message) => Err(AudioError::NativeEngine(message.clone())),
            None if state.fail_position_query => {
                Err(AudioError::NativeEngine("position unavailable".to_string()))
            }
            None => Ok(state.position_ms),
        }
    }

    fn duration_ms(&self) -> Result<u64> {
        let state = self.state.lock();
        match &state.fail_with {
            Some(message) => Err(AudioError::NativeEngine(message.clone())),
            None => Ok(state.duration_ms),
        }
    }
}

/// Factory handing out fake engines and keeping a handle to each
pub struct FakeFactory {
    engines: Mutex<Vec<FakeEngineHandle>>,
    ready_on_prepare: bool,
    duration_ms: u64,
    fail_create: Mutex<Option<String>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(Vec::new()),
            ready_on_prepare: false,
            duration_ms: 30_000,
            fail_create: Mutex::new(None),
        }
    }

    /// Engines report ready synchronously from `prepare`
    pub fn ready_on_prepare() -> Self {
        Self {
            ready_on_prepare: true,
            ..Self::new()
        }
    }

    pub fn fail_create(&self, message: Option<&str>) {
        *self.fail_create.lock() = message.map(str::to_string);
    }

    pub fn created(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn last(&self) -> FakeEngineHandle {
        self.engines
            .lock()
            .last()
            .cloned()
            .expect("no engine created yet")
    }

    pub fn engine(&self, index: usize) -> FakeEngineHandle {
        self.engines.lock()[index].clone()
    }
}

impl EngineFactory for FakeFactory {
    fn create(&self, source: &str, listener: EngineListener) -> Result<Box<dyn MediaEngine>> {
        if let Some(message) = self.fail_create.lock().clone() {
            return Err(AudioError::NativeEngine(message));
        }
        let state = Arc::new(Mutex::new(FakeEngineState {
            source: source.to_string(),
            duration_ms: self.duration_ms,
            ..Default::default()
        }));
        self.engines.lock().push(FakeEngineHandle {
            state: state.clone(),
            listener: listener.clone(),
        });
        Ok(Box::new(FakeEngine {
            state,
            listener,
            ready_on_prepare: self.ready_on_prepare,
        }))
    }
}

/// Sink that records every event
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn positions(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::PositionUpdate { position_ms, .. } => Some(*position_ms),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<FinishMode> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::FinishedPlaying { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Error { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Poll until `predicate` holds or `timeout` passes
    pub fn wait_for(&self, timeout: Duration, predicate: impl Fn(&[SessionEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.events.lock();
            if predicate(events.as_slice()) {
                return true;
            }
            drop(events);
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}
