// Playback session: one native engine handle driven from one control thread
//
// Every public operation, every engine callback and every ticker emission is
// executed on the session's control thread, in arrival order. Public methods
// enqueue a closure and block until the control thread has run it.

use crate::callback::{EventSink, SessionEvent};
use crate::completion::{completion, Completer, Pending};
use crate::config::{PrepareOptions, SessionConfig};
use crate::engine::{EngineFactory, EngineListener, MediaEngine};
use crate::error::{AudioError, Result};
use crate::state::{DurationKind, EngineState, FinishMode, PlayerKey, SessionStatus};
use crate::ticker::PositionTicker;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

type Call = Box<dyn FnOnce(&mut SessionCore) + Send>;

thread_local! {
    // Set for the lifetime of any session's control thread
    static ON_CONTROL_THREAD: Cell<bool> = const { Cell::new(false) };
}

enum Message {
    Call(Call),
    Engine { generation: u64, event: EngineEvent },
    Shutdown,
}

enum EngineEvent {
    StateChanged(EngineState),
    Error(String),
}

/// Owned engine that is released on every exit path
struct EngineHandle {
    engine: Box<dyn MediaEngine>,
    released: bool,
}

impl EngineHandle {
    fn new(engine: Box<dyn MediaEngine>) -> Self {
        Self {
            engine,
            released: false,
        }
    }

    fn release(mut self) -> Result<()> {
        self.released = true;
        self.engine.release()
    }
}

impl std::ops::Deref for EngineHandle {
    type Target = dyn MediaEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

impl std::ops::DerefMut for EngineHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine.as_mut()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.engine.release() {
                log::warn!("Failed to release engine on drop: {}", e);
            }
        }
    }
}

/// State owned by the control thread
struct SessionCore {
    key: PlayerKey,
    factory: Arc<dyn EngineFactory>,
    sink: Arc<dyn EventSink>,
    tx: Sender<Message>,
    player: Option<EngineHandle>,
    /// Bumped whenever the listener of the current engine is detached
    generation: u64,
    prepared: bool,
    pending_prepare: Option<Completer<()>>,
    initial_volume: f32,
    default_volume: f32,
    finish_mode: FinishMode,
    ticker: PositionTicker,
}

impl SessionCore {
    fn new(
        key: PlayerKey,
        factory: Arc<dyn EngineFactory>,
        sink: Arc<dyn EventSink>,
        tx: Sender<Message>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            key,
            factory,
            sink,
            tx,
            player: None,
            generation: 0,
            prepared: false,
            pending_prepare: None,
            initial_volume: config.initial_volume,
            default_volume: config.initial_volume,
            finish_mode: config.finish_mode,
            ticker: PositionTicker::new(config.poll_interval),
        }
    }

    fn player(&mut self) -> Result<&mut EngineHandle> {
        self.player.as_mut().ok_or_else(AudioError::no_player)
    }

    fn listener(&self) -> EngineListener {
        let generation = self.generation;
        let state_tx = self.tx.clone();
        let error_tx = self.tx.clone();
        EngineListener::new(
            move |state| {
                let _ = state_tx.send(Message::Engine {
                    generation,
                    event: EngineEvent::StateChanged(state),
                });
            },
            move |message| {
                let _ = error_tx.send(Message::Engine {
                    generation,
                    event: EngineEvent::Error(message),
                });
            },
        )
    }

    fn detach_listener(&mut self) {
        self.generation += 1;
    }

    fn fail_pending(&mut self, reason: &str) {
        if let Some(mut completer) = self.pending_prepare.take() {
            completer.complete(Err(AudioError::InvalidState(reason.to_string())));
        }
    }

    fn emit(&self, event: SessionEvent) {
        self.sink.on_event(event);
    }

    fn emit_position(&self) {
        let position_ms = match &self.player {
            Some(player) => match player.current_position_ms() {
                Ok(position) => position,
                Err(e) => {
                    log::warn!("[{}] position query failed: {}", self.key, e);
                    return;
                }
            },
            None => 0,
        };
        self.report_position(position_ms);
    }

    fn report_position(&self, position_ms: u64) {
        self.emit(SessionEvent::PositionUpdate {
            key: self.key.clone(),
            position_ms,
        });
    }

    /// Cancel the ticker; `flush` sends one final position report
    fn stop_ticker(&mut self, flush: bool) {
        if self.ticker.cancel() {
            log::debug!("[{}] position ticker stopped", self.key);
        }
        if flush {
            self.emit_position();
        }
    }

    fn tick(&mut self) {
        self.emit_position();
        self.ticker.reschedule(Instant::now());
    }

    fn release_player(&mut self) -> Result<bool> {
        match self.player.take() {
            Some(player) => player.release().map(|_| true),
            None => Ok(false),
        }
    }

    fn prepare(&mut self, source: &str, options: PrepareOptions) -> Result<Pending<()>> {
        if source.trim().is_empty() {
            return Err(AudioError::InvalidArgument(
                "path to audio file can't be empty".to_string(),
            ));
        }
        let poll_interval = options.poll_interval()?;

        // A new source supersedes whatever this session was doing
        self.ticker.cancel();
        self.fail_pending("superseded by a new prepare");
        self.detach_listener();
        self.prepared = false;
        if let Err(e) = self.release_player() {
            log::warn!("[{}] failed to release previous engine: {}", self.key, e);
        }

        if let Some(interval) = poll_interval {
            self.ticker.set_interval(interval);
        }
        self.initial_volume = options.volume.unwrap_or(self.default_volume);

        let engine = self.factory.create(source, self.listener())?;
        let mut player = EngineHandle::new(engine);
        if let Err(e) = player.prepare() {
            self.detach_listener();
            return Err(e);
        }

        let (completer, pending) = completion();
        self.pending_prepare = Some(completer);
        self.player = Some(player);
        log::info!("[{}] preparing {}", self.key, source);
        Ok(pending)
    }

    fn on_engine_event(&mut self, generation: u64, event: EngineEvent) {
        if generation != self.generation {
            log::debug!("[{}] dropping event from detached engine", self.key);
            return;
        }
        match event {
            EngineEvent::StateChanged(state) => self.on_state_changed(state),
            EngineEvent::Error(message) => self.on_error(message),
        }
    }

    fn on_state_changed(&mut self, state: EngineState) {
        log::debug!("[{}] engine state {:?}", self.key, state);
        match state {
            EngineState::Ready if !self.prepared => {
                let volume = self.initial_volume;
                if let Some(player) = self.player.as_mut() {
                    if let Err(e) = player.set_volume(volume) {
                        log::warn!("[{}] failed to apply initial volume: {}", self.key, e);
                    }
                }
                self.prepared = true;
                if let Some(mut completer) = self.pending_prepare.take() {
                    completer.complete(Ok(()));
                }
                log::info!("[{}] player prepared", self.key);
            }
            EngineState::Ended => self.on_ended(),
            _ => {}
        }
    }

    fn on_error(&mut self, message: String) {
        log::error!("[{}] engine error: {}", self.key, message);
        match self.pending_prepare.take() {
            Some(mut completer) => {
                completer.complete(Err(AudioError::NativeEngine(message)));
            }
            None => self.emit(SessionEvent::Error {
                key: self.key.clone(),
                message,
            }),
        }
    }

    fn on_ended(&mut self) {
        let mode = self.finish_mode;
        log::info!("[{}] end of media, finish mode {:?}", self.key, mode);
        let result = match mode {
            FinishMode::Loop => self.player().and_then(|player| {
                player.seek_to(0)?;
                player.play()
            }),
            FinishMode::Pause => {
                let result = self.player().and_then(|player| {
                    player.seek_to(0)?;
                    player.set_play_when_ready(false)
                });
                self.stop_ticker(true);
                result
            }
            FinishMode::Stop => {
                let result = match self.player.take() {
                    Some(mut player) => {
                        let stopped = player.stop();
                        let released = player.release();
                        stopped.and(released)
                    }
                    None => Ok(()),
                };
                self.detach_listener();
                self.prepared = false;
                self.stop_ticker(true);
                result
            }
        };
        if let Err(e) = result {
            log::warn!("[{}] finish action {:?} failed: {}", self.key, mode, e);
        }
        self.emit(SessionEvent::FinishedPlaying {
            key: self.key.clone(),
            reason: mode,
        });
    }

    fn seek(&mut self, position_ms: Option<u64>) -> Result<bool> {
        let Some(position_ms) = position_ms else {
            return Ok(false);
        };
        let player = self.player()?;
        player.seek_to(position_ms)?;
        // A successful seek always reports; the requested target stands in
        let reported = match player.current_position_ms() {
            Ok(position) => position,
            Err(e) => {
                log::warn!("[{}] position query after seek failed: {}", self.key, e);
                position_ms
            }
        };
        self.report_position(reported);
        Ok(true)
    }

    fn start(&mut self) -> Result<bool> {
        let player = self.player()?;
        player.set_play_when_ready(true)?;
        player.play()?;
        if self.ticker.start(Instant::now()) {
            log::debug!(
                "[{}] position ticker started every {:?}",
                self.key,
                self.ticker.interval()
            );
        }
        Ok(true)
    }

    fn pause(&mut self) -> Result<bool> {
        self.player()?;
        self.stop_ticker(true);
        self.player()?.pause()?;
        Ok(true)
    }

    fn stop(&mut self) -> Result<bool> {
        self.player()?;
        self.stop_ticker(true);
        self.detach_listener();
        self.fail_pending("player stopped before it became ready");
        self.prepared = false;
        self.player()?.stop()?;
        Ok(true)
    }

    fn release(&mut self) -> Result<bool> {
        self.ticker.cancel();
        self.detach_listener();
        self.fail_pending("player released before it became ready");
        self.prepared = false;
        self.release_player()
    }

    fn set_volume(&mut self, volume: Option<f32>) -> Result<bool> {
        let Some(volume) = volume else {
            return Ok(false);
        };
        self.player()?.set_volume(volume)?;
        Ok(true)
    }

    fn set_rate(&mut self, rate: Option<f32>) -> Result<bool> {
        let Some(rate) = rate else {
            return Ok(false);
        };
        self.player()?.set_playback_speed(rate)?;
        Ok(true)
    }

    fn duration(&mut self, kind: DurationKind) -> Result<u64> {
        let player = self.player()?;
        match kind {
            DurationKind::Current => player.current_position_ms(),
            DurationKind::Total => player.duration_ms(),
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            key: self.key.clone(),
            prepared: self.prepared,
            ticking: self.ticker.is_active(),
            has_player: self.player.is_some(),
            finish_mode: self.finish_mode,
            poll_interval: self.ticker.interval(),
        }
    }

    fn shutdown(&mut self) {
        self.ticker.cancel();
        self.detach_listener();
        self.fail_pending("session shut down");
        if let Err(e) = self.release_player() {
            log::warn!("[{}] failed to release engine on shutdown: {}", self.key, e);
        }
    }

    fn run(mut self, rx: Receiver<Message>) {
        log::info!("[{}] session control thread started", self.key);
        ON_CONTROL_THREAD.with(|flag| flag.set(true));
        loop {
            if self.ticker.is_due(Instant::now()) {
                self.tick();
                continue;
            }

            let message = match self.ticker.time_until_due(Instant::now()) {
                Some(wait) => match rx.recv_timeout(wait) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            match message {
                Message::Call(call) => call(&mut self),
                Message::Engine { generation, event } => self.on_engine_event(generation, event),
                Message::Shutdown => break,
            }
        }
        self.shutdown();
        log::info!("[{}] session control thread exited", self.key);
    }
}

struct SessionShared {
    key: PlayerKey,
    tx: Sender<Message>,
    control_thread: ThreadId,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionShared {
    fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
        if thread::current().id() == self.control_thread {
            return;
        }
        let handle = self.join_handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("[{}] session control thread panicked", self.key);
            }
        }
    }
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to one playback session
///
/// Cheap to clone; the session shuts down when the last clone is dropped or
/// on [`PlaybackSession::shutdown`]. Calls block until the control thread has
/// executed them. Calling into a session from its own control thread (for
/// example from an [`EventSink`]) fails with `InvalidState`.
#[derive(Clone)]
pub struct PlaybackSession {
    shared: Arc<SessionShared>,
}

impl PlaybackSession {
    pub fn new(
        key: impl Into<PlayerKey>,
        factory: Arc<dyn EngineFactory>,
        sink: Arc<dyn EventSink>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let key = key.into();
        let (tx, rx) = unbounded();
        let core = SessionCore::new(key.clone(), factory, sink, tx.clone(), &config);

        let handle = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name_prefix, key))
            .spawn(move || core.run(rx))?;

        Ok(Self {
            shared: Arc::new(SessionShared {
                key,
                tx,
                control_thread: handle.thread().id(),
                join_handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn key(&self) -> &PlayerKey {
        &self.shared.key
    }

    fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionCore) -> Result<T> + Send + 'static,
    {
        // Blocking here could wait on this thread or on a session waiting on us
        if ON_CONTROL_THREAD.with(Cell::get) {
            return Err(AudioError::InvalidState(
                "synchronous call from a session control thread".to_string(),
            ));
        }
        let (mut completer, pending) = completion();
        self.shared
            .tx
            .send(Message::Call(Box::new(move |core: &mut SessionCore| {
                completer.complete(f(core));
            })))
            .map_err(|_| AudioError::SessionClosed(self.shared.key.to_string()))?;
        pending.wait().map_err(|e| match e {
            AudioError::SessionClosed(_) => AudioError::SessionClosed(self.shared.key.to_string()),
            other => other,
        })
    }

    /// Create an engine for `source` and start buffering
    ///
    /// Argument errors and engine creation failures return immediately. The
    /// returned [`Pending`] resolves once: success on the first ready state,
    /// failure with the engine message on an engine error.
    pub fn prepare(&self, source: &str, options: PrepareOptions) -> Result<Pending<()>> {
        let source = source.to_string();
        self.call(move |core| core.prepare(&source, options))
    }

    /// `None` is a no-op returning `false`
    pub fn seek(&self, position_ms: Option<u64>) -> Result<bool> {
        self.call(move |core| core.seek(position_ms))
    }

    pub fn start(&self) -> Result<bool> {
        self.call(|core| core.start())
    }

    pub fn pause(&self) -> Result<bool> {
        self.call(|core| core.pause())
    }

    /// Stop playback and detach from the engine; the handle is kept
    pub fn stop(&self) -> Result<bool> {
        self.call(|core| core.stop())
    }

    /// Release the engine handle; `false` if there was none
    pub fn release(&self) -> Result<bool> {
        self.call(|core| core.release())
    }

    pub fn set_volume(&self, volume: Option<f32>) -> Result<bool> {
        self.call(move |core| core.set_volume(volume))
    }

    pub fn set_rate(&self, rate: Option<f32>) -> Result<bool> {
        self.call(move |core| core.set_rate(rate))
    }

    /// Accepts finish mode codes 0 (loop), 1 (pause), 2 (stop)
    pub fn set_finish_mode(&self, code: i32) -> Result<()> {
        let mode = FinishMode::try_from(code)?;
        self.call(move |core| {
            core.finish_mode = mode;
            Ok(())
        })
    }

    pub fn get_duration(&self, kind: DurationKind) -> Result<u64> {
        self.call(move |core| core.duration(kind))
    }

    pub fn status(&self) -> Result<SessionStatus> {
        self.call(|core| Ok(core.status()))
    }

    /// Release everything and end the control thread
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}
